use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Schedulable actor
    GeneralId
);
entity_id!(CityId);
entity_id!(
    /// Nation id 0 is reserved for "no nation" (wandering generals)
    NationId
);
entity_id!(
    /// Troops are keyed by their leader's general id
    TroopId
);

impl NationId {
    pub const NEUTRAL: NationId = NationId(0);

    pub fn is_neutral(self) -> bool {
        self == Self::NEUTRAL
    }
}

impl TroopId {
    pub fn leader(self) -> GeneralId {
        GeneralId(self.0)
    }
}
