//! Entity records owned by the world.
//!
//! Each record is a flat set of typed fields plus an open `meta` bag for
//! action-specific counters and a `trigger_state` bag used by pluggable
//! content.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use warlords_protocol::{CityId, GeneralId, NationId, TroopId};

/// Officer level from which a general also runs the nation's reserved turns
pub const CHIEF_OFFICER_LEVEL: u8 = 5;

/// Flags, counters and modifiers maintained by trigger content
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub modifiers: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct General {
    pub id: GeneralId,
    pub name: String,
    pub nation_id: NationId,
    pub city_id: CityId,
    #[serde(default)]
    pub troop_id: Option<TroopId>,
    #[serde(default)]
    pub officer_level: u8,
    pub leadership: i32,
    pub strength: i32,
    pub intel: i32,
    #[serde(default)]
    pub experience: i64,
    #[serde(default)]
    pub dedication: i64,
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub rice: i64,
    #[serde(default)]
    pub crew: i64,
    #[serde(default)]
    pub train: i32,
    #[serde(default)]
    pub atmos: i32,
    /// Next time this general is due
    pub turn_time: DateTime<Utc>,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
    #[serde(default)]
    pub trigger_state: TriggerState,
}

impl General {
    pub fn new(
        id: GeneralId,
        name: impl Into<String>,
        nation_id: NationId,
        city_id: CityId,
        turn_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            nation_id,
            city_id,
            troop_id: None,
            officer_level: 1,
            leadership: 50,
            strength: 50,
            intel: 50,
            experience: 0,
            dedication: 0,
            gold: 1_000,
            rice: 1_000,
            crew: 0,
            train: 0,
            atmos: 0,
            turn_time,
            meta: BTreeMap::new(),
            trigger_state: TriggerState::default(),
        }
    }

    pub fn is_chief(&self) -> bool {
        self.officer_level >= CHIEF_OFFICER_LEVEL && !self.nation_id.is_neutral()
    }

    /// Add to a numeric meta counter, treating a missing key as zero
    pub fn bump_meta(&mut self, key: &str, amount: i64) {
        let current = self.meta.get(key).and_then(Value::as_i64).unwrap_or(0);
        self.meta.insert(key.to_string(), Value::from(current + amount));
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub nation_id: NationId,
    #[serde(default)]
    pub pop: i64,
    #[serde(default)]
    pub pop_max: i64,
    #[serde(default)]
    pub agri: i64,
    #[serde(default)]
    pub agri_max: i64,
    #[serde(default)]
    pub comm: i64,
    #[serde(default)]
    pub comm_max: i64,
    #[serde(default)]
    pub secu: i64,
    #[serde(default)]
    pub secu_max: i64,
    #[serde(default)]
    pub def: i64,
    #[serde(default)]
    pub def_max: i64,
    #[serde(default)]
    pub wall: i64,
    #[serde(default)]
    pub wall_max: i64,
    #[serde(default)]
    pub trust: i32,
    #[serde(default = "default_supply")]
    pub supply: bool,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

fn default_supply() -> bool {
    true
}

impl City {
    pub fn new(id: CityId, name: impl Into<String>, nation_id: NationId) -> Self {
        Self {
            id,
            name: name.into(),
            nation_id,
            pop: 10_000,
            pop_max: 50_000,
            agri: 1_000,
            agri_max: 5_000,
            comm: 1_000,
            comm_max: 5_000,
            secu: 1_000,
            secu_max: 5_000,
            def: 1_000,
            def_max: 5_000,
            wall: 1_000,
            wall_max: 5_000,
            trust: 50,
            supply: true,
            meta: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nation {
    pub id: NationId,
    pub name: String,
    #[serde(default)]
    pub capital_city_id: Option<CityId>,
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub rice: i64,
    #[serde(default)]
    pub tech: i64,
    /// 0 is a wandering force without territory
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

impl Nation {
    pub fn new(id: NationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            capital_city_id: None,
            gold: 10_000,
            rice: 10_000,
            tech: 0,
            level: 1,
            meta: BTreeMap::new(),
        }
    }

    pub fn is_wandering(&self) -> bool {
        self.level == 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiplomacyState {
    War,
    /// War declared, hostilities start when the term runs out
    Declared,
    #[default]
    Neutral,
    NonAggression,
}

impl DiplomacyState {
    pub fn is_hostile(self) -> bool {
        matches!(self, Self::War | Self::Declared)
    }
}

/// Directed relation from `src_nation_id` towards `dest_nation_id`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diplomacy {
    pub src_nation_id: NationId,
    pub dest_nation_id: NationId,
    #[serde(default)]
    pub state: DiplomacyState,
    /// Remaining ticks of the current state
    #[serde(default)]
    pub term: u32,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

impl Diplomacy {
    pub fn neutral(src_nation_id: NationId, dest_nation_id: NationId) -> Self {
        Self {
            src_nation_id,
            dest_nation_id,
            state: DiplomacyState::Neutral,
            term: 0,
            meta: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> (NationId, NationId) {
        (self.src_nation_id, self.dest_nation_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Troop {
    pub id: TroopId,
    pub nation_id: NationId,
    pub name: String,
}

impl Troop {
    pub fn leader(&self) -> GeneralId {
        self.id.leader()
    }
}
