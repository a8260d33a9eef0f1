//! Built-in actions.
//!
//! Enough content to drive every effect kind through the pipeline; larger
//! catalogs register their own definitions on an [`crate::ActionRegistry`].

mod declare_war;
mod donate;
mod movement;
mod rest;
mod train;

pub use declare_war::DeclareWar;
pub use donate::Donate;
pub use movement::Move;
pub use rest::Rest;
pub use train::Train;

use serde_json::Value;

/// Read a positive id argument.
fn id_arg(raw: &Value, key: &str) -> Option<u32> {
    raw.get(key)?
        .as_u64()
        .filter(|id| *id > 0)
        .and_then(|id| u32::try_from(id).ok())
}
