//! Batch progress markers and processor limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GeneralId;

/// Position inside the most recent batch.
///
/// Written after the batch commits so a restarted daemon resumes right after
/// the last committed actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Due time of the last committed actor (before it was advanced)
    pub turn_time: DateTime<Utc>,
    pub general_id: GeneralId,
    pub year: i32,
    pub month: u8,
}

impl Checkpoint {
    /// Ordering key shared with the processor's due queue.
    pub fn position(&self) -> (DateTime<Utc>, GeneralId) {
        (self.turn_time, self.general_id)
    }

    /// True when `(turn_time, general_id)` was already committed.
    pub fn covers(&self, turn_time: DateTime<Utc>, general_id: GeneralId) -> bool {
        (turn_time, general_id) <= self.position()
    }
}

/// Bounds on a single processor invocation, checked between actors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Wall-clock budget in milliseconds
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    /// Maximum actors resolved per invocation
    #[serde(default = "default_max_generals")]
    pub max_generals: usize,
    /// Maximum backlog ticks absorbed per invocation
    #[serde(default = "default_catch_up_cap")]
    pub catch_up_cap: u32,
}

fn default_budget_ms() -> u64 {
    5_000
}
fn default_max_generals() -> usize {
    500
}
fn default_catch_up_cap() -> u32 {
    3
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            budget_ms: default_budget_ms(),
            max_generals: default_max_generals(),
            catch_up_cap: default_catch_up_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn checkpoint_covers_earlier_positions() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 2, 0, 0).unwrap();
        let checkpoint = Checkpoint {
            turn_time: at,
            general_id: GeneralId(5),
            year: 180,
            month: 3,
        };

        assert!(checkpoint.covers(at, GeneralId(5)));
        assert!(checkpoint.covers(at, GeneralId(4)));
        assert!(!checkpoint.covers(at, GeneralId(6)));
        assert!(checkpoint.covers(at - chrono::Duration::minutes(1), GeneralId(99)));
        assert!(!checkpoint.covers(at + chrono::Duration::minutes(1), GeneralId(1)));
    }

    #[test]
    fn budget_fills_missing_fields() {
        let budget: Budget = serde_json::from_str(r#"{"budgetMs": 100}"#).unwrap();
        assert_eq!(budget.budget_ms, 100);
        assert_eq!(budget.max_generals, 500);
        assert_eq!(budget.catch_up_cap, 3);
    }
}
