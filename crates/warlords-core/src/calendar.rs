//! Tick arithmetic and the game calendar.
//!
//! Ticks fall on a fixed grid of `tick_term_minutes` counted from the Unix
//! epoch, so every process computes the same boundaries without sharing state.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

fn term_seconds(tick_term_minutes: u32) -> i64 {
    i64::from(tick_term_minutes.max(1)) * 60
}

/// First tick boundary strictly after `last_turn_time`.
pub fn get_next_tick_time(last_turn_time: DateTime<Utc>, tick_term_minutes: u32) -> DateTime<Utc> {
    let term = term_seconds(tick_term_minutes);
    let next = (last_turn_time.timestamp().div_euclid(term) + 1) * term;
    Utc.timestamp_opt(next, 0)
        .single()
        .unwrap_or(last_turn_time + Duration::seconds(term))
}

/// `min(next tick boundary, next due actor)`; no pending actor means the tick wins.
pub fn compute_run_deadline(
    last_turn_time: DateTime<Utc>,
    tick_term_minutes: u32,
    next_actor_turn_time: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let tick = get_next_tick_time(last_turn_time, tick_term_minutes);
    match next_actor_turn_time {
        Some(due) => due.min(tick),
        None => tick,
    }
}

/// Maps tick boundaries to in-game years and months, twelve ticks a year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCalendar {
    pub start_time: DateTime<Utc>,
    pub start_year: i32,
    pub tick_term_minutes: u32,
}

impl TurnCalendar {
    pub fn new(start_time: DateTime<Utc>, start_year: i32, tick_term_minutes: u32) -> Self {
        Self {
            start_time,
            start_year,
            tick_term_minutes: tick_term_minutes.max(1),
        }
    }

    pub fn term(&self) -> Duration {
        Duration::minutes(i64::from(self.tick_term_minutes))
    }

    pub fn next_tick(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        get_next_tick_time(after, self.tick_term_minutes)
    }

    /// Whole ticks elapsed since `start_time`; negative before the start.
    pub fn tick_index(&self, at: DateTime<Utc>) -> i64 {
        (at - self.start_time)
            .num_seconds()
            .div_euclid(term_seconds(self.tick_term_minutes))
    }

    pub fn year_month(&self, at: DateTime<Utc>) -> (i32, u8) {
        let index = self.tick_index(at);
        let year = self.start_year as i64 + index.div_euclid(12);
        let month = index.rem_euclid(12) as u8 + 1;
        (year as i32, month)
    }
}
