// src/utils/clock.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Server-side countdown for one attempt.
///
/// The deadline derives from the stored start time, so reloading the client
/// resumes the countdown instead of restarting it.
#[derive(Debug, Clone, Copy)]
pub struct AttemptClock {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Snapshot of an attempt clock sent to clients.
#[derive(Debug, Serialize)]
pub struct TimerStatus {
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub expired: bool,
}

impl AttemptClock {
    pub fn new(started_at: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self {
            started_at,
            duration: Duration::minutes(duration_minutes),
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at + self.duration
    }

    /// Whole seconds left, never negative.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline() - now).num_seconds().max(0)
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline()
    }

    /// True when `now` is past the deadline plus the grace window.
    pub fn is_late(&self, now: DateTime<Utc>, grace_seconds: i64) -> bool {
        now > self.deadline() + Duration::seconds(grace_seconds.max(0))
    }

    /// Seconds spent on the attempt, capped at the test duration.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at)
            .num_seconds()
            .clamp(0, self.duration.num_seconds())
    }

    pub fn status(&self, now: DateTime<Utc>) -> TimerStatus {
        TimerStatus {
            started_at: self.started_at,
            deadline: self.deadline(),
            remaining_seconds: self.remaining_seconds(now),
            expired: self.expired(now),
        }
    }
}
