use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Remembers when currency last changed hands, for the velocity index.
#[derive(Debug, Default)]
pub struct VelocityTracker {
    last_mutation: Mutex<Option<DateTime<Utc>>>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ledger mutation. Older timestamps never move the mark back.
    pub fn record(&self, at: DateTime<Utc>) {
        let mut last = self.last_mutation.lock();
        if last.map_or(true, |prev| at > prev) {
            *last = Some(at);
        }
    }

    pub fn last_mutation(&self) -> Option<DateTime<Utc>> {
        *self.last_mutation.lock()
    }

    /// Time since the last mutation; zero if none was ever recorded.
    pub fn idle(&self, now: DateTime<Utc>) -> TimeDelta {
        self.last_mutation()
            .map(|last| now - last)
            .unwrap_or_else(TimeDelta::zero)
    }
}
