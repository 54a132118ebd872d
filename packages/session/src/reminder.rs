//! Autosave reminder: fires once a document has stayed dirty for longer
//! than the configured interval since it was last clean.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct AutosaveReminder {
    interval: Duration,
    dirty_since: Option<Instant>,
}

impl AutosaveReminder {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            dirty_since: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Feed the current dirty state. The clock starts at the first dirty
    /// observation and stops when the document is clean again.
    pub fn observe(&mut self, dirty: bool, now: Instant) {
        match (dirty, self.dirty_since) {
            (true, None) => self.dirty_since = Some(now),
            (false, Some(_)) => self.dirty_since = None,
            _ => {}
        }
    }

    pub fn dirty_for(&self, now: Instant) -> Option<Duration> {
        self.dirty_since.map(|since| now.saturating_duration_since(since))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.dirty_for(now).is_some_and(|elapsed| elapsed >= self.interval)
    }
}
