use screenplay_editor::EditorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry for the initial fetch of a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait before each retry; the last entry repeats
    #[serde(default = "default_delays_ms")]
    pub delays_ms: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delays_ms() -> Vec<u64> {
    vec![250, 1000]
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delays_ms: Vec::new(),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        let millis = self
            .delays_ms
            .get(index)
            .or_else(|| self.delays_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_ms: default_delays_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub retry: RetryPolicy,

    /// How long a document may stay dirty before the autosave reminder fires
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,

    #[serde(default)]
    pub editor: EditorConfig,
}

fn default_reminder_interval_secs() -> u64 {
    120
}

impl SessionConfig {
    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            reminder_interval_secs: default_reminder_interval_secs(),
            editor: EditorConfig::default(),
        }
    }
}
