// src/queue/config.rs

use derive_builder::Builder;
use std::time::Duration;

/// Item count threshold applied when the configured `max_size` is zero.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Staleness threshold applied when the configured `max_age` is zero.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);

/// Length of the random tag assigned when none is configured.
pub const DEFAULT_TAG_LEN: usize = 12;

/// Wake-up period of the age monitor task.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct Config {
    /// Diagnostic label; an empty tag is replaced with a random one at start
    #[builder(default)]
    pub(crate) tag: String,

    /// Maximum number of pending payloads before a batch is dispatched;
    /// zero means "use the default of 100"
    #[builder(default)]
    pub(crate) max_size: usize,

    /// Maximum time the pending buffer may sit before a batch is forced;
    /// zero means "use the default of 10s"
    #[builder(default)]
    pub(crate) max_age: Duration,

    /// How often the age monitor checks for staleness
    #[builder(default = "DEFAULT_MONITOR_INTERVAL")]
    pub(crate) monitor_interval: Duration,
}

impl Config {
    /// Returns the configured diagnostic tag (may be empty before start)
    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the configured batch size threshold
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the configured staleness threshold
    #[inline]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Returns the age monitor wake-up period
    #[inline]
    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval
    }
}
