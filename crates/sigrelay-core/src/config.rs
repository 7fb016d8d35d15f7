//! Relay tuning knobs.

use std::time::Duration;

/// Default mailbox depth per peer.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

/// Silence after which a non-waiting peer is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Period of the stale-peer sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Registration names starting with this are responders.
pub const DEFAULT_RESPONDER_PREFIX: &str = "renderingserver_";

/// Configuration for a [`Relay`](crate::Relay).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub mailbox_capacity: usize,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    pub responder_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            responder_prefix: DEFAULT_RESPONDER_PREFIX.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_responder_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.responder_prefix = prefix.into();
        self
    }
}
