//! Presence service configuration.

use std::time::Duration;

use crate::error::{PresenceError, Result};

/// Timing configuration for the presence service.
///
/// Defaults match the production values; each knob is independently tunable
/// but [`validate`](PresenceConfig::validate) enforces the relations that
/// keep staleness eviction from false-positive offline flips:
/// sweep interval < staleness threshold, heartbeat < staleness threshold.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How often the local record is re-published for liveness
    pub heartbeat: Duration,
    /// Quiet period after which a peer is considered gone
    pub stale_after: Duration,
    /// How often the staleness sweep runs
    pub sweep_interval: Duration,
    /// Continuous hidden time after which the local session goes offline
    pub hidden_offline_after: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            heartbeat: Duration::from_secs(30),
            stale_after: Duration::from_secs(90),
            sweep_interval: Duration::from_secs(15),
            hidden_offline_after: Duration::from_secs(300),
        }
    }
}

impl PresenceConfig {
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_hidden_offline_after(mut self, hidden_offline_after: Duration) -> Self {
        self.hidden_offline_after = hidden_offline_after;
        self
    }

    /// Check the timing relations required for correct eviction
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval >= self.stale_after {
            return Err(PresenceError::Config(format!(
                "sweep interval ({:?}) must be shorter than the staleness threshold ({:?})",
                self.sweep_interval, self.stale_after
            )));
        }
        if self.heartbeat >= self.stale_after {
            return Err(PresenceError::Config(format!(
                "heartbeat ({:?}) must be shorter than the staleness threshold ({:?})",
                self.heartbeat, self.stale_after
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PresenceConfig::default().validate().is_ok());
    }

    #[test]
    fn sweep_slower_than_staleness_is_rejected() {
        let config = PresenceConfig::default()
            .with_stale_after(Duration::from_secs(10))
            .with_sweep_interval(Duration::from_secs(10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn heartbeat_slower_than_staleness_is_rejected() {
        let config = PresenceConfig::default()
            .with_stale_after(Duration::from_secs(10))
            .with_heartbeat(Duration::from_secs(20));
        assert!(config.validate().is_err());
    }
}
