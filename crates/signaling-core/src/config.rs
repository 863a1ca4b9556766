//! Call-signaling configuration.

use std::time::Duration;

use crate::error::{Result, SignalingError};

/// Timing configuration for the call signaling handler.
///
/// The polling fallback is the structural backstop for lost push events,
/// so it must fire well inside the stale-call window or a call could age
/// out before the poll ever sees it.
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// How often the unread-call poll runs
    pub poll_interval: Duration,
    /// Age beyond which a scanned/polled call notification is stale
    pub stale_call_after: Duration,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        SignalingConfig {
            poll_interval: Duration::from_secs(2),
            stale_call_after: Duration::from_secs(30),
        }
    }
}

impl SignalingConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_stale_call_after(mut self, stale_call_after: Duration) -> Self {
        self.stale_call_after = stale_call_after;
        self
    }

    /// Check that polling fires inside the stale-call window
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval >= self.stale_call_after {
            return Err(SignalingError::Config(format!(
                "poll interval ({:?}) must be shorter than the stale-call threshold ({:?})",
                self.poll_interval, self.stale_call_after
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
        assert!(SignalingConfig::default().validate().is_ok());
    }

    #[test]
    fn poll_slower_than_staleness_is_rejected() {
        let config = SignalingConfig::default()
            .with_poll_interval(Duration::from_secs(60))
            .with_stale_call_after(Duration::from_secs(30));
        assert!(config.validate().is_err());
    }
}
