//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long a single recipient's send may take before it is treated
    /// as a failed delivery and the recipient is evicted.
    pub send_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl CoordinatorConfig {
    /// Lower bound for `send_timeout`.
    pub const MIN_SEND_TIMEOUT: Duration = Duration::from_millis(10);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`Coordinator::new`](crate::Coordinator::new).
    pub fn validated(mut self) -> Self {
        if self.send_timeout < Self::MIN_SEND_TIMEOUT {
            tracing::warn!(
                send_timeout_ms = self.send_timeout.as_millis() as u64,
                "send_timeout below minimum, clamping"
            );
            self.send_timeout = Self::MIN_SEND_TIMEOUT;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_send_timeout() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validated_clamps_zero_timeout() {
        let config = CoordinatorConfig {
            send_timeout: Duration::ZERO,
        }
        .validated();
        assert_eq!(config.send_timeout, CoordinatorConfig::MIN_SEND_TIMEOUT);
    }

    #[test]
    fn test_validated_keeps_sane_timeout() {
        let config = CoordinatorConfig {
            send_timeout: Duration::from_secs(2),
        }
        .validated();
        assert_eq!(config.send_timeout, Duration::from_secs(2));
    }
}
