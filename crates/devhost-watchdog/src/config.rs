//! Tunable timing for [`crate::notifier::DropNotifier`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WatchdogError, WatchdogResult};

/// Minimum spacing between batched drop notifications once a session has
/// already been notified once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropNotifierConfig {
    /// Minimum interval between the second and subsequent notifications
    /// for the same session.
    pub min_notify_interval: Duration,
}

impl Default for DropNotifierConfig {
    fn default() -> Self {
        Self {
            min_notify_interval: Duration::from_secs(5),
        }
    }
}

impl DropNotifierConfig {
    /// # Errors
    /// Returns an error when `min_notify_interval` is zero.
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.min_notify_interval.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "min_notify_interval must be greater than 0",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn builder() -> DropNotifierConfigBuilder {
        DropNotifierConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct DropNotifierConfigBuilder {
    config: DropNotifierConfig,
}

impl DropNotifierConfigBuilder {
    #[must_use]
    pub fn min_notify_interval(mut self, interval: Duration) -> Self {
        self.config.min_notify_interval = interval;
        self
    }

    /// # Errors
    /// Returns an error when the built configuration is invalid.
    pub fn build(self) -> WatchdogResult<DropNotifierConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_interval() {
        let config = DropNotifierConfig {
            min_notify_interval: Duration::ZERO,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_round_trips() {
        let config = DropNotifierConfig::builder()
            .min_notify_interval(Duration::from_secs(10))
            .build()
            .expect("valid config");
        assert_eq!(config.min_notify_interval, Duration::from_secs(10));
    }
}
