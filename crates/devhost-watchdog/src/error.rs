//! Error types for the drop-notification watchdog.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WatchdogError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl WatchdogError {
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

pub type WatchdogResult<T> = std::result::Result<T, WatchdogError>;
