//! Centralized error types for the devhost plugin IPC data plane.
//!
//! Every subsystem — shared memory, the session supervisor, the pipe
//! protocol, the frame pump — reports through [`DevhostError`]. Leaf
//! crates may keep narrower `thiserror` enums internally and convert into
//! this one at their public boundary, the way `openracing-native-plugin`
//! wraps signature/loader failures into one crate error.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, rust_2018_idioms)]

use std::time::Duration;
use thiserror::Error;

/// The error kinds a devhost component can surface, per the error-handling
/// design: invalid input, missing entities, capacity exhaustion, IPC
/// timeouts, wire-protocol violations, I/O failures, plugin-reported
/// failures, and cooperative cancellation.
#[derive(Debug, Error)]
pub enum DevhostError {
    /// Malformed caller input: empty session id, non-positive capacity,
    /// a schema that cannot be parsed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced session, plugin, or capability does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A segment or single-frame request exceeds available capacity even
    /// after the manager's downgrade path.
    #[error("out of capacity: {0}")]
    OutOfCapacity(String),

    /// An IPC deadline elapsed before a response arrived.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed JSON, a wire-version mismatch, or a record-length /
    /// payload-length disagreement.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A mapping-file or pipe operation failed at the OS level.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The plugin replied `{ok:false, error}`.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// The operation was cancelled by a shutdown token.
    #[error("cancelled")]
    Cancelled,
}

impl DevhostError {
    /// Construct an [`DevhostError::InvalidArgument`] from any displayable
    /// reason.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Construct an [`DevhostError::NotFound`] from any displayable
    /// reason.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    /// Construct an [`DevhostError::OutOfCapacity`] from any displayable
    /// reason.
    pub fn out_of_capacity(reason: impl Into<String>) -> Self {
        Self::OutOfCapacity(reason.into())
    }

    /// Construct a [`DevhostError::Protocol`] from any displayable reason.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }

    /// Construct a [`DevhostError::Plugin`] from any displayable reason.
    pub fn plugin(reason: impl Into<String>) -> Self {
        Self::Plugin(reason.into())
    }

    /// True for conditions a caller may retry (timeouts and protocol
    /// hiccups); false for definitive failures.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Protocol(_))
    }
}

/// Specialized `Result` alias used throughout the devhost crates.
pub type Result<T> = std::result::Result<T, DevhostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(DevhostError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(DevhostError::protocol("bad json").is_recoverable());
        assert!(!DevhostError::Cancelled.is_recoverable());
        assert!(!DevhostError::not_found("session s1").is_recoverable());
    }

    #[test]
    fn constructors_carry_message() {
        let err = DevhostError::invalid_argument("empty session id");
        assert_eq!(err.to_string(), "invalid argument: empty session id");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::other("disk full");
        let err: DevhostError = io_err.into();
        assert!(matches!(err, DevhostError::Io(_)));
    }
}
