//! Shared-memory specific error conditions, converted into
//! [`devhost_errors::DevhostError`] at the crate boundary.

use devhost_errors::DevhostError;
use thiserror::Error;

/// Narrow error type for mapping and segment operations, kept local so
/// call sites can match on specific conditions before they get folded
/// into the crate-wide error.
#[derive(Debug, Error)]
pub enum ShmemError {
    /// `name` was empty or `capacity_bytes` was not positive.
    #[error("invalid map options: {0}")]
    InvalidOptions(String),

    /// Creating or sizing the backing file failed.
    #[error("backing file error: {0}")]
    BackingFile(#[from] std::io::Error),

    /// The OS-level mapping call itself failed.
    #[error("mapping failed: {0}")]
    MappingFailed(String),

    /// A session id was already allocated within this mapping.
    #[error("duplicate session id: {0}")]
    DuplicateSession(String),

    /// Requested segment would not fit in remaining mapping capacity.
    #[error("out of capacity: requested {requested} bytes, {remaining} remaining")]
    OutOfCapacity {
        /// Bytes requested.
        requested: u64,
        /// Bytes left in the mapping.
        remaining: u64,
    },

    /// A segment header or frame failed validation.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl From<ShmemError> for DevhostError {
    fn from(err: ShmemError) -> Self {
        match err {
            ShmemError::InvalidOptions(msg) => DevhostError::invalid_argument(msg),
            ShmemError::BackingFile(io_err) => DevhostError::Io(io_err),
            ShmemError::MappingFailed(msg) => DevhostError::Io(std::io::Error::other(msg)),
            ShmemError::DuplicateSession(id) => {
                DevhostError::invalid_argument(format!("duplicate session id: {id}"))
            }
            ShmemError::OutOfCapacity { requested, remaining } => DevhostError::out_of_capacity(
                format!("requested {requested} bytes, {remaining} remaining"),
            ),
            ShmemError::Protocol(msg) => DevhostError::protocol(msg),
        }
    }
}

/// Specialized result type for this crate's fallible operations.
pub type ShmemResult<T> = std::result::Result<T, ShmemError>;
