//! Pipe transport error types, convertible into [`devhost_errors::DevhostError`]
//! at the crate boundary.

use devhost_errors::DevhostError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("pipe is not connected")]
    NotConnected,

    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl From<IpcError> for DevhostError {
    fn from(err: IpcError) -> Self {
        match err {
            IpcError::Io(e) => DevhostError::Io(e),
            IpcError::Json(e) => DevhostError::protocol(format!("malformed pipe message: {e}")),
            IpcError::Protocol(msg) => DevhostError::protocol(msg),
            IpcError::Timeout(d) => DevhostError::Timeout(d),
            IpcError::NotConnected => DevhostError::protocol("pipe is not connected"),
            IpcError::ConnectionClosed => DevhostError::protocol("pipe connection closed"),
        }
    }
}

pub type IpcResult<T> = std::result::Result<T, IpcError>;
