//! Per-session message streaming: a bounded, paginated, searchable log of
//! frames the host has sent or received, with a pause gate the frame pump
//! consults before appending a drained frame.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod buffer;
pub mod message;
pub mod prelude;
pub mod service;

pub use buffer::BoundedBuffer;
pub use message::{format_frame_preview, Direction, LogMessage};
pub use service::{MessageStreamService, DEFAULT_MAX_MESSAGES};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("invalid search query: {0}")]
    InvalidQuery(String),
}

pub type StreamResult<T> = Result<T, StreamError>;
