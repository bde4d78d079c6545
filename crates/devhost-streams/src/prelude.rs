pub use crate::message::{format_frame_preview, Direction, LogMessage};
pub use crate::service::{MessageStreamService, DEFAULT_MAX_MESSAGES};
pub use crate::{StreamError, StreamResult};
