//! Convenience re-exports for crates that consume the pipe transport.

pub use crate::client::PipeClient;
pub use crate::error::{IpcError, IpcResult};
pub use crate::naming::{derive_pipe_name, group_key};
pub use crate::server::PipeServer;
pub use crate::transport::{PipeConnection, PipeListener, PipeName};
