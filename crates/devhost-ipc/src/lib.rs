//! Length-delimited JSON pipe transport between the devhost host process
//! and its out-of-process plugin hosts. [`client::PipeClient`] is the
//! host side; [`server::PipeServer`] is the plugin process side; both
//! speak the same newline-delimited message catalog from `devhost-abi`.

pub mod client;
pub mod codec;
pub mod error;
pub mod naming;
pub mod prelude;
pub mod server;
pub mod transport;

pub use client::PipeClient;
pub use error::{IpcError, IpcResult};
pub use naming::{derive_pipe_name, group_key};
pub use server::PipeServer;
pub use transport::{PipeConnection, PipeListener, PipeName};
