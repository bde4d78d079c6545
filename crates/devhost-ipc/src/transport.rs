//! Endpoint naming and the raw duplex byte stream underneath the pipe
//! protocol. Isolated behind [`PipeEndpoint`] so the rest of the crate
//! never touches platform-specific socket/pipe types directly.

use std::path::PathBuf;

use interprocess::local_socket::tokio::{Listener as LocalListener, Stream as LocalStream};
use interprocess::local_socket::traits::tokio::{Listener as _, Stream as _};
use interprocess::local_socket::{GenericFilePath, GenericNamespaced, ListenerOptions, ToFsName, ToNsName};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::IpcError;

/// A logical pipe name: a Unix socket path on Unix, a `\\.\pipe\...` name
/// on Windows. Construction hides the platform difference; callers
/// supply the short name produced by [`crate::naming::derive_pipe_name`].
#[derive(Debug, Clone)]
pub struct PipeName(String);

impl PipeName {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self(short_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(unix)]
    fn socket_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("{}.sock", self.0))
    }

    #[cfg(windows)]
    fn windows_name(&self) -> String {
        format!(r"\\.\pipe\{}", self.0)
    }

    fn to_name(&self) -> std::io::Result<interprocess::local_socket::Name<'static>> {
        #[cfg(windows)]
        {
            self.windows_name().to_ns_name::<GenericNamespaced>()
        }
        #[cfg(unix)]
        {
            self.socket_path().to_fs_name::<GenericFilePath>()
        }
    }
}

/// A connected duplex pipe, implementing the async read/write traits the
/// line codec is built on.
pub struct PipeConnection {
    stream: LocalStream,
}

impl PipeConnection {
    pub async fn connect(name: &PipeName) -> Result<Self, IpcError> {
        let os_name = name.to_name()?;
        let stream = LocalStream::connect(os_name).await?;
        Ok(Self { stream })
    }

    pub fn split(self) -> (impl AsyncRead + Unpin, impl AsyncWrite + Unpin) {
        self.stream.split()
    }
}

/// A listening endpoint that accepts one connection at a time, used on
/// the child-process side of the pipe.
pub struct PipeListener {
    listener: LocalListener,
}

impl PipeListener {
    pub fn bind(name: &PipeName) -> Result<Self, IpcError> {
        let os_name = name.to_name()?;
        let listener = ListenerOptions::new().name(os_name).create_tokio()?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> Result<PipeConnection, IpcError> {
        let stream = self.listener.accept().await?;
        Ok(PipeConnection { stream })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_name_round_trips_as_str() {
        let name = PipeName::new("devhost-test-abc123");
        assert_eq!(name.as_str(), "devhost-test-abc123");
    }
}
