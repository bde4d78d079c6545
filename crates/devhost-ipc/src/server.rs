//! `PipeServer`: the child process's half of the duplex JSON pipe,
//! mirroring [`crate::client::PipeClient`] on the other end. A plugin
//! host binary registers a handler per message type and calls [`PipeServer::run`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use devhost_abi::{PipeEvent, PipeRequest, PipeResponse};
use tokio::sync::RwLock;

use crate::codec::{LineReader, LineWriter};
use crate::error::IpcError;
use crate::transport::{PipeListener, PipeName};

type HandlerFuture = Pin<Box<dyn Future<Output = PipeResponse> + Send>>;
type HandlerFn = Box<dyn Fn(PipeRequest) -> HandlerFuture + Send + Sync>;

/// Accepts one connection from the host and dispatches each request line
/// to a registered handler, in the order received (requests are not
/// processed concurrently, matching the host's one-in-flight contract).
pub struct PipeServer {
    name: PipeName,
    handlers: Arc<RwLock<HashMap<String, HandlerFn>>>,
}

impl PipeServer {
    pub fn new(name: PipeName) -> Self {
        Self {
            name,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register<F, Fut>(&self, message_type: impl Into<String>, handler: F)
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PipeResponse> + Send + 'static,
    {
        let boxed: HandlerFn = Box::new(move |req| Box::pin(handler(req)));
        self.handlers.write().await.insert(message_type.into(), boxed);
    }

    /// Binds the endpoint, accepts exactly one connection (the host that
    /// spawned this process), and serves requests until the pipe closes.
    pub async fn run(&self) -> Result<(), IpcError> {
        let listener = PipeListener::bind(&self.name)?;
        let connection = listener.accept().await?;
        let (read_half, write_half) = connection.split();
        let mut reader = LineReader::new(read_half);
        let mut writer = LineWriter::new(write_half);

        loop {
            let Some(line) = reader.read_line().await? else {
                tracing::debug!("host disconnected");
                break;
            };

            let request: PipeRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(err) => {
                    tracing::warn!(error = %err, line, "dropping malformed request");
                    continue;
                }
            };

            let response = {
                let handlers = self.handlers.read().await;
                match handlers.get(request.kind.as_str()) {
                    Some(handler) => handler(request.clone()).await,
                    None => PipeResponse::err(request.id.clone(), format!("unknown message type: {}", request.kind)),
                }
            };

            let response_line = response.to_line()?;
            writer.write_line(response_line.trim_end_matches('\n')).await?;
        }

        Ok(())
    }

    /// Emits an uncorrelated event line, e.g. `ui-state-invalidated`.
    pub async fn emit_event(writer: &mut LineWriter<impl tokio::io::AsyncWrite + Unpin>, event: &PipeEvent) -> Result<(), IpcError> {
        let line = serde_json::to_string(event)?;
        writer.write_line(&line).await
    }
}
