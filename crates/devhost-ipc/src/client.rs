//! `PipeClient`: the host's half of the duplex JSON pipe to one plugin
//! process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use devhost_abi::messages::InboundLine;
use devhost_abi::{PipeEvent, PipeRequest, PipeResponse};
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot, Mutex as AsyncMutex};

use crate::codec::{LineReader, LineWriter};
use crate::error::IpcError;
use crate::transport::{PipeConnection, PipeName};

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<PipeResponse>>>>;

/// Connects to a single child process's pipe and exchanges one
/// correlated request/response at a time, while forwarding uncorrelated
/// event lines to subscribers.
pub struct PipeClient {
    name: PipeName,
    connect_timeout: Duration,
    writer: AsyncMutex<Option<LineWriter<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>>>,
    pending: PendingMap,
    events: broadcast::Sender<PipeEvent>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PipeClient {
    pub fn new(name: PipeName, connect_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            name,
            connect_timeout,
            writer: AsyncMutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            events,
            reader_task: Mutex::new(None),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PipeEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.reader_task.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn ensure_connected(&self) -> Result<(), IpcError> {
        if self.is_connected() {
            return Ok(());
        }

        let connection = tokio::time::timeout(self.connect_timeout, PipeConnection::connect(&self.name))
            .await
            .map_err(|_| IpcError::Timeout(self.connect_timeout))??;

        let (read_half, write_half) = connection.split();
        let write_half: Box<dyn tokio::io::AsyncWrite + Send + Unpin> = Box::new(write_half);
        *self.writer.lock().await = Some(LineWriter::new(write_half));

        let pending = self.pending.clone();
        let events = self.events.clone();
        let mut reader = LineReader::new(read_half);
        let handle = tokio::spawn(async move {
            loop {
                match reader.read_line().await {
                    Ok(Some(line)) => match InboundLine::parse(&line) {
                        Ok(InboundLine::Response(response)) => {
                            if let Some(sender) = pending.lock().remove(&response.id) {
                                let _ = sender.send(response);
                            }
                        }
                        Ok(InboundLine::Event(event)) => {
                            let _ = events.send(event);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, line, "dropping malformed pipe line");
                        }
                    },
                    Ok(None) => {
                        tracing::debug!("pipe connection closed by peer");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "pipe read error");
                        break;
                    }
                }
            }
        });
        *self.reader_task.lock() = Some(handle);

        Ok(())
    }

    /// Sends `request` and waits up to `timeout` for its response.
    /// Returns `Ok(None)` on timeout; the connection is left open so a
    /// later call can still succeed.
    pub async fn send(&self, request: PipeRequest, timeout: Duration) -> Result<Option<PipeResponse>, IpcError> {
        self.ensure_connected().await?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request.id.clone(), tx);

        let line = request.to_line()?;
        let line = line.trim_end_matches('\n');
        {
            let mut writer_guard = self.writer.lock().await;
            let writer = writer_guard.as_mut().ok_or(IpcError::NotConnected)?;
            if let Err(err) = writer.write_line(&line).await {
                self.pending.lock().remove(&request.id);
                return Err(err);
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(_)) => {
                self.pending.lock().remove(&request.id);
                Ok(None)
            }
            Err(_) => {
                self.pending.lock().remove(&request.id);
                Ok(None)
            }
        }
    }

    /// Closes the reader task and drops the writer. Safe to call more
    /// than once.
    pub async fn dispose(&self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
        self.writer.lock().await.take();
        self.pending.lock().clear();
    }
}
