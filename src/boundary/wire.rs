//! JSON-lines transport
//!
//! `WireChannel` speaks newline-delimited JSON over any Tokio reader/writer
//! pair: a child process' stdio, a TCP or WebSocket bridge, or an in-memory
//! duplex in tests. Each outbound command carries a request id; the reply
//! (`ack` or `reject`) is matched back to the waiting caller by that id, so
//! replies may arrive in any order. `notify` messages are routed to the
//! registered cluster.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use crate::{
    boundary::{BoundaryChannel, InboundRouter, InboundTarget},
    core::id::ClusterId,
    prelude::{Arc, HashMap, Mutex, Weak},
    runtime::{self, AsyncHandle},
    ClusterError, Result,
};

/// One line on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Outbound command
    Invoke {
        id: u64,
        command: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// The command `id` completed
    Ack {
        id: u64,
        #[serde(default)]
        value: Value,
    },
    /// The remote side refused command `id`
    Reject { id: u64, reason: String },
    /// Inbound call addressed to a cluster
    Notify {
        target: ClusterId,
        method: String,
        #[serde(default)]
        payload: Value,
    },
}

impl WireMessage {
    /// Encode as a single line, newline included
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

type Reply = oneshot::Sender<Result<Value>>;

struct Shared {
    open: AtomicBool,
    pending: Mutex<HashMap<u64, Reply>>,
    router: InboundRouter,
}

impl Shared {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            pending: Mutex::new(HashMap::default()),
            router: InboundRouter::new(),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, Reply>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let message = match WireMessage::decode(line) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Skipping malformed wire message: {}", e);
                return;
            }
        };

        match message {
            WireMessage::Ack { id, value } => self.complete(id, Ok(value)),
            WireMessage::Reject { id, reason } => {
                self.complete(id, Err(ClusterError::RemoteRejected(reason)))
            }
            WireMessage::Notify {
                target,
                method,
                payload,
            } => {
                if let Err(e) = self.router.dispatch(&target, &method, payload) {
                    log::warn!("Dropping inbound {} for {}: {}", method, target, e);
                }
            }
            WireMessage::Invoke { command, .. } => {
                log::warn!("Ignoring inbound invoke of {}", command);
            }
        }
    }

    fn complete(&self, id: u64, result: Result<Value>) {
        let reply = self.pending().remove(&id);
        match reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            // The caller gave up (timeout or drop) before the reply came.
            None => log::debug!("Reply for unknown request {}", id),
        }
    }

    fn forget(&self, id: u64) {
        self.pending().remove(&id);
    }

    fn shutdown(&self, reason: &str) {
        self.open.store(false, Ordering::SeqCst);
        let drained: Vec<Reply> = self.pending().drain().map(|(_, reply)| reply).collect();
        if !drained.is_empty() {
            log::debug!("Failing {} pending requests: {}", drained.len(), reason);
        }
        for reply in drained {
            let _ = reply.send(Err(ClusterError::BoundaryUnavailable(reason.to_string())));
        }
    }
}

/// Drops the pending entry of a request whose caller stopped waiting
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.forget(self.id);
    }
}

async fn read_loop<R>(reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                shared.shutdown("remote side closed the connection");
                break;
            }
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(line) => shared.handle_line(line),
                Err(e) => log::warn!("Skipping wire line that is not UTF-8: {}", e),
            },
            Err(e) => {
                shared.shutdown(&format!("read failed: {}", e));
                break;
            }
        }
    }
    log::debug!("Wire reader exiting");
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// Sole owner of the writer. Lines arrive whole, so a caller that stops
/// waiting can never leave a partial frame behind.
async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        if let Err(e) = write_line(&mut writer, &line).await {
            shared.shutdown(&format!("write failed: {}", e));
            break;
        }
    }
    log::debug!("Wire writer exiting");
}

pub struct WireChannel {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<String>,
    next_id: AtomicU64,
    tasks: Mutex<Vec<Box<dyn AsyncHandle>>>,
}

impl WireChannel {
    /// Start a channel over `reader`/`writer`.
    ///
    /// Spawns the reader and writer tasks on the crate runtime, so this must
    /// be called from within a Tokio runtime.
    pub fn connect<R, W>(reader: R, writer: W) -> Arc<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared::new());
        let (outbound, queued) = mpsc::unbounded_channel();
        let tasks = vec![
            runtime::spawn(read_loop(reader, shared.clone())),
            runtime::spawn(write_loop(writer, queued, shared.clone())),
        ];

        Arc::new(Self {
            shared,
            outbound,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(tasks),
        })
    }

    /// Stop both tasks and fail every pending request
    pub fn close(&self) {
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.cancel();
        }
        self.shared.shutdown("channel closed locally");
    }

    /// Requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.shared.pending().len()
    }

    pub fn router(&self) -> &InboundRouter {
        &self.shared.router
    }

    fn enqueue(&self, id: u64, reply: Reply) -> Result<PendingGuard<'_>> {
        let mut pending = self.shared.pending();
        // Checked under the lock so a concurrent shutdown either sees this
        // entry or we see the closed flag.
        if !self.shared.open.load(Ordering::SeqCst) {
            return Err(ClusterError::BoundaryUnavailable("channel is closed".into()));
        }
        pending.insert(id, reply);
        Ok(PendingGuard {
            shared: &self.shared,
            id,
        })
    }
}

#[async_trait]
impl BoundaryChannel for WireChannel {
    async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = WireMessage::Invoke {
            id,
            command: command.to_string(),
            args,
        }
        .encode()?;

        let (tx, rx) = oneshot::channel();
        let _pending = self.enqueue(id, tx)?;

        log::debug!("-> {} #{}", command, id);
        if self.outbound.send(line).is_err() {
            return Err(ClusterError::BoundaryUnavailable("writer stopped".into()));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::BoundaryUnavailable(
                "channel dropped before reply".into(),
            )),
        }
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn register_inbound(&self, id: &ClusterId, target: Weak<dyn InboundTarget>) {
        self.shared.router.register(id, target);
    }

    fn unregister_inbound(&self, id: &ClusterId, target: &Weak<dyn InboundTarget>) {
        self.shared.router.unregister_if(id, target);
    }
}

impl Drop for WireChannel {
    fn drop(&mut self) {
        self.close();
    }
}
