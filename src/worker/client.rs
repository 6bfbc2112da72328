//! Async client for communicating with the worker thread.

use std::collections::HashMap;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::engine::{self, WorkerConfig};
use super::error::{WorkerError, WorkerResult};
use super::protocol::{
    Ack, BatchOperation, BatchParams, ExecParams, ExecResponse, ExportResponse, ImportParams,
    InitParams, RequestEnvelope, RequestKind, ResponseBody, ResponseEnvelope, ReturnValue,
    RowMode, StatusResponse,
};

/// Map of pending request IDs to response channels.
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>;

/// Async client for the embedded database worker.
///
/// The client spawns the worker as a dedicated thread owning the SQLite
/// connection and exchanges request/response envelopes with it over
/// channels. Each request has a unique ID for correlation with responses,
/// enabling concurrent requests that resolve in any order.
///
/// # Example
///
/// ```ignore
/// use labdb::worker::{WorkerClient, WorkerConfig};
///
/// let client = WorkerClient::spawn(config)?;
/// client.init(None).await?;
/// let rows = client.exec("SELECT 1", Vec::new(), RowMode::Array).await?;
/// ```
pub struct WorkerClient {
    /// Sender for posting requests to the worker thread.
    request_tx: std_mpsc::Sender<RequestEnvelope>,

    /// Map of pending request IDs to response channels.
    pending: PendingMap,

    /// Handle to the background dispatch task.
    _dispatch_task: tokio::task::JoinHandle<()>,

    /// Handle to the worker thread.
    _worker_thread: std::thread::JoinHandle<()>,
}

impl WorkerClient {
    /// Spawn the worker thread and wire its outbound channel into the
    /// dispatch task.
    ///
    /// Must be called inside a tokio runtime. Returns an error if the OS
    /// refuses to spawn the thread.
    pub fn spawn(config: WorkerConfig) -> WorkerResult<Self> {
        let (request_tx, request_rx) = std_mpsc::channel::<RequestEnvelope>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<ResponseEnvelope>();

        let worker_thread = std::thread::Builder::new()
            .name("labdb-worker".to_string())
            .spawn(move || engine::run(config, request_rx, response_tx))
            .map_err(WorkerError::SpawnFailed)?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let dispatch_task = Self::spawn_dispatch_task(response_rx, pending.clone());

        Ok(Self {
            request_tx,
            pending,
            _dispatch_task: dispatch_task,
            _worker_thread: worker_thread,
        })
    }

    /// Spawn the background task that demultiplexes worker responses.
    fn spawn_dispatch_task(
        mut responses: mpsc::UnboundedReceiver<ResponseEnvelope>,
        pending: PendingMap,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(response) = responses.recv().await {
                let entry = pending
                    .lock()
                    .expect("pending map lock poisoned")
                    .remove(&response.id);
                match entry {
                    // Send response to the waiting caller; if the caller
                    // already hung up the response is dropped here.
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    // Late response for an abandoned request.
                    None => {
                        warn!(id = %response.id, "dropping response with no pending request");
                    }
                }
            }

            // Worker exited - fail all outstanding requests.
            debug!("worker response channel closed");
            let drained: Vec<_> = {
                let mut pending = pending.lock().expect("pending map lock poisoned");
                pending.drain().collect()
            };
            for (id, tx) in drained {
                let _ = tx.send(ResponseEnvelope {
                    id,
                    body: ResponseBody::Error {
                        error: super::protocol::ErrorInfo {
                            message: "worker exited unexpectedly".to_string(),
                        },
                    },
                });
            }
        })
    }

    /// Send a request to the worker and wait for its response.
    ///
    /// No timeout is imposed here; callers needing bounded waits layer their
    /// own deadline above this method. Dropping the returned future before
    /// the response arrives removes the pending entry, so a late reply for
    /// the abandoned id is discarded instead of leaking.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails, the worker is gone, or the
    /// worker reports an error (including a schema-version mismatch for
    /// `init` requests).
    pub async fn request<P, R>(&self, kind: RequestKind, params: P) -> WorkerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestEnvelope {
            id: id.clone(),
            kind,
            params: serde_json::to_value(params).map_err(WorkerError::SerializeFailed)?,
        };

        // Register the response channel before sending so the response can
        // never race past us.
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending map lock poisoned")
            .insert(id.clone(), tx);
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            id: id.clone(),
        };

        self.request_tx
            .send(request)
            .map_err(|_| WorkerError::SendFailed)?;

        let response = rx.await.map_err(|_| WorkerError::ChannelClosed)?;

        match response.body {
            ResponseBody::Result { result } => {
                serde_json::from_value(result).map_err(WorkerError::DeserializeFailed)
            }
            ResponseBody::Error { error } => {
                let message = if error.message.is_empty() {
                    "unknown worker error".to_string()
                } else {
                    error.message
                };
                Err(WorkerError::Engine { message })
            }
            ResponseBody::SchemaMismatch {
                current_version,
                expected_version,
            } => Err(WorkerError::SchemaMismatch {
                current_version,
                expected_version,
            }),
        }
    }

    /// Check if the worker is still running.
    ///
    /// Returns `false` once the dispatch task has finished, which happens
    /// when the worker thread exits.
    pub fn is_alive(&self) -> bool {
        !self._dispatch_task.is_finished()
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().expect("pending map lock poisoned").len()
    }
}

/// Removes the pending entry if the caller abandons the request.
struct PendingGuard {
    pending: PendingMap,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

// Convenience methods for the protocol operations
impl WorkerClient {
    /// Open the database and check the schema version marker.
    pub async fn init(&self, name: Option<String>) -> WorkerResult<()> {
        self.request::<_, Ack>(RequestKind::Init, InitParams { name })
            .await
            .map(|_| ())
    }

    /// Execute a single statement and return its rows.
    pub async fn exec(
        &self,
        sql: &str,
        bind: Vec<serde_json::Value>,
        row_mode: RowMode,
    ) -> WorkerResult<Vec<serde_json::Value>> {
        let response: ExecResponse = self
            .request(
                RequestKind::Exec,
                ExecParams {
                    sql: sql.to_string(),
                    bind,
                    row_mode,
                    return_value: ReturnValue::ResultRows,
                },
            )
            .await?;
        Ok(response.result_rows)
    }

    /// Execute SQL text as a script: multiple statements, no rows returned.
    pub async fn exec_script(&self, sql: &str) -> WorkerResult<()> {
        self.request::<_, ExecResponse>(
            RequestKind::Exec,
            ExecParams {
                sql: sql.to_string(),
                bind: Vec::new(),
                row_mode: RowMode::Object,
                return_value: ReturnValue::None,
            },
        )
        .await
        .map(|_| ())
    }

    /// Execute multiple statements as one atomic unit.
    pub async fn exec_batch(&self, operations: Vec<BatchOperation>) -> WorkerResult<()> {
        self.request::<_, Ack>(RequestKind::ExecBatch, BatchParams { operations })
            .await
            .map(|_| ())
    }

    /// Export the entire database as an opaque snapshot.
    pub async fn export(&self) -> WorkerResult<Vec<u8>> {
        let response: ExportResponse = self
            .request(RequestKind::Export, serde_json::json!({}))
            .await?;
        super::protocol::decode_snapshot(&response.bytes)
            .map_err(|e| WorkerError::InvalidSnapshot(e.to_string()))
    }

    /// Replace the database contents with a snapshot.
    pub async fn import(&self, bytes: &[u8]) -> WorkerResult<()> {
        self.request::<_, Ack>(
            RequestKind::Import,
            ImportParams {
                bytes: super::protocol::encode_snapshot(bytes),
            },
        )
        .await
        .map(|_| ())
    }

    /// Report engine/version information.
    pub async fn status(&self) -> WorkerResult<StatusResponse> {
        self.request(RequestKind::Status, serde_json::json!({}))
            .await
    }

    /// Wipe the persisted database files and reopen a fresh database.
    pub async fn clear(&self) -> WorkerResult<()> {
        self.request::<_, Ack>(RequestKind::Clear, serde_json::json!({}))
            .await
            .map(|_| ())
    }

    /// Ask the worker to shut down gracefully.
    pub async fn close_request(&self) -> WorkerResult<()> {
        self.request::<_, Ack>(RequestKind::Close, serde_json::json!({}))
            .await
            .map(|_| ())
    }
}
