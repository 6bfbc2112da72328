//! Session lifecycle.
//!
//! A [`Session`] owns exactly one worker and the database inside it, behind
//! a single memoized `init()` contract: however many callers race on
//! initialization, one worker is created and all of them observe the same
//! terminal outcome. After a failure the memoized outcome is cleared, so the
//! next call is a genuine retry rather than a replay of a stale failure.

mod assets;
mod bootstrap;
mod seed;

pub use assets::{AssetFetcher, DirAssetFetcher, FetchError, FetchResult, FetchedAsset};
pub use bootstrap::BootstrapState;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::SeedCatalogs;
use crate::config::{Settings, SettingsError};
use crate::worker::protocol::{BatchOperation, RowMode, StatusResponse};
use crate::worker::{WorkerClient, WorkerConfig, WorkerError};

use bootstrap::Bootstrap;

/// Deadline for the graceful half of `close()`. Resource reclamation is
/// prioritized over a clean logical close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session API.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An executor method was called before `init` ever succeeded.
    #[error("session is not initialized")]
    NotInitialized,

    /// Worker transport or engine failure.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Bootstrap asset fetch failed at the last fallback stage.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The bootstrap chain exhausted every fallback stage.
    #[error("schema bootstrap failed: {reason}")]
    BootstrapFailed { reason: String },

    /// Settings could not be resolved.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Initialization failed; the original failure is shared by every
    /// caller that awaited the same attempt.
    #[error("initialization failed: {0}")]
    Init(Arc<SessionError>),
}

/// Memoized in-flight initialization outcome.
type InitFuture =
    Shared<Pin<Box<dyn Future<Output = Result<Arc<WorkerClient>, Arc<SessionError>>> + Send>>>;

#[derive(Default)]
struct Inner {
    /// The one worker handle. Exclusively owned by the lifecycle.
    client: Option<Arc<WorkerClient>>,
    /// Set only once bootstrap has fully resolved.
    ready: bool,
    /// In-flight (or completed) initialization, shared by overlapping calls.
    init: Option<InitFuture>,
}

/// The single owned database-plus-worker unit this crate manages.
///
/// # Example
///
/// ```ignore
/// use labdb::prelude::*;
///
/// let session = Session::new(Settings::default(), catalogs, fetcher);
/// session.init(None).await?;
/// let rows = session.exec("SELECT * FROM assets", Vec::new(), RowMode::Object).await?;
/// ```
pub struct Session {
    settings: Settings,
    catalogs: SeedCatalogs,
    fetcher: Arc<dyn AssetFetcher>,
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    /// Create a session. Nothing is spawned until `init` is called.
    pub fn new(
        settings: Settings,
        catalogs: SeedCatalogs,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self {
            settings,
            catalogs,
            fetcher,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Initialize the session: spawn the worker, open the database, and run
    /// the schema bootstrap. Completes once the session is usable.
    ///
    /// Re-entrant: calls made while a previous call's outcome is pending
    /// share that outcome instead of creating a second worker. `name`
    /// overrides the configured database name for this session.
    pub async fn init(&self, name: Option<&str>) -> SessionResult<()> {
        let future = {
            let mut inner = self.inner.lock().expect("session state lock poisoned");
            if inner.ready && inner.client.is_some() {
                return Ok(());
            }
            match &inner.init {
                Some(pending) => pending.clone(),
                None => {
                    debug!("starting session initialization");
                    let future = Self::run_init(
                        self.settings.clone(),
                        self.catalogs.clone(),
                        self.fetcher.clone(),
                        name.map(|n| n.to_string()),
                        self.inner.clone(),
                    )
                    .boxed()
                    .shared();
                    inner.init = Some(future.clone());
                    future
                }
            }
        };

        future.await.map(|_| ()).map_err(SessionError::Init)
    }

    /// The memoized initialization body: records the outcome on the shared
    /// state so every awaiting caller sees it, and resets state on failure.
    async fn run_init(
        settings: Settings,
        catalogs: SeedCatalogs,
        fetcher: Arc<dyn AssetFetcher>,
        name: Option<String>,
        inner: Arc<Mutex<Inner>>,
    ) -> Result<Arc<WorkerClient>, Arc<SessionError>> {
        let outcome = Self::open_and_bootstrap(&settings, &catalogs, fetcher.as_ref(), name).await;
        let mut inner = inner.lock().expect("session state lock poisoned");
        match outcome {
            Ok(client) => {
                // close() may have run while bootstrap was in flight; in
                // that case the session stays uninitialized and the handle
                // tears down once the last caller drops it.
                if inner.init.is_some() {
                    inner.client = Some(client.clone());
                    inner.ready = true;
                }
                Ok(client)
            }
            Err(e) => {
                // Clear the memoized outcome so a later call retries for
                // real instead of replaying this failure.
                inner.init = None;
                inner.client = None;
                inner.ready = false;
                Err(Arc::new(e))
            }
        }
    }

    async fn open_and_bootstrap(
        settings: &Settings,
        catalogs: &SeedCatalogs,
        fetcher: &dyn AssetFetcher,
        name: Option<String>,
    ) -> SessionResult<Arc<WorkerClient>> {
        let config = WorkerConfig {
            storage_dir: settings.storage.resolved_dir()?,
            database_name: name
                .clone()
                .unwrap_or_else(|| settings.storage.database_name.clone()),
            expected_schema_version: settings.schema.expected_version,
        };
        let client = Arc::new(WorkerClient::spawn(config)?);

        let start = match client.init(name).await {
            Ok(()) => BootstrapState::Unchecked,
            Err(WorkerError::SchemaMismatch {
                current_version,
                expected_version,
            }) => {
                warn!(
                    current_version,
                    expected_version, "schema version mismatch reported by worker"
                );
                BootstrapState::Resetting
            }
            Err(e) => return Err(e.into()),
        };

        let bootstrap = Bootstrap {
            client: &client,
            fetcher,
            catalogs,
            settings,
        };
        bootstrap.run(start).await?;

        Ok(client)
    }

    /// True once `init` has succeeded and `close` has not been called.
    pub fn is_ready(&self) -> bool {
        self.inner.lock().expect("session state lock poisoned").ready
    }

    /// Fetch the worker handle, failing fast when the session is not ready.
    ///
    /// This is the synchronous not-initialized misuse check: no worker is
    /// ever contacted.
    fn ready_client(&self) -> SessionResult<Arc<WorkerClient>> {
        let inner = self.inner.lock().expect("session state lock poisoned");
        if inner.ready {
            if let Some(client) = &inner.client {
                return Ok(client.clone());
            }
        }
        Err(SessionError::NotInitialized)
    }

    // ------------------------------------------------------------------
    // Statement/batch executor & snapshot transfer
    // ------------------------------------------------------------------

    /// Execute a single statement with optional positional bindings.
    pub async fn exec(
        &self,
        sql: &str,
        bind: Vec<serde_json::Value>,
        row_mode: RowMode,
    ) -> SessionResult<Vec<serde_json::Value>> {
        Ok(self.ready_client()?.exec(sql, bind, row_mode).await?)
    }

    /// Execute multiple statements as one atomic unit.
    pub async fn exec_batch(&self, operations: Vec<BatchOperation>) -> SessionResult<()> {
        Ok(self.ready_client()?.exec_batch(operations).await?)
    }

    /// Export the entire database as an opaque binary snapshot.
    pub async fn export_database(&self) -> SessionResult<Vec<u8>> {
        Ok(self.ready_client()?.export().await?)
    }

    /// Replace the database contents with a snapshot. No previous data
    /// survives an import.
    pub async fn import_database(&self, bytes: &[u8]) -> SessionResult<()> {
        Ok(self.ready_client()?.import(bytes).await?)
    }

    /// Report engine/version information.
    pub async fn status(&self) -> SessionResult<StatusResponse> {
        Ok(self.ready_client()?.status().await?)
    }

    /// Shut the session down.
    ///
    /// Best-effort graceful close under a short deadline, then the worker
    /// handle is dropped unconditionally and the session returns to the
    /// uninitialized state. A no-op on an uninitialized session.
    pub async fn close(&self) {
        let client = {
            let mut inner = self.inner.lock().expect("session state lock poisoned");
            inner.ready = false;
            inner.init = None;
            inner.client.take()
        };

        if let Some(client) = client {
            match tokio::time::timeout(CLOSE_GRACE, client.close_request()).await {
                Ok(Ok(())) => debug!("worker closed gracefully"),
                Ok(Err(e)) => debug!(error = %e, "graceful close failed"),
                Err(_) => warn!("graceful close timed out, terminating worker"),
            }
            // Dropping the last handle tears the worker down.
        }
    }
}
