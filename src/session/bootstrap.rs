//! Schema bootstrap state machine.
//!
//! Decides between "already seeded", "fresh load from snapshot", "fallback
//! schema + seed" and "reset on version mismatch". The definitive "real data
//! present" signal is the protocol row count, not table existence: the
//! snapshot populates `protocols`, while the schema+seed fallback may
//! legitimately leave it empty, in which case the next boot seeds again.

use tracing::{debug, info, warn};

use super::assets::AssetFetcher;
use super::seed;
use super::SessionError;
use crate::catalog::SeedCatalogs;
use crate::config::Settings;
use crate::worker::protocol::RowMode;
use crate::worker::WorkerClient;

/// States of the bootstrap machine.
///
/// Normal path: `Unchecked → CheckingProtocols → {SeedingFresh | Ready}`.
/// A version mismatch reported by the worker's init reply enters at
/// `Resetting`, which wipes persisted state and re-enters `Unchecked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Unchecked,
    CheckingProtocols,
    SeedingFresh,
    Resetting,
    Ready,
}

/// One bootstrap run against an open worker.
pub(crate) struct Bootstrap<'a> {
    pub client: &'a WorkerClient,
    pub fetcher: &'a dyn AssetFetcher,
    pub catalogs: &'a SeedCatalogs,
    pub settings: &'a Settings,
}

impl Bootstrap<'_> {
    /// Drive the machine from `start` until `Ready`.
    ///
    /// Any failure aborts the whole initialization; there is no partial
    /// success visible to callers.
    pub(crate) async fn run(&self, start: BootstrapState) -> Result<(), SessionError> {
        let mut state = start;
        while state != BootstrapState::Ready {
            let next = self.step(state).await?;
            debug!(from = ?state, to = ?next, "bootstrap transition");
            state = next;
        }
        Ok(())
    }

    async fn step(&self, state: BootstrapState) -> Result<BootstrapState, SessionError> {
        match state {
            BootstrapState::Unchecked => Ok(BootstrapState::CheckingProtocols),

            BootstrapState::CheckingProtocols => {
                let count = self.protocol_count().await?;
                if count > 0 {
                    // Real data present: never reseed after first boot.
                    Ok(BootstrapState::Ready)
                } else {
                    Ok(BootstrapState::SeedingFresh)
                }
            }

            BootstrapState::SeedingFresh => {
                self.seed_fresh().await?;
                Ok(BootstrapState::Ready)
            }

            BootstrapState::Resetting => {
                // Deliberate data-loss tradeoff: availability over
                // preservation. The warning carries both versions so hosts
                // can build a confirmation flow above this core.
                warn!("clearing persisted state after schema version mismatch");
                self.client.clear().await?;
                Ok(BootstrapState::Unchecked)
            }

            BootstrapState::Ready => Ok(BootstrapState::Ready),
        }
    }

    /// Count rows in the table only a fully-seeded database populates.
    ///
    /// A missing table is treated identically to a zero count.
    async fn protocol_count(&self) -> Result<i64, SessionError> {
        match self
            .client
            .exec("SELECT COUNT(*) FROM protocols", Vec::new(), RowMode::Array)
            .await
        {
            Ok(rows) => Ok(rows
                .first()
                .and_then(|row| row.get(0))
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)),
            Err(e) if e.is_missing_table() => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Fallback chain for a fresh database, first success wins:
    /// (a) import the prebuilt snapshot; (b) execute the raw schema
    /// definition, stamp the version marker, then seed catalogs and default
    /// assets.
    async fn seed_fresh(&self) -> Result<(), SessionError> {
        match self.fetcher.fetch(&self.settings.assets.snapshot_path).await {
            Ok(asset) if asset.is_success() && !asset.body.is_empty() => {
                info!(bytes = asset.body.len(), "loading prebuilt snapshot");
                self.client.import(&asset.body).await?;
                return Ok(());
            }
            Ok(asset) => {
                debug!(status = asset.status, "snapshot unavailable, trying schema");
            }
            Err(e) => {
                debug!(error = %e, "snapshot fetch failed, trying schema");
            }
        }

        let schema = self.fetcher.fetch(&self.settings.assets.schema_path).await?;
        if !schema.is_success() {
            return Err(SessionError::BootstrapFailed {
                reason: format!(
                    "no snapshot and schema asset unavailable (status {})",
                    schema.status
                ),
            });
        }

        info!("executing schema definition");
        let sql = String::from_utf8_lossy(&schema.body);
        self.client.exec_script(&sql).await?;
        self.client
            .exec_script(&format!(
                "PRAGMA user_version = {}",
                self.settings.schema.expected_version
            ))
            .await?;

        seed::seed_catalogs(self.client, self.catalogs).await?;
        seed::seed_default_assets(self.client, self.catalogs).await?;
        Ok(())
    }
}
