//! Deterministic, idempotent seeding of reference catalogs.
//!
//! Catalog rows use conflict-ignore inserts so re-running the engine against
//! an already-seeded database produces no duplicates. Everything goes to the
//! worker as one atomic batch: one round trip regardless of catalog size.

use inflector::Inflector;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::catalog::SeedCatalogs;
use crate::worker::protocol::{BatchOperation, RowMode};
use crate::worker::{WorkerClient, WorkerResult};

/// Populate the reference-catalog tables from the host-supplied definition
/// lists. Idempotent: every insert ignores conflicts on the stable id.
pub(crate) async fn seed_catalogs(
    client: &WorkerClient,
    catalogs: &SeedCatalogs,
) -> WorkerResult<()> {
    let operations = catalog_operations(catalogs);
    if operations.is_empty() {
        return Ok(());
    }

    info!(rows = operations.len(), "seeding reference catalogs");
    client.exec_batch(operations).await
}

/// Build the flat list of (statement, bound-parameters) pairs for all four
/// definition lists.
fn catalog_operations(catalogs: &SeedCatalogs) -> Vec<BatchOperation> {
    let mut operations = Vec::with_capacity(catalogs.len());

    for machine in &catalogs.machines {
        operations.push(BatchOperation {
            sql: "INSERT OR IGNORE INTO machine_defs (id, name, vendor) VALUES (?1, ?2, ?3)"
                .to_string(),
            bind: vec![
                json!(machine.id),
                json!(machine.name),
                json!(machine.vendor),
            ],
        });
    }

    for resource in &catalogs.resources {
        operations.push(BatchOperation {
            sql: "INSERT OR IGNORE INTO resource_defs (id, name, category) VALUES (?1, ?2, ?3)"
                .to_string(),
            bind: vec![
                json!(resource.id),
                json!(resource.name),
                json!(resource.category),
            ],
        });
    }

    for frontend in &catalogs.frontends {
        operations.push(BatchOperation {
            sql: "INSERT OR IGNORE INTO frontend_defs (id, name) VALUES (?1, ?2)".to_string(),
            bind: vec![json!(frontend.id), json!(frontend.name)],
        });
    }

    for backend in &catalogs.backends {
        operations.push(BatchOperation {
            sql: "INSERT OR IGNORE INTO backend_defs (id, name, kind) VALUES (?1, ?2, ?3)"
                .to_string(),
            bind: vec![json!(backend.id), json!(backend.name), json!(backend.kind)],
        });
    }

    operations
}

/// Create one default asset per resource definition, unless any asset rows
/// already exist. User-created assets are never overwritten.
pub(crate) async fn seed_default_assets(
    client: &WorkerClient,
    catalogs: &SeedCatalogs,
) -> WorkerResult<()> {
    let rows = client
        .exec("SELECT COUNT(*) FROM assets", Vec::new(), RowMode::Array)
        .await?;
    let existing = rows
        .first()
        .and_then(|row| row.get(0))
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0);
    if existing > 0 {
        return Ok(());
    }

    let operations: Vec<BatchOperation> = catalogs
        .resources
        .iter()
        .map(|resource| BatchOperation {
            sql: "INSERT INTO assets (id, resource_def_id, instance_name) VALUES (?1, ?2, ?3)"
                .to_string(),
            bind: vec![
                json!(Uuid::new_v4().to_string()),
                json!(resource.id),
                json!(resource.name.to_snake_case()),
            ],
        })
        .collect();
    if operations.is_empty() {
        return Ok(());
    }

    info!(rows = operations.len(), "seeding default assets");
    client.exec_batch(operations).await
}
