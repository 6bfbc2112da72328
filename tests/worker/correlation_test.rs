//! Integration tests for the correlation layer: request ids, concurrent
//! resolution, abandonment safety and worker teardown.

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::time::Duration;

use labdb::prelude::RowMode;
use labdb::worker::{WorkerClient, WorkerConfig, WorkerError};

fn config(dir: &Path) -> WorkerConfig {
    WorkerConfig {
        storage_dir: dir.to_path_buf(),
        database_name: "corr".to_string(),
        expected_schema_version: 2,
    }
}

async fn open_client(dir: &Path) -> WorkerClient {
    let client = WorkerClient::spawn(config(dir)).unwrap();
    client.init(None).await.unwrap();
    client.exec_script(common::SCHEMA_SQL).await.unwrap();
    client
}

#[tokio::test]
async fn test_overlapping_requests_resolve_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_client(dir.path()).await;
    client
        .exec_script("INSERT INTO protocols (id, name) VALUES ('p1', 'Transfer'), ('p2', 'Wash');")
        .await
        .unwrap();

    // Two unrelated statements in flight at once; each must get its own
    // payload regardless of arrival order.
    let left = client.exec(
        "SELECT name FROM protocols WHERE id = 'p1'",
        Vec::new(),
        RowMode::Array,
    );
    let right = client.exec(
        "SELECT name FROM protocols WHERE id = 'p2'",
        Vec::new(),
        RowMode::Array,
    );
    let (left, right) = tokio::join!(left, right);

    assert_eq!(left.unwrap()[0][0], "Transfer");
    assert_eq!(right.unwrap()[0][0], "Wash");
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_abandoned_request_does_not_leak_into_later_ones() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_client(dir.path()).await;

    // Send a request, then abandon it before its response arrives.
    {
        let fut = client.exec("SELECT 'abandoned'", Vec::new(), RowMode::Array);
        tokio::pin!(fut);
        let _ = futures::poll!(fut.as_mut());
        // fut dropped here
    }

    // A later unrelated request must get its own payload, never the
    // abandoned one's.
    let rows = client
        .exec("SELECT 42", Vec::new(), RowMode::Array)
        .await
        .unwrap();
    assert_eq!(rows[0][0], 42);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_statement_failure_is_local_to_its_request() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_client(dir.path()).await;

    let bad = client.exec("SELECT * FROM nonexistent", Vec::new(), RowMode::Object);
    let good = client.exec("SELECT 1 AS one", Vec::new(), RowMode::Object);
    let (bad, good) = tokio::join!(bad, good);

    match bad.unwrap_err() {
        WorkerError::Engine { message } => assert!(message.contains("no such table")),
        other => panic!("expected engine error, got {other:?}"),
    }
    assert_eq!(good.unwrap()[0]["one"], 1);
}

#[tokio::test]
async fn test_requests_after_close_fail_with_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_client(dir.path()).await;

    client.close_request().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!client.is_alive());

    let err = client
        .exec("SELECT 1", Vec::new(), RowMode::Array)
        .await
        .unwrap_err();
    match err {
        WorkerError::SendFailed | WorkerError::ChannelClosed => {}
        WorkerError::Engine { message } => assert!(message.contains("worker exited")),
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exec_before_init_reports_engine_not_open() {
    let dir = tempfile::tempdir().unwrap();
    let client = WorkerClient::spawn(config(dir.path())).unwrap();

    let err = client
        .exec("SELECT 1", Vec::new(), RowMode::Array)
        .await
        .unwrap_err();
    match err {
        WorkerError::Engine { message } => assert!(message.contains("not open")),
        other => panic!("expected engine error, got {other:?}"),
    }
}
