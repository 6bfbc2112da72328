//! Integration tests for the schema bootstrap state machine: snapshot path,
//! schema fallback path, and the destructive version-mismatch reset.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use labdb::prelude::*;
use labdb::session::FetchedAsset;

use common::{count, session_with, BrokenFetcher, StubFetcher};

async fn user_version(session: &Session) -> i64 {
    let rows = session
        .exec("PRAGMA user_version", Vec::new(), RowMode::Array)
        .await
        .unwrap();
    rows[0][0].as_i64().unwrap()
}

#[tokio::test]
async fn test_scenario_a_snapshot_import() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::with_all(&settings, common::build_snapshot(2));
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();

    // The snapshot populates the protocols table; that is the definitive
    // "real data present" signal.
    assert_eq!(count(&session, "protocols").await, 3);
    assert_eq!(user_version(&session).await, 2);
    session.close().await;
}

#[tokio::test]
async fn test_scenario_b_schema_fallback_seeds_catalogs() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();

    // Fallback path: protocols may be empty, but catalogs and default
    // assets must be populated and the version marker stamped.
    assert_eq!(count(&session, "protocols").await, 0);
    assert_eq!(count(&session, "machine_defs").await, 2);
    assert_eq!(count(&session, "resource_defs").await, 3);
    assert_eq!(count(&session, "frontend_defs").await, 1);
    assert_eq!(count(&session, "backend_defs").await, 1);
    assert_eq!(count(&session, "assets").await, 3);
    assert_eq!(user_version(&session).await, 2);

    let rows = session
        .exec(
            "SELECT instance_name FROM assets WHERE resource_def_id = 'trough'",
            Vec::new(),
            RowMode::Array,
        )
        .await
        .unwrap();
    assert_eq!(rows[0][0], "deep_well_trough");
    session.close().await;
}

#[tokio::test]
async fn test_scenario_c_version_mismatch_resets_and_reloads() {
    let dir = tempfile::tempdir().unwrap();

    // First boot at schema version 1 via the fallback path.
    {
        let settings = common::test_settings(dir.path(), 1);
        let fetcher = StubFetcher::schema_only(&settings);
        let session = Session::new(settings, common::sample_catalogs(), fetcher);
        session.init(None).await.unwrap();
        assert_eq!(user_version(&session).await, 1);
        session.close().await;
    }

    // Second boot expects version 2: the worker reports a mismatch, the
    // session wipes persisted state and reloads from the snapshot.
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::with_all(&settings, common::build_snapshot(2));
    let session = Session::new(settings, common::sample_catalogs(), fetcher);
    session.init(None).await.unwrap();

    assert_eq!(user_version(&session).await, 2);
    assert_eq!(count(&session, "protocols").await, 3);
    // The version-1 catalogs did not survive; the snapshot ships none.
    assert_eq!(count(&session, "machine_defs").await, 0);
    session.close().await;
}

#[tokio::test]
async fn test_snapshot_error_status_falls_back_to_schema() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    fetcher.insert(
        &settings.assets.snapshot_path,
        FetchedAsset {
            status: 500,
            body: Vec::new(),
        },
    );
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();
    assert_eq!(count(&session, "machine_defs").await, 2);
    session.close().await;
}

#[tokio::test]
async fn test_empty_snapshot_body_falls_back_to_schema() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    fetcher.insert(&settings.assets.snapshot_path, FetchedAsset::ok(Vec::new()));
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();
    assert_eq!(count(&session, "assets").await, 3);
    session.close().await;
}

#[tokio::test]
async fn test_all_fallback_stages_exhausted_fails_init() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_with(dir.path(), 2, StubFetcher::empty());

    match session.init(None).await.unwrap_err() {
        SessionError::Init(inner) => {
            assert!(matches!(*inner, SessionError::BootstrapFailed { .. }))
        }
        other => panic!("expected init failure, got {other:?}"),
    }
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_transport_failure_surfaces_after_last_stage() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_with(dir.path(), 2, Arc::new(BrokenFetcher));

    match session.init(None).await.unwrap_err() {
        SessionError::Init(inner) => assert!(matches!(*inner, SessionError::Fetch(_))),
        other => panic!("expected init failure, got {other:?}"),
    }
}
