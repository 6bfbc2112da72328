//! Integration tests for the session lifecycle: memoized initialization,
//! misuse errors, retry after failure, and close semantics.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use labdb::prelude::*;
use labdb::session::FetchedAsset;

use common::{count, session_with, StubFetcher};

#[tokio::test]
async fn test_executor_before_init_fails_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_with(dir.path(), 2, StubFetcher::empty());

    let err = session
        .exec("SELECT 1", Vec::new(), RowMode::Array)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotInitialized));

    let err = session.export_database().await.unwrap_err();
    assert!(matches!(err, SessionError::NotInitialized));
}

#[tokio::test]
async fn test_concurrent_inits_share_one_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    let session = Arc::new(Session::new(settings, common::sample_catalogs(), fetcher));

    let attempts =
        futures::future::join_all((0..8).map(|_| session.init(None))).await;
    assert!(attempts.iter().all(Result::is_ok));
    assert!(session.is_ready());

    // Default-asset ids are generated per seeding run, so a duplicated
    // bootstrap would show up as extra asset rows.
    assert_eq!(count(&session, "assets").await, 3);
}

#[tokio::test]
async fn test_concurrent_failed_inits_observe_the_same_outcome() {
    let dir = tempfile::tempdir().unwrap();
    // Both assets missing: bootstrap exhausts its fallback chain.
    let session = Arc::new(session_with(dir.path(), 2, StubFetcher::empty()));

    let attempts =
        futures::future::join_all((0..4).map(|_| session.init(None))).await;

    let mut shared: Option<Arc<SessionError>> = None;
    for attempt in attempts {
        match attempt.unwrap_err() {
            SessionError::Init(inner) => match &shared {
                Some(first) => assert!(Arc::ptr_eq(first, &inner)),
                None => shared = Some(inner),
            },
            other => panic!("expected init failure, got {other:?}"),
        }
    }
    assert!(matches!(
        *shared.unwrap(),
        SessionError::BootstrapFailed { .. }
    ));
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_failed_init_is_retried_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::empty();
    let session = Session::new(
        settings.clone(),
        common::sample_catalogs(),
        fetcher.clone(),
    );

    assert!(session.init(None).await.is_err());

    // Make the schema asset appear; the next call must be a genuine retry.
    fetcher.insert(
        &settings.assets.schema_path,
        FetchedAsset::ok(common::SCHEMA_SQL.as_bytes().to_vec()),
    );
    session.init(None).await.unwrap();
    assert!(session.is_ready());
    assert_eq!(count(&session, "machine_defs").await, 2);
}

#[tokio::test]
async fn test_close_returns_session_to_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();
    session.close().await;
    assert!(!session.is_ready());

    let err = session
        .exec("SELECT 1", Vec::new(), RowMode::Array)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotInitialized));

    // Re-initialization after close reopens the same persisted database.
    session.init(None).await.unwrap();
    assert_eq!(count(&session, "machine_defs").await, 2);
    session.close().await;
}

#[tokio::test]
async fn test_close_on_uninitialized_session_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_with(dir.path(), 2, StubFetcher::empty());
    session.close().await;
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_init_is_idempotent_once_ready() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();
    let before = count(&session, "assets").await;
    session.init(None).await.unwrap();
    assert_eq!(count(&session, "assets").await, before);
}

#[tokio::test]
async fn test_status_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::test_settings(dir.path(), 2);
    let fetcher = StubFetcher::schema_only(&settings);
    let session = Session::new(settings, common::sample_catalogs(), fetcher);

    session.init(None).await.unwrap();
    let status = session.status().await.unwrap();
    assert_eq!(status.engine, "sqlite");
}
