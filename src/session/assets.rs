//! Bootstrap asset fetching.
//!
//! The snapshot and schema artifacts are served by the host's ambient
//! asset-loading facility, which is an external collaborator. The trait
//! below is the seam: implementations may go over HTTP, an app bundle, or a
//! plain directory. Statuses are HTTP-shaped so the bootstrap can tell
//! "missing" (fall through to the next stage) from "broken" without binding
//! to a transport.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for asset fetches.
pub type FetchResult = Result<FetchedAsset, FetchError>;

/// Errors that can occur while fetching a bootstrap asset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The asset could not be read.
    #[error("failed to read asset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Transport-level failure (connection refused, interrupted, ...).
    #[error("asset fetch failed: {0}")]
    Transport(String),
}

/// A fetched asset with its transport status.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    /// HTTP-shaped status code (200 for a local hit, 404 for missing).
    pub status: u16,
    /// Raw asset bytes.
    pub body: Vec<u8>,
}

impl FetchedAsset {
    /// Build a successful asset.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// Build a not-found marker.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Vec::new(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching bootstrap assets from the host environment.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the asset at a well-known path.
    ///
    /// A missing asset should be reported as a non-success status rather
    /// than an error; errors are reserved for transport failures.
    async fn fetch(&self, path: &str) -> FetchResult;
}

/// Asset fetcher backed by a local directory.
///
/// Used by tests and embedded deployments that ship assets on disk.
pub struct DirAssetFetcher {
    root: PathBuf,
}

impl DirAssetFetcher {
    /// Serve assets from the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetFetcher for DirAssetFetcher {
    async fn fetch(&self, path: &str) -> FetchResult {
        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(body) => Ok(FetchedAsset::ok(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FetchedAsset::not_found()),
            Err(e) => Err(FetchError::Io {
                path: full.display().to_string(),
                source: e,
            }),
        }
    }
}
