//! # labdb
//!
//! A client-resident embedded-database session manager: one SQLite database
//! living inside an isolated worker execution context, behind a uniform
//! request/response API and a single linear `init()` contract.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Session (lifecycle)                  │
//! │   memoized init · ready flag · executor · close         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [bootstrap state machine]
//! ┌─────────────────────────────────────────────────────────┐
//! │   protocol-count check → snapshot import │ schema+seed  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [correlation layer]
//! ┌─────────────────────────────────────────────────────────┐
//! │   WorkerClient: id → pending completion, dispatch loop  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [request/response envelopes]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Worker thread: rusqlite connection, serial execution  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers invoke [`session::Session::init`] once; every statement, batch,
//! snapshot transfer and status probe then flows through the same
//! correlation layer the bootstrap used.

pub mod catalog;
pub mod config;
pub mod session;
pub mod worker;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{BackendDef, FrontendDef, MachineDef, ResourceDef, SeedCatalogs};
    pub use crate::config::{Settings, SCHEMA_VERSION};
    pub use crate::session::{
        AssetFetcher, DirAssetFetcher, FetchError, FetchedAsset, Session, SessionError,
        SessionResult,
    };
    pub use crate::worker::protocol::{BatchOperation, RowMode, StatusResponse};
    pub use crate::worker::{WorkerError, WorkerResult};
}

pub use session::{Session, SessionError, SessionResult};
