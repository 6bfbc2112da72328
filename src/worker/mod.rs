//! Worker communication module.
//!
//! The database lives inside a dedicated worker execution context: one
//! thread that owns the embedded SQLite connection and executes every
//! statement serially. The host side never touches the connection; it
//! exchanges request/response envelopes with the worker over channels,
//! correlated by unique request IDs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Host (Tokio, async)                         │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                   WorkerClient                            │  │
//! │  │  - request IDs for concurrent request correlation         │  │
//! │  │  - pending map: id -> oneshot completion                  │  │
//! │  │  - dispatch task demultiplexes responses                  │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                request channel │ response channel               │
//! │                               ▼                                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Worker thread (owns the rusqlite Connection)             │
//! │        init / exec / exec_batch / import / export /             │
//! │        status / close / clear                                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod client;
mod engine;
mod error;
pub mod protocol;
mod values;

pub use client::WorkerClient;
pub use engine::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
