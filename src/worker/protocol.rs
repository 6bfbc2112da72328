//! Protocol types for worker communication.
//!
//! Every request posted to the worker carries a unique correlation id; the
//! worker answers each request with exactly one response envelope carrying
//! the same id. Payloads are JSON values so the envelope shape stays fixed
//! while the per-kind parameter and response structs below evolve.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope posted to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Request kind.
    pub kind: RequestKind,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The set of operations the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Open the database and check the schema version marker.
    Init,
    /// Execute a single statement (or a script when no rows are requested).
    Exec,
    /// Execute multiple statements as one atomic unit.
    ExecBatch,
    /// Replace the database with a snapshot.
    Import,
    /// Serialize the database to a snapshot.
    Export,
    /// Report engine/version information.
    Status,
    /// Graceful shutdown of the worker.
    Close,
    /// Wipe the persisted database files and reopen fresh.
    Clear,
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Outcome of the request.
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// The three possible outcomes of a request.
///
/// `SchemaMismatch` is only ever produced for an `init` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    /// The request succeeded; `result` holds the kind-specific payload.
    Result { result: serde_json::Value },
    /// The engine reported an error for this request.
    Error { error: ErrorInfo },
    /// The stored schema version disagrees with the expected version.
    SchemaMismatch {
        current_version: i64,
        expected_version: i64,
    },
}

/// Error information in a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Engine-reported error message.
    pub message: String,
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Parameters for `init`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitParams {
    /// Optional database name overriding the configured one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Shape of each result row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowMode {
    /// Rows are JSON objects keyed by column name.
    #[default]
    Object,
    /// Rows are JSON arrays in column order.
    Array,
}

/// Whether an `exec` request returns rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnValue {
    /// Prepare one statement and return its rows.
    #[default]
    ResultRows,
    /// Run the text as a script (multiple statements allowed), no rows.
    None,
}

/// Parameters for `exec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecParams {
    /// SQL text to execute.
    pub sql: String,
    /// Positional bind parameters.
    #[serde(default)]
    pub bind: Vec<serde_json::Value>,
    /// Result row shape.
    #[serde(default)]
    pub row_mode: RowMode,
    /// Whether rows are returned.
    #[serde(default)]
    pub return_value: ReturnValue,
}

/// One statement inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOperation {
    /// SQL text to execute.
    pub sql: String,
    /// Positional bind parameters.
    #[serde(default)]
    pub bind: Vec<serde_json::Value>,
}

/// Parameters for `exec_batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchParams {
    /// Statements executed inside a single transaction.
    pub operations: Vec<BatchOperation>,
}

/// Parameters for `import`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportParams {
    /// Base64-encoded snapshot of the entire database file.
    pub bytes: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Empty acknowledgement payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {}

/// Response from `exec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResponse {
    /// Result rows, shaped per the requested row mode.
    #[serde(default)]
    pub result_rows: Vec<serde_json::Value>,
}

/// Response from `export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    /// Base64-encoded snapshot of the entire database file.
    pub bytes: String,
}

/// Response from `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Embedded engine name.
    pub engine: String,
    /// Engine version string.
    pub version: String,
    /// Path to the database file inside the storage sandbox.
    pub database_path: String,
}

// ============================================================================
// Snapshot Encoding
// ============================================================================

/// Encode raw snapshot bytes for transport inside a JSON envelope.
pub fn encode_snapshot(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a transported snapshot back into raw bytes.
pub fn decode_snapshot(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(encoded)
}
