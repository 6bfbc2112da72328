//! The worker execution context.
//!
//! One dedicated thread owns the embedded SQLite connection and serves
//! request envelopes in arrival order, so all database work is serialized
//! inside this context. The thread reads requests from a blocking channel
//! and posts responses back on an async channel drained by the client's
//! dispatch task.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use rusqlite::{params_from_iter, Connection};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::protocol::{
    BatchParams, ErrorInfo, ExecParams, ExecResponse, ExportResponse, ImportParams, InitParams,
    RequestEnvelope, RequestKind, ResponseBody, ResponseEnvelope, ReturnValue, RowMode,
    StatusResponse,
};
use super::values::{bind_value, column_to_json};

/// Configuration handed to the worker thread at spawn time.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sandboxed storage directory holding the database files.
    pub storage_dir: PathBuf,
    /// Default database name (file stem inside the storage directory).
    pub database_name: String,
    /// Schema version the application was compiled against.
    pub expected_schema_version: i64,
}

/// Errors internal to the engine thread.
///
/// These never cross the worker boundary as typed values; they are flattened
/// into the error message of the response envelope.
#[derive(Debug, Error)]
enum EngineError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid parameters for {kind:?}: {message}")]
    BadParams { kind: RequestKind, message: String },

    #[error("database is not open")]
    NotOpen,

    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Empty acknowledgement payload.
fn ack() -> serde_json::Value {
    serde_json::json!({})
}

/// Entry point of the worker thread.
pub(crate) fn run(
    config: WorkerConfig,
    requests: Receiver<RequestEnvelope>,
    responses: UnboundedSender<ResponseEnvelope>,
) {
    let mut engine = Engine::new(config);

    while let Ok(envelope) = requests.recv() {
        let closing = envelope.kind == RequestKind::Close;
        let id = envelope.id.clone();
        let body = engine.handle(envelope);
        let delivered = responses.send(ResponseEnvelope { id, body }).is_ok();
        if closing || !delivered {
            break;
        }
    }

    debug!("worker thread exiting");
}

struct Engine {
    config: WorkerConfig,
    db_path: PathBuf,
    conn: Option<Connection>,
}

impl Engine {
    fn new(config: WorkerConfig) -> Self {
        let db_path = config
            .storage_dir
            .join(format!("{}.sqlite3", config.database_name));
        Self {
            config,
            db_path,
            conn: None,
        }
    }

    fn handle(&mut self, envelope: RequestEnvelope) -> ResponseBody {
        debug!(kind = ?envelope.kind, id = %envelope.id, "handling request");
        match envelope.kind {
            RequestKind::Init => self.handle_init(envelope),
            kind => {
                let result = match kind {
                    RequestKind::Exec => self.handle_exec(envelope),
                    RequestKind::ExecBatch => self.handle_exec_batch(envelope),
                    RequestKind::Import => self.handle_import(envelope),
                    RequestKind::Export => self.handle_export(),
                    RequestKind::Status => self.handle_status(),
                    RequestKind::Close => self.handle_close(),
                    RequestKind::Clear => self.handle_clear(),
                    RequestKind::Init => unreachable!("handled above"),
                };
                match result {
                    Ok(result) => ResponseBody::Result { result },
                    Err(e) => ResponseBody::Error {
                        error: ErrorInfo {
                            message: e.to_string(),
                        },
                    },
                }
            }
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(
        kind: RequestKind,
        params: serde_json::Value,
    ) -> Result<T, EngineError> {
        serde_json::from_value(params).map_err(|e| EngineError::BadParams {
            kind,
            message: e.to_string(),
        })
    }

    fn conn(&self) -> Result<&Connection, EngineError> {
        self.conn.as_ref().ok_or(EngineError::NotOpen)
    }

    // ------------------------------------------------------------------
    // init
    // ------------------------------------------------------------------

    fn handle_init(&mut self, envelope: RequestEnvelope) -> ResponseBody {
        let result = Self::parse::<InitParams>(RequestKind::Init, envelope.params)
            .and_then(|params| self.open_database(params.name.as_deref()));

        match result {
            Ok(version) if version != 0 && version != self.config.expected_schema_version => {
                ResponseBody::SchemaMismatch {
                    current_version: version,
                    expected_version: self.config.expected_schema_version,
                }
            }
            Ok(_) => ResponseBody::Result { result: ack() },
            Err(e) => ResponseBody::Error {
                error: ErrorInfo {
                    message: e.to_string(),
                },
            },
        }
    }

    /// Open (or create) the database file and return its version marker.
    fn open_database(&mut self, name: Option<&str>) -> Result<i64, EngineError> {
        if let Some(name) = name {
            self.db_path = self.config.storage_dir.join(format!("{name}.sqlite3"));
        }
        fs::create_dir_all(&self.config.storage_dir)?;

        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        self.conn = Some(conn);
        Ok(version)
    }

    // ------------------------------------------------------------------
    // exec / exec_batch
    // ------------------------------------------------------------------

    fn handle_exec(&mut self, envelope: RequestEnvelope) -> Result<serde_json::Value, EngineError> {
        let params: ExecParams = Self::parse(RequestKind::Exec, envelope.params)?;
        let conn = self.conn()?;

        let result_rows = match params.return_value {
            ReturnValue::None => {
                if !params.bind.is_empty() {
                    return Err(EngineError::BadParams {
                        kind: RequestKind::Exec,
                        message: "bind parameters are not supported for script execution"
                            .to_string(),
                    });
                }
                conn.execute_batch(&params.sql)?;
                Vec::new()
            }
            ReturnValue::ResultRows => {
                let mut stmt = conn.prepare(&params.sql)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|c| c.to_string()).collect();
                let mut rows = stmt.query(params_from_iter(params.bind.iter().map(bind_value)))?;

                let mut result_rows = Vec::new();
                while let Some(row) = rows.next()? {
                    let shaped = match params.row_mode {
                        RowMode::Array => {
                            let mut values = Vec::with_capacity(columns.len());
                            for i in 0..columns.len() {
                                values.push(column_to_json(row.get_ref(i)?));
                            }
                            serde_json::Value::Array(values)
                        }
                        RowMode::Object => {
                            let mut object = serde_json::Map::with_capacity(columns.len());
                            for (i, name) in columns.iter().enumerate() {
                                object.insert(name.clone(), column_to_json(row.get_ref(i)?));
                            }
                            serde_json::Value::Object(object)
                        }
                    };
                    result_rows.push(shaped);
                }
                result_rows
            }
        };

        Ok(serde_json::to_value(ExecResponse { result_rows })?)
    }

    fn handle_exec_batch(
        &mut self,
        envelope: RequestEnvelope,
    ) -> Result<serde_json::Value, EngineError> {
        let params: BatchParams = Self::parse(RequestKind::ExecBatch, envelope.params)?;
        let conn = self.conn.as_mut().ok_or(EngineError::NotOpen)?;

        // Any statement failing rolls the whole batch back.
        let tx = conn.transaction()?;
        for op in &params.operations {
            tx.execute(&op.sql, params_from_iter(op.bind.iter().map(bind_value)))?;
        }
        tx.commit()?;

        Ok(ack())
    }

    // ------------------------------------------------------------------
    // snapshot import/export
    // ------------------------------------------------------------------

    fn handle_export(&mut self) -> Result<serde_json::Value, EngineError> {
        let conn = self.conn()?;
        let tmp = self.db_path.with_extension("export.tmp");
        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }

        conn.execute("VACUUM INTO ?1", [tmp.display().to_string()])?;
        let bytes = fs::read(&tmp)?;
        fs::remove_file(&tmp)?;

        Ok(serde_json::to_value(ExportResponse {
            bytes: super::protocol::encode_snapshot(&bytes),
        })?)
    }

    fn handle_import(
        &mut self,
        envelope: RequestEnvelope,
    ) -> Result<serde_json::Value, EngineError> {
        let params: ImportParams = Self::parse(RequestKind::Import, envelope.params)?;
        let bytes = super::protocol::decode_snapshot(&params.bytes)
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        if self.conn.is_none() {
            return Err(EngineError::NotOpen);
        }

        // Replace the database file wholesale; previous contents do not
        // survive an import.
        self.conn = None;
        self.remove_database_files()?;
        fs::write(&self.db_path, &bytes)?;
        self.open_database(None)?;

        Ok(ack())
    }

    // ------------------------------------------------------------------
    // status / close / clear
    // ------------------------------------------------------------------

    fn handle_status(&mut self) -> Result<serde_json::Value, EngineError> {
        self.conn()?;
        Ok(serde_json::to_value(StatusResponse {
            engine: "sqlite".to_string(),
            version: rusqlite::version().to_string(),
            database_path: self.db_path.display().to_string(),
        })?)
    }

    fn handle_close(&mut self) -> Result<serde_json::Value, EngineError> {
        self.conn = None;
        Ok(ack())
    }

    fn handle_clear(&mut self) -> Result<serde_json::Value, EngineError> {
        self.conn = None;
        self.remove_database_files()?;
        self.open_database(None)?;
        Ok(ack())
    }

    /// Delete the database file and its WAL/SHM siblings.
    fn remove_database_files(&self) -> Result<(), EngineError> {
        let wal = self.db_path.with_extension("sqlite3-wal");
        let shm = self.db_path.with_extension("sqlite3-shm");
        for path in [&self.db_path, &wal, &shm] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
