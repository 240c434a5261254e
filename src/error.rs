use thiserror::Error;

use crate::store::{AccessMode, BackendKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no trade found for {0}")]
    NotFound(i64),
    #[error("invalid mode {mode} for {backend} backend")]
    InvalidMode {
        backend: BackendKind,
        mode: AccessMode,
    },
    #[error("missing key column: {0}")]
    MissingKeyColumn(String),
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("batch write of {records} records failed: {reason}")]
    AggregateWriteFailure { records: usize, reason: String },
    #[error("compute failed: {0}")]
    Compute(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("table is empty")]
    EmptyTable,
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("corrupt data: {0}")]
    Corrupt(&'static str),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
