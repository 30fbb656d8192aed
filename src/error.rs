use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a document store.
///
/// `Connection` is the one fatal variant: the batch driver aborts the whole
/// run on it. Everything else is scoped to a single collection and recovered
/// by the driver.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot reach document store at {path}: {source}")]
    Connection {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("i/o error reading collection '{collection}': {source}")]
    Io {
        collection: String,
        source: std::io::Error,
    },

    #[error("malformed document in collection '{collection}' at line {line}")]
    Decode { collection: String, line: usize },
}

impl StoreError {
    /// Whether this error should abort the entire batch run rather than
    /// failing a single collection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }
}
