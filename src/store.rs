//! Document store access.
//!
//! The pipeline only ever talks to a [`DocumentStore`]; the concrete store is
//! chosen at the edge. [`DumpStore`] reads a directory of `<collection>.jsonl`
//! extended-JSON dumps, which is how collections arrive from the upstream
//! export. [`MemStore`] backs tests and embedding.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::StoreError;
use crate::types::SourceRecord;

/// Read-only access to a source document store.
///
/// Opening a store is the connection; dropping it releases it. All reads
/// preserve insertion order.
pub trait DocumentStore {
    fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    fn count_documents(&self, collection: &str) -> Result<u64, StoreError>;

    /// All documents of a collection, in stored order. A malformed document
    /// fails the read (the caller fails that collection only).
    fn find_all(&self, collection: &str) -> Result<Vec<SourceRecord>, StoreError>;

    /// The first `n` documents, for sampling. A malformed document decodes to
    /// an empty record here, so classification never aborts on one.
    fn find_first_n(&self, collection: &str, n: usize) -> Result<Vec<SourceRecord>, StoreError>;
}

/// A store backed by a directory of newline-delimited JSON dump files.
#[derive(Debug)]
pub struct DumpStore {
    root: PathBuf,
}

impl DumpStore {
    /// Open the dump directory. An unreadable directory is a connection
    /// failure, which aborts the whole batch.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        match std::fs::read_dir(&root) {
            Ok(_) => Ok(DumpStore { root }),
            Err(source) => Err(StoreError::Connection { path: root, source }),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", collection))
    }

    fn read_collection(
        &self,
        collection: &str,
        limit: Option<usize>,
        lenient: bool,
    ) -> Result<Vec<SourceRecord>, StoreError> {
        let content = read_dump_file(&self.collection_path(collection), collection)?;

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if let Some(limit) = limit {
                if records.len() >= limit {
                    break;
                }
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_document(line) {
                Some(record) => records.push(record),
                None if lenient => records.push(SourceRecord::default()),
                None => {
                    return Err(StoreError::Decode {
                        collection: collection.to_string(),
                        line: line_no + 1,
                    })
                }
            }
        }

        Ok(records)
    }
}

fn read_dump_file(path: &Path, collection: &str) -> Result<String, StoreError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::CollectionNotFound(collection.to_string())
        } else {
            StoreError::Io {
                collection: collection.to_string(),
                source,
            }
        }
    })
}

/// Parse one dump line into a record. SIMD parsing first, serde_json as the
/// fallback, same as the melt CLI's input path.
fn parse_document(line: &str) -> Option<SourceRecord> {
    let mut bytes = line.as_bytes().to_vec();
    let value: Value = match simd_json::serde::from_slice(&mut bytes) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(line).ok()?,
    };
    SourceRecord::from_json(value)
}

impl DocumentStore for DumpStore {
    fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| StoreError::Connection {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Connection {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        let content = read_dump_file(&self.collection_path(collection), collection)?;
        Ok(content.lines().filter(|l| !l.trim().is_empty()).count() as u64)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<SourceRecord>, StoreError> {
        self.read_collection(collection, None, false)
    }

    fn find_first_n(&self, collection: &str, n: usize) -> Result<Vec<SourceRecord>, StoreError> {
        self.read_collection(collection, Some(n), true)
    }
}

/// In-memory store for tests and embedding. Collections keep insertion
/// order; reads of a collection registered with [`MemStore::fail_reads_for`]
/// fail, which exercises the driver's per-collection recovery.
#[derive(Debug, Default)]
pub struct MemStore {
    collections: Vec<(String, Vec<SourceRecord>)>,
    failing: HashSet<String>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, records: Vec<SourceRecord>) {
        self.collections.push((name.into(), records));
    }

    /// Make every `find_all` / `find_first_n` on this collection fail.
    pub fn fail_reads_for(&mut self, name: impl Into<String>) {
        self.failing.insert(name.into());
    }

    fn get(&self, collection: &str) -> Result<&[SourceRecord], StoreError> {
        if self.failing.contains(collection) {
            return Err(StoreError::Io {
                collection: collection.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected read failure"),
            });
        }
        self.collections
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, records)| records.as_slice())
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }
}

impl DocumentStore for MemStore {
    fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.iter().map(|(name, _)| name.clone()).collect())
    }

    fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self.get(collection)?.len() as u64)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<SourceRecord>, StoreError> {
        Ok(self.get(collection)?.to_vec())
    }

    fn find_first_n(&self, collection: &str, n: usize) -> Result<Vec<SourceRecord>, StoreError> {
        Ok(self.get(collection)?.iter().take(n).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dump(dir: &Path, name: &str, lines: &[&str]) {
        let mut file = std::fs::File::create(dir.join(format!("{}.jsonl", name))).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_dump_store_lists_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "orders", &[r#"{"a":1}"#, "", r#"{"a":2}"#]);
        write_dump(dir.path(), "users", &[r#"{"b":1}"#]);

        let store = DumpStore::open(dir.path()).unwrap();
        assert_eq!(store.list_collections().unwrap(), vec!["orders", "users"]);
        assert_eq!(store.count_documents("orders").unwrap(), 2);
    }

    #[test]
    fn test_missing_directory_is_connection_error() {
        let err = DumpStore::open("/nonexistent/kiln-dumps").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_collection_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DumpStore::open(dir.path()).unwrap();
        let err = store.find_all("ghost").unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_sampling_tolerates_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "events", &[r#"{"ok":true}"#, "{not json", r#"{"ok":false}"#]);

        let store = DumpStore::open(dir.path()).unwrap();
        let sample = store.find_first_n("events", 10).unwrap();
        assert_eq!(sample.len(), 3);
        assert!(sample[1].fields.is_empty());

        // The same line fails a full read.
        let err = store.find_all("events").unwrap_err();
        assert!(matches!(err, StoreError::Decode { line: 2, .. }));
    }
}
