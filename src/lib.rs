//! # Kiln - document collection flattening pipeline
//!
//! A library for turning collections of arbitrarily nested, schema-flexible
//! documents into flat, uniformly string-typed Parquet artifacts suitable for
//! columnar analytical storage.
//!
//! ## Modules
//!
//! - **stage**: the classify / flatten / denormalize engine and its
//!   per-collection orchestration
//! - **store**: document store access (dump directories, in-memory)
//! - **types**: the tagged value model documents are decoded into
//!
//! ## How collections are processed
//!
//! Each collection is classified by sampling its first documents: if more
//! than a threshold share of them contain nested structure, every document is
//! recursively flattened into path-qualified columns (`items_0_sku`) and the
//! resulting table is denormalized back into one row per array element.
//! Otherwise the collection is string-coerced and exported directly. Either
//! way the artifact is an all-`Utf8` Parquet file, published atomically, one
//! per collection per run.
//!
//! ## Quick start
//!
//! ```rust
//! use kiln::{MemStore, SourceRecord, Stage1Pipeline, StageConfig};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut store = MemStore::new();
//! store.insert(
//!     "orders",
//!     vec![SourceRecord::from_json(json!({
//!         "_id": "a1",
//!         "items": [{"sku": "S1", "qty": 2}, {"sku": "S2", "qty": 1}]
//!     }))
//!     .unwrap()],
//! );
//!
//! let out_dir = tempfile::tempdir()?;
//! let pipeline = Stage1Pipeline::new(StageConfig::default(), out_dir.path())?;
//! let summary = pipeline.run_all(&store)?;
//!
//! assert_eq!(summary.succeeded, 1);
//! assert!(summary.failed.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod stage;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use error::StoreError;
pub use stage::{
    Artifact, ArtifactWriter, BatchSummary, CollectionOutcome, CollectionProfile, CollectionState,
    ColumnDenormalizer, FlatRecord, FlatTable, Flattener, SamplingClassifier, Stage1Pipeline,
    TableBuilder,
};
pub use store::{DocumentStore, DumpStore, MemStore};
pub use types::{FieldValue, SourceRecord, StageConfig};

use anyhow::Result;
use std::path::Path;

/// Main entry point: run stage 1 for a set of collections (or every
/// collection the store lists) and publish one artifact per collection.
pub fn run_stage1(
    store: &dyn DocumentStore,
    config: StageConfig,
    output_dir: &Path,
    collections: Option<&[String]>,
) -> Result<BatchSummary> {
    let pipeline = Stage1Pipeline::new(config, output_dir)?;
    match collections {
        Some(names) => pipeline.run(store, names),
        None => pipeline.run_all(store),
    }
}
