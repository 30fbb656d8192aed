//! Stage logging collaborator.
//!
//! Thin wrappers over `tracing` so every pipeline stage reports start,
//! completion and failure with the same fields. The core emits events; the
//! binary (or embedding application) owns the subscriber.

use tracing::{error, info, warn};

pub fn log_stage_start(stage: &str, collection: &str) {
    info!(stage, collection, "starting");
}

pub fn log_stage_complete(stage: &str, collection: &str, records: usize, file_size_mb: f64) {
    info!(
        stage,
        collection,
        records,
        file_size_mb = format!("{:.2}", file_size_mb).as_str(),
        "complete"
    );
}

pub fn log_error(stage: &str, collection: &str, err: &dyn std::fmt::Display) {
    error!(stage, collection, error = %err, "failed");
}

pub fn log_missing_collection(collection: &str) {
    warn!(collection, "collection not found in store, skipping");
}
