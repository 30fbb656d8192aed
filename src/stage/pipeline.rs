//! Per-collection orchestration and the sequential batch driver.
//!
//! Each collection walks the state machine
//! `Start -> Classified -> {SimpleExport | NestedFlatten -> NestedDenormalize}
//! -> Written`, with `Failed` reachable from any state. One collection is
//! read, transformed in memory and written fully before the next begins; a
//! failure is scoped to its collection unless the store connection itself is
//! gone, which aborts the batch.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::error::StoreError;
use crate::logging::{log_error, log_missing_collection, log_stage_complete, log_stage_start};
use crate::stage::classifier::SamplingClassifier;
use crate::stage::denormalize::ColumnDenormalizer;
use crate::stage::flatten::Flattener;
use crate::stage::table::{FieldPath, FlatField, FlatRecord, PathSeg, TableBuilder};
use crate::stage::writer::{Artifact, ArtifactWriter};
use crate::store::DocumentStore;
use crate::types::{SourceRecord, StageConfig};

const STAGE: &str = "stage1";

/// Where a collection's run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionState {
    Start,
    Classified,
    SimpleExport,
    NestedFlatten,
    NestedDenormalize,
    Written,
    Failed,
}

/// The terminal record for one collection in a batch.
#[derive(Debug, Serialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub state: CollectionState,
    pub error: Option<String>,
}

/// End-of-run accounting: totals plus the names of failed collections.
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub outcomes: Vec<CollectionOutcome>,
}

pub struct Stage1Pipeline {
    classifier: SamplingClassifier,
    flattener: Flattener,
    denormalizer: ColumnDenormalizer,
    writer: ArtifactWriter,
}

impl Stage1Pipeline {
    pub fn new(config: StageConfig, output_dir: impl Into<std::path::PathBuf>) -> Result<Self> {
        Ok(Stage1Pipeline {
            classifier: SamplingClassifier::new(&config),
            flattener: Flattener::new(config.separator.clone()),
            denormalizer: ColumnDenormalizer::new(config.separator.clone()),
            writer: ArtifactWriter::new(output_dir)?,
        })
    }

    /// Run one collection through the state machine and publish its artifact.
    pub fn process_collection(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> (CollectionState, Result<Artifact>) {
        let mut state = CollectionState::Start;
        let result = self.advance(store, collection, &mut state);
        if result.is_err() {
            state = CollectionState::Failed;
        }
        (state, result)
    }

    fn advance(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
        state: &mut CollectionState,
    ) -> Result<Artifact> {
        log_stage_start(STAGE, collection);

        let profile = self.classifier.classify(store, collection)?;
        *state = CollectionState::Classified;

        let table = if profile.is_nested {
            *state = CollectionState::NestedFlatten;
            let mut builder = TableBuilder::new();
            for record in store.find_all(collection)? {
                builder.append(self.flattener.flatten(&record));
            }

            *state = CollectionState::NestedDenormalize;
            self.denormalizer.denormalize(builder.finalize())
        } else {
            *state = CollectionState::SimpleExport;
            let mut builder = TableBuilder::new();
            for record in store.find_all(collection)? {
                builder.append(coerce_record(&record));
            }
            builder.finalize()
        };

        let artifact = self.writer.write(collection, &table)?;
        *state = CollectionState::Written;

        log_stage_complete(STAGE, collection, artifact.rows, artifact.file_size_mb);
        Ok(artifact)
    }

    /// Process the named collections strictly sequentially. Per-collection
    /// failures are logged and recorded and the batch moves on; a lost store
    /// connection aborts the whole run.
    pub fn run(&self, store: &dyn DocumentStore, collections: &[String]) -> Result<BatchSummary> {
        let known = store.list_collections().map_err(fatal)?;

        let mut summary = BatchSummary {
            total: collections.len(),
            ..BatchSummary::default()
        };

        for collection in collections {
            if !known.iter().any(|name| name == collection) {
                log_missing_collection(collection);
                summary.failed.push(collection.clone());
                summary.outcomes.push(CollectionOutcome {
                    collection: collection.clone(),
                    state: CollectionState::Failed,
                    error: Some(format!("collection '{}' not found", collection)),
                });
                continue;
            }

            let (state, result) = self.process_collection(store, collection);
            match result {
                Ok(_) => {
                    summary.succeeded += 1;
                    summary.outcomes.push(CollectionOutcome {
                        collection: collection.clone(),
                        state,
                        error: None,
                    });
                }
                Err(err) => {
                    if let Some(store_err) = err.downcast_ref::<StoreError>() {
                        if store_err.is_fatal() {
                            return Err(err);
                        }
                    }
                    log_error(STAGE, collection, &err);
                    summary.failed.push(collection.clone());
                    summary.outcomes.push(CollectionOutcome {
                        collection: collection.clone(),
                        state,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Process every collection the store lists.
    pub fn run_all(&self, store: &dyn DocumentStore) -> Result<BatchSummary> {
        let collections = store.list_collections().map_err(fatal)?;
        self.run(store, &collections)
    }
}

fn fatal(err: StoreError) -> anyhow::Error {
    anyhow!(err)
}

/// Simple export: coerce every top-level field by the scalar rule, no
/// path-qualification. Residual containers in a simple collection fall back
/// to their JSON text form.
fn coerce_record(record: &SourceRecord) -> FlatRecord {
    FlatRecord {
        fields: record
            .fields
            .iter()
            .map(|(key, value)| FlatField {
                column: key.clone(),
                value: value.coerce(),
                path: FieldPath(vec![PathSeg::field(key)]),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use serde_json::json;

    fn record(doc: serde_json::Value) -> SourceRecord {
        SourceRecord::from_json(doc).unwrap()
    }

    fn pipeline(dir: &std::path::Path) -> Stage1Pipeline {
        Stage1Pipeline::new(StageConfig::default(), dir).unwrap()
    }

    fn read_artifact(artifact: &Artifact) -> Vec<std::collections::HashMap<String, Option<String>>> {
        use arrow::array::{Array as _, StringArray};
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = std::fs::File::open(&artifact.path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.unwrap();
            let schema = batch.schema();
            for row in 0..batch.num_rows() {
                let mut map = std::collections::HashMap::new();
                for (col, batch_field) in schema.fields().iter().enumerate() {
                    let values = batch
                        .column(col)
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .unwrap();
                    let value = if values.is_null(row) {
                        None
                    } else {
                        Some(values.value(row).to_string())
                    };
                    map.insert(batch_field.name().clone(), value);
                }
                rows.push(map);
            }
        }
        rows
    }

    #[test]
    fn test_scalar_array_collection_stays_simple() {
        // Scenario: scalar arrays are excluded from the nested predicate, so
        // the collection exports directly with the array as serialized text.
        let mut store = MemStore::new();
        store.insert(
            "articles",
            vec![record(json!({"_id": "a1", "name": "X", "tags": ["x", "y"]}))],
        );

        let dir = tempfile::tempdir().unwrap();
        let (state, result) = pipeline(dir.path()).process_collection(&store, "articles");
        assert_eq!(state, CollectionState::Written);

        let rows = read_artifact(&result.unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["_id"], Some("a1".to_string()));
        assert_eq!(rows[0]["tags"], Some(r#"["x","y"]"#.to_string()));
    }

    #[test]
    fn test_object_array_collection_flattens_and_denormalizes() {
        let mut store = MemStore::new();
        store.insert(
            "orders",
            vec![record(json!({
                "_id": "a1",
                "items": [{"sku": "S1", "qty": 2}, {"sku": "S2", "qty": 1}]
            }))],
        );

        let dir = tempfile::tempdir().unwrap();
        let (state, result) = pipeline(dir.path()).process_collection(&store, "orders");
        assert_eq!(state, CollectionState::Written);

        let rows = read_artifact(&result.unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["_id"], Some("a1".to_string()));
        assert_eq!(rows[0]["sku"], Some("S1".to_string()));
        assert_eq!(rows[0]["qty"], Some("2".to_string()));
        assert_eq!(rows[1]["sku"], Some("S2".to_string()));
        assert_eq!(rows[1]["qty"], Some("1".to_string()));
    }

    #[test]
    fn test_batch_continues_past_failing_collection() {
        let mut store = MemStore::new();
        store.insert("good_a", vec![record(json!({"n": 1}))]);
        store.insert("bad", vec![record(json!({"n": 2}))]);
        store.insert("good_b", vec![record(json!({"n": 3}))]);
        store.fail_reads_for("bad");

        let dir = tempfile::tempdir().unwrap();
        let summary = pipeline(dir.path()).run_all(&store).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, vec!["bad"]);
        let bad = summary
            .outcomes
            .iter()
            .find(|o| o.collection == "bad")
            .unwrap();
        assert_eq!(bad.state, CollectionState::Failed);
        assert!(bad.error.is_some());
    }

    #[test]
    fn test_failed_collection_publishes_no_artifact() {
        let mut store = MemStore::new();
        store.insert("bad", vec![record(json!({"n": 1}))]);
        store.fail_reads_for("bad");

        let dir = tempfile::tempdir().unwrap();
        let summary = pipeline(dir.path()).run_all(&store).unwrap();
        assert_eq!(summary.succeeded, 0);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(files.is_empty());
    }

    #[test]
    fn test_requested_missing_collection_is_recorded_failed() {
        let mut store = MemStore::new();
        store.insert("real", vec![record(json!({"n": 1}))]);

        let dir = tempfile::tempdir().unwrap();
        let summary = pipeline(dir.path())
            .run(&store, &["real".to_string(), "ghost".to_string()])
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, vec!["ghost"]);
    }

    #[test]
    fn test_empty_arrays_everywhere_is_identity_export() {
        // Scenario: if every document has `items: []`, no indexed columns
        // ever appear and denormalization is a no-op over the base table.
        let mut store = MemStore::new();
        let docs: Vec<SourceRecord> = (0..5)
            .map(|i| record(json!({"_id": i.to_string(), "items": [], "extra": {"depth": i}})))
            .collect();
        store.insert("sparse", docs);

        let dir = tempfile::tempdir().unwrap();
        let (state, result) = pipeline(dir.path()).process_collection(&store, "sparse");
        assert_eq!(state, CollectionState::Written);

        let rows = read_artifact(&result.unwrap());
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["items"], Some("[]".to_string()));
        assert_eq!(rows[0]["extra_depth"], Some("0".to_string()));
    }
}
