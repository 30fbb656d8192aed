//! Bounded-sample routing: does a collection need flatten + denormalize, or
//! can it be exported directly?

use crate::error::StoreError;
use crate::store::DocumentStore;
use crate::types::{FieldValue, SourceRecord, StageConfig};

/// The classification result for one collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionProfile {
    pub is_nested: bool,
    pub total_docs: u64,
    pub nested_in_sample: usize,
    pub sample_size: usize,
}

/// Decides, from the first `sample_cap` documents, whether a collection
/// contains nested structure worth flattening. Pure read; nothing is mutated.
pub struct SamplingClassifier {
    sample_cap: usize,
    nested_threshold: f64,
}

impl SamplingClassifier {
    pub fn new(config: &StageConfig) -> Self {
        SamplingClassifier {
            sample_cap: config.sample_cap,
            nested_threshold: config.nested_threshold,
        }
    }

    pub fn classify(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> Result<CollectionProfile, StoreError> {
        let total_docs = store.count_documents(collection)?;
        if total_docs == 0 {
            return Ok(CollectionProfile {
                is_nested: false,
                total_docs: 0,
                nested_in_sample: 0,
                sample_size: 0,
            });
        }

        let sample_size = self.sample_cap.min(total_docs as usize);
        let sample = store.find_first_n(collection, sample_size)?;

        let nested_in_sample = sample.iter().filter(|doc| record_is_nested(doc)).count();
        let nested_pct = nested_in_sample as f64 / sample_size as f64 * 100.0;

        Ok(CollectionProfile {
            // Strict: exactly the threshold still classifies as simple.
            is_nested: nested_pct > self.nested_threshold,
            total_docs,
            nested_in_sample,
            sample_size,
        })
    }
}

/// A record is nested iff any field is a non-empty object, or a non-empty
/// array whose first element is an object. Scalar arrays never count, even
/// though flattening later serializes them specially.
fn record_is_nested(record: &SourceRecord) -> bool {
    record.fields.iter().any(|(_, value)| match value {
        FieldValue::Object(fields) => !fields.is_empty(),
        FieldValue::Array(items) => matches!(items.first(), Some(FieldValue::Object(_))),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use serde_json::json;

    fn record(doc: serde_json::Value) -> SourceRecord {
        SourceRecord::from_json(doc).unwrap()
    }

    fn classify(records: Vec<SourceRecord>) -> CollectionProfile {
        let mut store = MemStore::new();
        store.insert("c", records);
        SamplingClassifier::new(&StageConfig::default())
            .classify(&store, "c")
            .unwrap()
    }

    #[test]
    fn test_empty_collection_is_simple() {
        let profile = classify(vec![]);
        assert!(!profile.is_nested);
        assert_eq!(profile.total_docs, 0);
        assert_eq!(profile.sample_size, 0);
    }

    #[test]
    fn test_scalar_arrays_do_not_count_as_nested() {
        let profile = classify(vec![record(json!({"_id": "a1", "tags": ["x", "y"]}))]);
        assert!(!profile.is_nested);
        assert_eq!(profile.nested_in_sample, 0);
    }

    #[test]
    fn test_object_array_counts_as_nested() {
        let profile = classify(vec![record(json!({"items": [{"sku": "S1"}]}))]);
        assert!(profile.is_nested);
        assert_eq!(profile.nested_in_sample, 1);
    }

    #[test]
    fn test_empty_object_does_not_count() {
        let profile = classify(vec![record(json!({"meta": {}}))]);
        assert!(!profile.is_nested);
    }

    #[test]
    fn test_threshold_boundary_is_strict() {
        // 1 nested out of 10 = exactly 10.0% -> simple.
        let mut records: Vec<SourceRecord> =
            (0..9).map(|i| record(json!({"n": i}))).collect();
        records.push(record(json!({"nested": {"a": 1}})));
        let profile = classify(records);
        assert_eq!(profile.sample_size, 10);
        assert_eq!(profile.nested_in_sample, 1);
        assert!(!profile.is_nested);

        // 2 of 10 = 20% -> nested.
        let mut records: Vec<SourceRecord> =
            (0..8).map(|i| record(json!({"n": i}))).collect();
        records.push(record(json!({"nested": {"a": 1}})));
        records.push(record(json!({"nested": {"a": 2}})));
        assert!(classify(records).is_nested);
    }

    #[test]
    fn test_sample_is_capped() {
        let mut records: Vec<SourceRecord> = Vec::new();
        // 150 docs, nesting only past the 100-doc sample window.
        for i in 0..150 {
            if i < 100 {
                records.push(record(json!({"n": i})));
            } else {
                records.push(record(json!({"nested": {"a": i}})));
            }
        }
        let profile = classify(records);
        assert_eq!(profile.sample_size, 100);
        assert_eq!(profile.total_docs, 150);
        assert!(!profile.is_nested);
    }

    #[test]
    fn test_malformed_record_counts_as_not_nested() {
        // An undecodable document samples as an empty record.
        let profile = classify(vec![SourceRecord::default(), record(json!({"n": 1}))]);
        assert!(!profile.is_nested);
    }
}
