//! Recursive document flattening.
//!
//! Converts one nested [`SourceRecord`] into a flat path → string mapping:
//! nested objects extend the path, arrays of objects expand element-by-element
//! with the index embedded in the path, arrays of scalars collapse to a single
//! JSON literal column. Every emitted key records its structured path for the
//! denormalizer.

use crate::stage::table::{FieldPath, FlatField, FlatRecord, PathSeg};
use crate::types::{FieldValue, SourceRecord};

pub struct Flattener {
    separator: String,
}

impl Flattener {
    pub fn new(separator: impl Into<String>) -> Self {
        Flattener {
            separator: separator.into(),
        }
    }

    /// Flatten one record. Already-flat records come back unchanged
    /// (same keys, same values).
    pub fn flatten(&self, record: &SourceRecord) -> FlatRecord {
        let mut fields = Vec::new();
        let mut path = Vec::new();
        self.flatten_object(&record.fields, &mut path, &mut fields);
        FlatRecord { fields }
    }

    fn flatten_object(
        &self,
        object: &[(String, FieldValue)],
        path: &mut Vec<PathSeg>,
        out: &mut Vec<FlatField>,
    ) {
        for (key, value) in object {
            path.push(PathSeg::field(key));
            self.flatten_value(value, path, out);
            path.pop();
        }
    }

    fn flatten_value(&self, value: &FieldValue, path: &mut Vec<PathSeg>, out: &mut Vec<FlatField>) {
        match value {
            // Empty objects contribute no keys.
            FieldValue::Object(fields) => self.flatten_object(fields, path, out),

            FieldValue::Array(items) if contains_object(items) => {
                // Object array (mixed arrays included): one key-group per
                // element, index embedded in the path. Scalar elements land
                // under their own numbered key.
                for (i, item) in items.iter().enumerate() {
                    let seg = path.last_mut().expect("array reached through a field");
                    seg.index = Some(i);
                    match item {
                        FieldValue::Object(fields) => self.flatten_object(fields, path, out),
                        other => self.emit(other.coerce(), path, out),
                    }
                }
                if let Some(seg) = path.last_mut() {
                    seg.index = None;
                }
            }

            // Scalar or empty array: one column holding the JSON literal.
            FieldValue::Array(_) => {
                let literal = serde_json::to_string(&value.to_json()).unwrap_or_default();
                self.emit(Some(literal), path, out);
            }

            scalar => self.emit(scalar.coerce(), path, out),
        }
    }

    fn emit(&self, value: Option<String>, path: &[PathSeg], out: &mut Vec<FlatField>) {
        let path = FieldPath(path.to_vec());
        out.push(FlatField {
            column: path.render(&self.separator),
            value,
            path,
        });
    }
}

fn contains_object(items: &[FieldValue]) -> bool {
    !items.is_empty() && items.iter().any(|item| matches!(item, FieldValue::Object(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flatten(doc: serde_json::Value) -> Vec<(String, Option<String>)> {
        let record = SourceRecord::from_json(doc).unwrap();
        Flattener::new("_")
            .flatten(&record)
            .fields
            .into_iter()
            .map(|f| (f.column, f.value))
            .collect()
    }

    #[test]
    fn test_flat_record_is_identity() {
        let fields = flatten(json!({"_id": "a1", "name": "X", "qty": 2}));
        assert_eq!(
            fields,
            vec![
                ("_id".to_string(), Some("a1".to_string())),
                ("name".to_string(), Some("X".to_string())),
                ("qty".to_string(), Some("2".to_string())),
            ]
        );
    }

    #[test]
    fn test_nested_object_extends_path() {
        let fields = flatten(json!({"user": {"address": {"city": "Oslo"}}}));
        assert_eq!(
            fields,
            vec![("user_address_city".to_string(), Some("Oslo".to_string()))]
        );
    }

    #[test]
    fn test_object_array_expands_with_indices() {
        let fields = flatten(json!({
            "_id": "a1",
            "items": [{"sku": "S1", "qty": 2}, {"sku": "S2", "qty": 1}]
        }));
        let columns: Vec<&str> = fields.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(
            columns,
            vec!["_id", "items_0_sku", "items_0_qty", "items_1_sku", "items_1_qty"]
        );
        assert_eq!(fields[1].1, Some("S1".to_string()));
        assert_eq!(fields[4].1, Some("1".to_string()));
    }

    #[test]
    fn test_scalar_array_collapses_to_json_literal() {
        let fields = flatten(json!({"tags": ["x", "y"]}));
        assert_eq!(
            fields,
            vec![("tags".to_string(), Some(r#"["x","y"]"#.to_string()))]
        );
    }

    #[test]
    fn test_empty_array_is_json_literal_too() {
        let fields = flatten(json!({"items": []}));
        assert_eq!(fields, vec![("items".to_string(), Some("[]".to_string()))]);
    }

    #[test]
    fn test_mixed_array_treated_as_object_array() {
        let fields = flatten(json!({"entries": ["loose", {"a": 1}]}));
        assert_eq!(
            fields,
            vec![
                ("entries_0".to_string(), Some("loose".to_string())),
                ("entries_1_a".to_string(), Some("1".to_string())),
            ]
        );
    }

    #[test]
    fn test_null_flattens_to_null_cell() {
        let fields = flatten(json!({"name": null, "nested": {"gone": null}}));
        assert_eq!(
            fields,
            vec![
                ("name".to_string(), None),
                ("nested_gone".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_empty_object_contributes_no_keys() {
        let fields = flatten(json!({"meta": {}, "name": "X"}));
        assert_eq!(fields, vec![("name".to_string(), Some("X".to_string()))]);
    }

    #[test]
    fn test_array_nested_inside_array_element() {
        let fields = flatten(json!({
            "orders": [{"lines": [{"sku": "S1"}]}]
        }));
        assert_eq!(
            fields,
            vec![("orders_0_lines_0_sku".to_string(), Some("S1".to_string()))]
        );
    }

    #[test]
    fn test_recorded_paths_carry_indices() {
        let record = SourceRecord::from_json(json!({"items": [{"sku": "S1"}]})).unwrap();
        let flat = Flattener::new("_").flatten(&record);
        let path = &flat.fields[0].path;
        assert_eq!(path.0[0], PathSeg::indexed("items", 0));
        assert_eq!(path.0[1], PathSeg::field("sku"));
    }
}
