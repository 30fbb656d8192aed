//! Flat tables and the structural path side-index.
//!
//! Flattened column names are text (`items_0_sku`), but the table also keeps
//! the structured path each column came from. Downstream grouping works on
//! that recorded structure, never by reverse-parsing the column text, so a
//! field genuinely named `version_2_build` can never be mistaken for an
//! array-expanded column.

use std::collections::HashMap;

/// One segment of a flattened path: a field name, plus the element index if
/// the field was an array the flattener expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSeg {
    pub field: String,
    pub index: Option<usize>,
}

impl PathSeg {
    pub fn field(name: impl Into<String>) -> Self {
        PathSeg {
            field: name.into(),
            index: None,
        }
    }

    pub fn indexed(name: impl Into<String>, index: usize) -> Self {
        PathSeg {
            field: name.into(),
            index: Some(index),
        }
    }
}

/// The structured path of one flattened column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath(pub Vec<PathSeg>);

impl FieldPath {
    /// Render the textual column name: fields joined by `sep`, with each
    /// array index inserted as its own segment.
    pub fn render(&self, sep: &str) -> String {
        let mut out = String::new();
        for seg in &self.0 {
            if !out.is_empty() {
                out.push_str(sep);
            }
            out.push_str(&seg.field);
            if let Some(index) = seg.index {
                out.push_str(sep);
                out.push_str(&index.to_string());
            }
        }
        out
    }

    /// Position of the first indexed segment, if any.
    pub fn first_indexed(&self) -> Option<usize> {
        self.0.iter().position(|seg| seg.index.is_some())
    }
}

/// One flattened field: column name, coerced value, recorded path.
#[derive(Debug, Clone)]
pub struct FlatField {
    pub column: String,
    pub value: Option<String>,
    pub path: FieldPath,
}

/// The flat form of exactly one source record, in emission order.
#[derive(Debug, Clone, Default)]
pub struct FlatRecord {
    pub fields: Vec<FlatField>,
}

/// A flat, all-string table: the union of every record's keys, with absent
/// keys nulled per row, plus the column path side-index.
#[derive(Debug, Clone)]
pub struct FlatTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    paths: HashMap<String, FieldPath>,
}

impl FlatTable {
    pub(crate) fn from_parts(
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
        paths: HashMap<String, FieldPath>,
    ) -> Self {
        FlatTable { columns, rows, paths }
    }

    /// Column names in first-discovery order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows[row][col].as_deref()
    }

    /// The recorded structural path for a column, if the flattener emitted
    /// one (denormalized suffix columns have none).
    pub fn path(&self, column: &str) -> Option<&FieldPath> {
        self.paths.get(column)
    }

    pub(crate) fn paths(&self) -> &HashMap<String, FieldPath> {
        &self.paths
    }
}

/// Assembles a [`FlatTable`] one record at a time.
///
/// Columns are added as they are first seen; earlier rows are padded with
/// nulls at finalize, so the finished schema is the union of all keys.
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<Option<String>>>,
    paths: HashMap<String, FieldPath>,
}

impl TableBuilder {
    pub fn new() -> Self {
        TableBuilder::default()
    }

    pub fn append(&mut self, record: FlatRecord) {
        let mut row = vec![None; self.columns.len()];

        for field in record.fields {
            let idx = match self.column_index.get(&field.column) {
                Some(&idx) => idx,
                None => {
                    let idx = self.columns.len();
                    self.columns.push(field.column.clone());
                    self.column_index.insert(field.column.clone(), idx);
                    self.paths.insert(field.column, field.path);
                    idx
                }
            };
            if idx >= row.len() {
                row.resize(idx + 1, None);
            }
            // Duplicate keys within one record are last-write-wins.
            row[idx] = field.value;
        }

        self.rows.push(row);
    }

    pub fn finalize(mut self) -> FlatTable {
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, None);
        }
        FlatTable::from_parts(self.columns, self.rows, self.paths)
    }
}
