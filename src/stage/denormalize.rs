//! Denormalization: un-pivot array-expanded, index-suffixed columns back into
//! one row per array element.
//!
//! Grouping works on each column's recorded [`FieldPath`], not on the column
//! text. A column belongs to a group when its path contains an indexed
//! segment followed by at least one more segment; the group's base is the
//! path up to and including the indexed field, the suffix is everything after
//! the index.

use std::collections::HashMap;

use crate::stage::table::{FieldPath, FlatTable};

struct ColumnGroup {
    /// (source column position, element index, suffix column name)
    triples: Vec<(usize, usize, String)>,
    /// Largest index observed anywhere in the group, table-wide.
    max_index: usize,
}

pub struct ColumnDenormalizer {
    separator: String,
}

impl ColumnDenormalizer {
    pub fn new(separator: impl Into<String>) -> Self {
        ColumnDenormalizer {
            separator: separator.into(),
        }
    }

    /// Expand a flat table's indexed column groups into per-element rows.
    /// Tables without indexed columns come back unchanged.
    pub fn denormalize(&self, table: FlatTable) -> FlatTable {
        let (base_cols, groups) = self.group_columns(&table);
        if groups.is_empty() {
            return table;
        }

        // Output schema: base columns in source order, then each group's
        // suffix columns in discovery order. A suffix that collides with an
        // existing column shares it, last write wins.
        let mut out_columns: Vec<String> = Vec::new();
        let mut out_index: HashMap<String, usize> = HashMap::new();
        for &col in &base_cols {
            let name = table.columns()[col].clone();
            out_index.insert(name.clone(), out_columns.len());
            out_columns.push(name);
        }
        for (_, group) in &groups {
            for (_, _, suffix) in &group.triples {
                if !out_index.contains_key(suffix) {
                    out_index.insert(suffix.clone(), out_columns.len());
                    out_columns.push(suffix.clone());
                }
            }
        }

        let mut out_rows: Vec<Vec<Option<String>>> = Vec::new();

        for row in 0..table.row_count() {
            let mut template = vec![None; out_columns.len()];
            for (slot, &col) in base_cols.iter().enumerate() {
                template[slot] = table.cell(row, col).map(str::to_string);
            }

            // Groups expand independently; rows from one group never carry
            // another group's suffix fields.
            for (_, group) in &groups {
                let mut emitted = false;

                for index in 0..=group.max_index {
                    let mut candidate = template.clone();
                    let mut any = false;

                    for (col, number, suffix) in &group.triples {
                        if *number != index {
                            continue;
                        }
                        if let Some(value) = table.cell(row, *col) {
                            if !value.trim().is_empty() {
                                candidate[out_index[suffix]] = Some(value.to_string());
                                any = true;
                            }
                        }
                    }

                    if any {
                        out_rows.push(candidate);
                        emitted = true;
                    }
                }

                // Empty or absent array: one placeholder row, suffixes set to
                // an explicit empty value (distinct from null).
                if !emitted {
                    let mut candidate = template.clone();
                    for (_, _, suffix) in &group.triples {
                        candidate[out_index[suffix]] = Some(String::new());
                    }
                    out_rows.push(candidate);
                }
            }
        }

        // Only base columns keep a structural path; suffix columns are
        // synthesized names.
        let out_paths: HashMap<String, FieldPath> = base_cols
            .iter()
            .filter_map(|&col| {
                let name = &table.columns()[col];
                table.paths().get(name).map(|p| (name.clone(), p.clone()))
            })
            .collect();

        FlatTable::from_parts(out_columns, out_rows, out_paths)
    }

    /// Split columns into base columns and index groups, scanning left to
    /// right so group order follows first discovery.
    fn group_columns(&self, table: &FlatTable) -> (Vec<usize>, Vec<(String, ColumnGroup)>) {
        let mut base_cols = Vec::new();
        let mut groups: Vec<(String, ColumnGroup)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for (col, name) in table.columns().iter().enumerate() {
            let Some((base, index, suffix)) = self.split_indexed(table.path(name)) else {
                base_cols.push(col);
                continue;
            };

            let slot = *group_index.entry(base.clone()).or_insert_with(|| {
                groups.push((
                    base,
                    ColumnGroup {
                        triples: Vec::new(),
                        max_index: 0,
                    },
                ));
                groups.len() - 1
            });
            let group = &mut groups[slot].1;
            group.max_index = group.max_index.max(index);
            group.triples.push((col, index, suffix));
        }

        (base_cols, groups)
    }

    /// Decompose a recorded path into `(base, index, suffix)` at its first
    /// indexed segment. Paths without an index, or with nothing after the
    /// index, are base columns.
    fn split_indexed(&self, path: Option<&FieldPath>) -> Option<(String, usize, String)> {
        let path = path?;
        let pos = path.first_indexed()?;
        let suffix_path = FieldPath(path.0[pos + 1..].to_vec());
        let suffix = suffix_path.render(&self.separator);
        if suffix.is_empty() {
            return None;
        }

        let index = path.0[pos].index?;
        let mut base_path = FieldPath(path.0[..=pos].to_vec());
        base_path.0[pos].index = None;

        Some((base_path.render(&self.separator), index, suffix))
    }
}
