//! Parquet artifact writing.
//!
//! Every column is physically `Utf8`, nullable: the union-of-keys schema
//! across heterogeneous documents can never hit a type conflict. Artifacts
//! are written to a temp file in the output directory and atomically renamed
//! into place, so a reader of the directory never sees a partial file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Local;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

use crate::stage::table::FlatTable;

/// A published stage artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub rows: usize,
    pub file_size_mb: f64,
}

pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;
        Ok(ArtifactWriter { out_dir })
    }

    /// Write one collection's table as
    /// `<collection>_stage1_<YYYYMMDD_HHMMSS>.parquet`. One file per
    /// invocation, never appended to, never mutated after publish.
    pub fn write(&self, collection: &str, table: &FlatTable) -> Result<Artifact> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_stage1_{}.parquet", collection, timestamp);
        let final_path = self.out_dir.join(&filename);

        let tmp = NamedTempFile::new_in(&self.out_dir)
            .context("failed to create temporary artifact file")?;
        self.write_table(table, tmp.path())?;

        tmp.persist(&final_path)
            .with_context(|| format!("failed to publish artifact {}", final_path.display()))?;

        let file_size_mb = std::fs::metadata(&final_path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);

        Ok(Artifact {
            path: final_path,
            rows: table.row_count(),
            file_size_mb,
        })
    }

    fn write_table(&self, table: &FlatTable, path: &Path) -> Result<()> {
        let fields: Vec<Field> = table
            .columns()
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .context("failed to create parquet writer")?;

        if !table.columns().is_empty() {
            let arrays: Vec<ArrayRef> = (0..table.columns().len())
                .map(|col| {
                    let values: StringArray = (0..table.row_count())
                        .map(|row| table.cell(row, col))
                        .collect();
                    Arc::new(values) as ArrayRef
                })
                .collect();
            let batch = RecordBatch::try_new(schema, arrays)
                .context("failed to assemble record batch")?;
            writer.write(&batch).context("failed to write record batch")?;
        }

        writer.close().context("failed to finish parquet file")?;
        Ok(())
    }
}
