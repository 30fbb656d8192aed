//! Stage-1 engine: classify collections, flatten nested documents into
//! path-qualified string columns, denormalize array-expanded columns back
//! into per-element rows, and publish all-string Parquet artifacts.

pub mod classifier;
pub mod denormalize;
pub mod flatten;
pub mod pipeline;
pub mod table;
pub mod writer;

pub use classifier::{CollectionProfile, SamplingClassifier};
pub use denormalize::ColumnDenormalizer;
pub use flatten::Flattener;
pub use pipeline::{BatchSummary, CollectionOutcome, CollectionState, Stage1Pipeline};
pub use table::{FieldPath, FlatField, FlatRecord, FlatTable, PathSeg, TableBuilder};
pub use writer::{Artifact, ArtifactWriter};
