//! Dataset handling for natural-language-inference corpora.
//!
//! Provides the aligned premise/hypothesis/label dataset type, the batch
//! partitioner used by training and validation, and reading/writing
//! preprocessed datasets as pickle or Parquet files.

pub mod batch;
pub mod reader;
pub mod types;
pub mod writer;

pub use batch::{partition, Batch, BatchCollection};
pub use reader::DatasetReader;
pub use types::{Dataset, DatasetFormat, DatasetSummary, Example, Label};
pub use writer::DatasetWriter;
