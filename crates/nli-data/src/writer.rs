//! Writes NLI datasets to Parquet (via Arrow) or pickle files.

use crate::types::{Dataset, DatasetFormat};
use anyhow::Context;
use arrow::array::*;
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

/// Arrow schema for dataset Parquet files (3 columns).
pub fn dataset_schema() -> Schema {
    Schema::new(vec![
        Field::new("premise", token_list_type(), false),
        Field::new("hypothesis", token_list_type(), false),
        Field::new("label", DataType::Int64, false),
    ])
}

fn token_list_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::UInt32, false)))
}

/// Static methods for writing datasets to disk.
pub struct DatasetWriter;

impl DatasetWriter {
    /// Write a dataset, choosing the encoder from the file extension.
    pub fn write(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
        match DatasetFormat::from_path(path)? {
            DatasetFormat::Pickle => Self::write_pickle(path, dataset),
            DatasetFormat::Parquet => Self::write_parquet(path, dataset),
        }
    }

    /// Write a dataset as a pickled dict readable from Python.
    pub fn write_pickle(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        serde_pickle::to_writer(&mut out, dataset, serde_pickle::SerOptions::new())
            .with_context(|| format!("failed to pickle dataset to {}", path.display()))?;

        tracing::info!(
            examples = dataset.len(),
            path = %path.display(),
            "Wrote pickled dataset"
        );

        Ok(())
    }

    /// Write a dataset as a single-row-group Parquet file.
    pub fn write_parquet(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
        let schema = Arc::new(dataset_schema());

        let batch = if dataset.is_empty() {
            RecordBatch::new_empty(schema.clone())
        } else {
            build_record_batch(dataset)?
        };

        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::info!(
            examples = dataset.len(),
            path = %path.display(),
            "Wrote Parquet dataset"
        );

        Ok(())
    }
}

/// Build an Arrow RecordBatch from a dataset.
fn build_record_batch(dataset: &Dataset) -> anyhow::Result<RecordBatch> {
    let schema = Arc::new(dataset_schema());

    let labels: Int64Array = dataset.labels().iter().map(|&l| Some(l)).collect();

    let columns: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(token_list_array(dataset.premises())),
        Arc::new(token_list_array(dataset.hypotheses())),
        Arc::new(labels),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Flatten token sequences into a `List<UInt32>` array.
fn token_list_array(sequences: &[Vec<u32>]) -> ListArray {
    let mut values = Vec::with_capacity(sequences.iter().map(Vec::len).sum());
    let mut offsets = Vec::with_capacity(sequences.len() + 1);
    offsets.push(0i32);
    for seq in sequences {
        values.extend_from_slice(seq);
        offsets.push(values.len() as i32);
    }

    ListArray::new(
        Arc::new(Field::new("item", DataType::UInt32, false)),
        OffsetBuffer::new(offsets.into()),
        Arc::new(UInt32Array::from(values)),
        None,
    )
}
