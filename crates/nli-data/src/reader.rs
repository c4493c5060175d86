//! Reads preprocessed NLI datasets from pickle or Parquet files.

use crate::types::{Dataset, DatasetFormat, DatasetSummary};
use anyhow::Context;
use arrow::array::*;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::BufReader;
use std::path::Path;

/// Static methods for reading datasets from disk.
pub struct DatasetReader;

impl DatasetReader {
    /// Read a dataset, choosing the decoder from the file extension.
    pub fn read(path: &Path) -> anyhow::Result<Dataset> {
        match DatasetFormat::from_path(path)? {
            DatasetFormat::Pickle => Self::read_pickle(path),
            DatasetFormat::Parquet => Self::read_parquet(path),
        }
    }

    /// Read a pickled dict with `premises`, `hypotheses` and `labels` keys.
    ///
    /// Sequences must be plain Python lists of ints; other keys are ignored.
    pub fn read_pickle(path: &Path) -> anyhow::Result<Dataset> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let dataset: Dataset =
            serde_pickle::from_reader(BufReader::new(file), serde_pickle::DeOptions::new())
                .with_context(|| format!("failed to unpickle dataset from {}", path.display()))?;

        tracing::debug!(
            count = dataset.len(),
            path = %path.display(),
            "Read pickled dataset"
        );

        Ok(dataset)
    }

    /// Read all examples from a Parquet file.
    pub fn read_parquet(path: &Path) -> anyhow::Result<Dataset> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut premises = Vec::new();
        let mut hypotheses = Vec::new();
        let mut labels = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            extract_examples_from_batch(&batch, &mut premises, &mut hypotheses, &mut labels)?;
        }

        let dataset = Dataset::new(premises, hypotheses, labels)?;

        tracing::debug!(
            count = dataset.len(),
            path = %path.display(),
            "Read Parquet dataset"
        );

        Ok(dataset)
    }

    /// Compute summary statistics for a dataset file.
    pub fn read_summary(path: &Path) -> anyhow::Result<DatasetSummary> {
        Ok(Self::read(path)?.summary())
    }
}

/// Append the examples of one Arrow RecordBatch to the output vectors.
fn extract_examples_from_batch(
    batch: &RecordBatch,
    premises: &mut Vec<Vec<u32>>,
    hypotheses: &mut Vec<Vec<u32>>,
    labels: &mut Vec<i64>,
) -> anyhow::Result<()> {
    let premise_lists = batch
        .column(0)
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| anyhow::anyhow!("Column 0 (premise) is not ListArray"))?;

    let hypothesis_lists = batch
        .column(1)
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| anyhow::anyhow!("Column 1 (hypothesis) is not ListArray"))?;

    let label_values = batch
        .column(2)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| anyhow::anyhow!("Column 2 (label) is not Int64Array"))?;

    for i in 0..batch.num_rows() {
        premises.push(token_ids(premise_lists, i, "premise")?);
        hypotheses.push(token_ids(hypothesis_lists, i, "hypothesis")?);
        labels.push(label_values.value(i));
    }

    Ok(())
}

fn token_ids(lists: &ListArray, row: usize, column: &str) -> anyhow::Result<Vec<u32>> {
    let values = lists.value(row);
    let ids = values
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| anyhow::anyhow!("{column} list values are not UInt32Array"))?;
    Ok(ids.values().to_vec())
}
