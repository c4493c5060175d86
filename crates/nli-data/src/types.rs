//! Data types for preprocessed NLI datasets and their summaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Gold label of a premise/hypothesis pair, using the SNLI class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Entailment,
    Neutral,
    Contradiction,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entailment => write!(f, "entailment"),
            Self::Neutral => write!(f, "neutral"),
            Self::Contradiction => write!(f, "contradiction"),
        }
    }
}

impl Label {
    /// All labels in class-index order.
    pub const ALL: [Label; 3] = [Label::Entailment, Label::Neutral, Label::Contradiction];

    /// Class index used in preprocessed files and as the logit position.
    pub fn index(self) -> i64 {
        match self {
            Self::Entailment => 0,
            Self::Neutral => 1,
            Self::Contradiction => 2,
        }
    }

    /// Map a class index back to a label. `None` for indices outside the SNLI label map.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Entailment),
            1 => Some(Self::Neutral),
            2 => Some(Self::Contradiction),
            _ => None,
        }
    }
}

/// On-disk format of a preprocessed dataset, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// Python pickle of a dict with `premises`, `hypotheses` and `labels`.
    Pickle,
    /// Parquet with `premise`, `hypothesis` (lists of token ids) and `label` columns.
    Parquet,
}

impl DatasetFormat {
    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pkl") | Some("pickle") => Ok(Self::Pickle),
            Some("parquet") => Ok(Self::Parquet),
            Some(other) => anyhow::bail!(
                "unsupported dataset extension '{other}' for {} (expected .pkl, .pickle or .parquet)",
                path.display()
            ),
            None => anyhow::bail!(
                "dataset path {} has no extension (expected .pkl, .pickle or .parquet)",
                path.display()
            ),
        }
    }
}

/// A preprocessed NLI dataset: three sequences aligned by index.
///
/// Premises and hypotheses are token id sequences; labels are class indices.
/// The alignment invariant (`premises.len() == hypotheses.len() == labels.len()`)
/// is checked on construction and cannot be broken afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    premises: Vec<Vec<u32>>,
    hypotheses: Vec<Vec<u32>>,
    labels: Vec<i64>,
}

/// Unchecked shape of a serialized dataset. Unknown keys (e.g. `ids`) are ignored.
#[derive(Deserialize)]
struct RawDataset {
    premises: Vec<Vec<u32>>,
    hypotheses: Vec<Vec<u32>>,
    labels: Vec<i64>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = anyhow::Error;

    fn try_from(raw: RawDataset) -> anyhow::Result<Self> {
        Dataset::new(raw.premises, raw.hypotheses, raw.labels)
    }
}

/// A single premise/hypothesis pair borrowed from a [`Dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Example<'a> {
    pub premise: &'a [u32],
    pub hypothesis: &'a [u32],
    pub label: i64,
}

impl Dataset {
    /// Build a dataset, checking that the three sequences are aligned.
    pub fn new(
        premises: Vec<Vec<u32>>,
        hypotheses: Vec<Vec<u32>>,
        labels: Vec<i64>,
    ) -> anyhow::Result<Self> {
        if premises.len() != labels.len() || hypotheses.len() != labels.len() {
            anyhow::bail!(
                "misaligned dataset: {} premises, {} hypotheses, {} labels",
                premises.len(),
                hypotheses.len(),
                labels.len()
            );
        }
        Ok(Self {
            premises,
            hypotheses,
            labels,
        })
    }

    /// Build a dataset from `(premise, hypothesis, label)` triples.
    pub fn from_examples<I>(examples: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u32>, Vec<u32>, i64)>,
    {
        let mut dataset = Self::default();
        for (premise, hypothesis, label) in examples {
            dataset.premises.push(premise);
            dataset.hypotheses.push(hypothesis);
            dataset.labels.push(label);
        }
        dataset
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the dataset has no examples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn premises(&self) -> &[Vec<u32>] {
        &self.premises
    }

    pub fn hypotheses(&self) -> &[Vec<u32>] {
        &self.hypotheses
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Borrow the example at `index`, or `None` if out of range.
    pub fn example(&self, index: usize) -> Option<Example<'_>> {
        Some(Example {
            premise: self.premises.get(index)?,
            hypothesis: self.hypotheses.get(index)?,
            label: *self.labels.get(index)?,
        })
    }

    /// Iterate over all examples in order.
    pub fn iter(&self) -> impl Iterator<Item = Example<'_>> + '_ {
        self.premises
            .iter()
            .zip(&self.hypotheses)
            .zip(&self.labels)
            .map(|((premise, hypothesis), &label)| Example {
                premise,
                hypothesis,
                label,
            })
    }

    /// Reject labels that cannot address one of `num_classes` logits.
    pub fn check_labels(&self, num_classes: usize) -> anyhow::Result<()> {
        if let Some((i, &label)) = self
            .labels
            .iter()
            .enumerate()
            .find(|(_, label)| **label < 0 || **label >= num_classes as i64)
        {
            anyhow::bail!(
                "example {i} has label {label}, expected a class index in 0..{num_classes}"
            );
        }
        Ok(())
    }

    /// Compute summary statistics.
    pub fn summary(&self) -> DatasetSummary {
        let mut label_counts = [0usize; 3];
        let mut other_labels = 0;
        for &label in &self.labels {
            match Label::from_index(label) {
                Some(l) => label_counts[l.index() as usize] += 1,
                None => other_labels += 1,
            }
        }

        let mean_len = |seqs: &[Vec<u32>]| {
            if seqs.is_empty() {
                0.0
            } else {
                seqs.iter().map(Vec::len).sum::<usize>() as f64 / seqs.len() as f64
            }
        };
        let max_len = |seqs: &[Vec<u32>]| seqs.iter().map(Vec::len).max().unwrap_or(0);

        DatasetSummary {
            total_examples: self.len(),
            entailment_count: label_counts[0],
            neutral_count: label_counts[1],
            contradiction_count: label_counts[2],
            other_label_count: other_labels,
            mean_premise_len: mean_len(&self.premises),
            max_premise_len: max_len(&self.premises),
            mean_hypothesis_len: mean_len(&self.hypotheses),
            max_hypothesis_len: max_len(&self.hypotheses),
        }
    }
}

/// Quick statistics from a dataset file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    /// Total number of examples.
    pub total_examples: usize,
    pub entailment_count: usize,
    pub neutral_count: usize,
    pub contradiction_count: usize,
    /// Labels outside the SNLI label map.
    pub other_label_count: usize,
    /// Mean premise length in tokens.
    pub mean_premise_len: f64,
    pub max_premise_len: usize,
    /// Mean hypothesis length in tokens.
    pub mean_hypothesis_len: f64,
    pub max_hypothesis_len: usize,
}

impl DatasetSummary {
    /// Number of examples carrying `label`.
    pub fn label_count(&self, label: Label) -> usize {
        match label {
            Label::Entailment => self.entailment_count,
            Label::Neutral => self.neutral_count,
            Label::Contradiction => self.contradiction_count,
        }
    }
}
