//! Batch partitioning of NLI datasets.
//!
//! [`partition`] splits a [`Dataset`] into consecutive fixed-size batches,
//! optionally after a uniform random permutation of the example order.
//! Validation and test data are partitioned once without shuffling; training
//! data is re-partitioned with shuffling at the start of every epoch.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::Dataset;

/// One batch of examples: owned slices of the dataset's three aligned sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub premises: Vec<Vec<u32>>,
    pub hypotheses: Vec<Vec<u32>>,
    pub labels: Vec<i64>,
}

impl Batch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            premises: Vec::with_capacity(capacity),
            hypotheses: Vec::with_capacity(capacity),
            labels: Vec::with_capacity(capacity),
        }
    }

    /// Number of examples in the batch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Batches addressed by their integer index, in partition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCollection {
    batches: Vec<Batch>,
}

impl BatchCollection {
    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Batch at index `idx`.
    pub fn get(&self, idx: usize) -> Option<&Batch> {
        self.batches.get(idx)
    }

    /// Iterate over `(batch index, batch)` pairs in index order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, &Batch)> + '_ {
        self.batches.iter().enumerate()
    }

    /// Total number of examples across all batches.
    pub fn num_examples(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }
}

/// Partition `dataset` into batches of `batch_size` examples.
///
/// When `shuffle` is set, example indices are permuted uniformly at random
/// with `rng` first; otherwise the dataset order is kept. Consecutive indices
/// then fill batch 0, 1, 2, ... in turn, so every batch holds exactly
/// `batch_size` examples except possibly the last one. An empty dataset
/// yields an empty collection.
///
/// # Panics
/// Panics if `batch_size` is zero.
pub fn partition(
    dataset: &Dataset,
    batch_size: usize,
    shuffle: bool,
    rng: &mut impl Rng,
) -> BatchCollection {
    assert!(batch_size > 0, "batch_size must be greater than 0");

    let mut index: Vec<usize> = (0..dataset.len()).collect();
    if shuffle {
        index.shuffle(rng);
    }

    let premises = dataset.premises();
    let hypotheses = dataset.hypotheses();
    let labels = dataset.labels();

    let batches = index
        .chunks(batch_size)
        .map(|chunk| {
            let mut batch = Batch::with_capacity(chunk.len());
            for &i in chunk {
                batch.premises.push(premises[i].clone());
                batch.hypotheses.push(hypotheses[i].clone());
                batch.labels.push(labels[i]);
            }
            batch
        })
        .collect();

    BatchCollection { batches }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Example `i` has premise `[i]`, hypothesis `[i, i]` and label `i % 3`,
    /// so alignment can be checked from any single field.
    fn numbered(n: usize) -> Dataset {
        Dataset::from_examples(
            (0..n as u32).map(|i| (vec![i], vec![i, i], (i % 3) as i64)),
        )
    }

    fn assert_aligned(batches: &BatchCollection) {
        for (_, batch) in batches.iter() {
            assert_eq!(batch.premises.len(), batch.labels.len());
            assert_eq!(batch.hypotheses.len(), batch.labels.len());
            for ((p, h), &l) in batch.premises.iter().zip(&batch.hypotheses).zip(&batch.labels) {
                assert_eq!(h, &vec![p[0], p[0]]);
                assert_eq!(l, (p[0] % 3) as i64);
            }
        }
    }

    #[test]
    fn test_unshuffled_preserves_order() {
        let ds = numbered(10);
        let mut rng = StdRng::seed_from_u64(0);
        let batches = partition(&ds, 4, false, &mut rng);

        assert_eq!(batches.len(), 3);
        let sizes: Vec<usize> = batches.iter().map(|(_, b)| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let order: Vec<u32> = batches
            .iter()
            .flat_map(|(_, b)| b.premises.iter().map(|p| p[0]))
            .collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert_aligned(&batches);
    }

    #[test]
    fn test_unshuffled_is_deterministic() {
        let ds = numbered(37);
        let a = partition(&ds, 5, false, &mut StdRng::seed_from_u64(1));
        let b = partition(&ds, 5, false, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_exact_multiple_has_full_last_batch() {
        let ds = numbered(12);
        let batches = partition(&ds, 4, false, &mut StdRng::seed_from_u64(0));
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|(_, b)| b.len() == 4));
    }

    #[test]
    fn test_batch_larger_than_dataset() {
        let ds = numbered(3);
        let batches = partition(&ds, 64, true, &mut StdRng::seed_from_u64(0));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches.get(0).unwrap().len(), 3);
        assert!(batches.get(1).is_none());
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::default();
        let batches = partition(&ds, 32, true, &mut StdRng::seed_from_u64(0));
        assert!(batches.is_empty());
        assert_eq!(batches.num_examples(), 0);
    }

    #[test]
    #[should_panic(expected = "batch_size must be greater than 0")]
    fn test_zero_batch_size_panics() {
        partition(&numbered(3), 0, false, &mut StdRng::seed_from_u64(0));
    }

    #[test]
    fn test_shuffled_is_permutation_of_unshuffled() {
        let ds = numbered(50);
        let plain = partition(&ds, 7, false, &mut StdRng::seed_from_u64(0));
        let shuffled = partition(&ds, 7, true, &mut StdRng::seed_from_u64(42));

        assert_eq!(plain.len(), shuffled.len());
        assert_eq!(shuffled.num_examples(), 50);
        assert_aligned(&shuffled);

        let mut seen: Vec<u32> = shuffled
            .iter()
            .flat_map(|(_, b)| b.premises.iter().map(|p| p[0]))
            .collect();
        assert_ne!(seen, (0..50).collect::<Vec<_>>(), "seed 42 should reorder 50 items");
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_shuffle() {
        let ds = numbered(40);
        let a = partition(&ds, 6, true, &mut StdRng::seed_from_u64(7));
        let b = partition(&ds, 6, true, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    /// Sweep dataset sizes, batch sizes and seeds, checking count
    /// preservation, alignment and batch sizing on every combination.
    #[test]
    fn test_partition_invariants_sweep() {
        let mut rng = StdRng::seed_from_u64(2024);
        for n in [0usize, 1, 2, 5, 31, 32, 33, 100] {
            let ds = numbered(n);
            for batch_size in [1usize, 2, 3, 8, 32, 200] {
                for shuffle in [false, true] {
                    let batches = partition(&ds, batch_size, shuffle, &mut rng);

                    assert_eq!(batches.num_examples(), n);
                    assert_eq!(batches.len(), n.div_ceil(batch_size));
                    assert_aligned(&batches);

                    let last = batches.len().saturating_sub(1);
                    for (idx, batch) in batches.iter() {
                        if idx < last {
                            assert_eq!(batch.len(), batch_size);
                        } else {
                            assert!(batch.len() >= 1 && batch.len() <= batch_size);
                        }
                    }

                    let mut ids: Vec<u32> = batches
                        .iter()
                        .flat_map(|(_, b)| b.premises.iter().map(|p| p[0]))
                        .collect();
                    ids.sort_unstable();
                    assert_eq!(ids, (0..n as u32).collect::<Vec<_>>());
                }
            }
        }
    }
}
