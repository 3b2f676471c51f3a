//! Deterministic sampling over the metadata stream
//!
//! A sample is a sorted set of global stream indices drawn without
//! replacement from a seeded generator. The stream is never materialized:
//! each batch is filtered against the selection using the running index of
//! its first element.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{Error, Result};

/// Draw `sample_size` distinct indices from `0..total`, sorted ascending.
///
/// Requires `0 < sample_size < total`. The same `(sample_size, total, seed)`
/// always yields the same selection.
pub fn select(sample_size: usize, total: usize, seed: u64) -> Result<Vec<usize>> {
    if sample_size == 0 || sample_size >= total {
        return Err(Error::SampleRange { sample_size, total });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, total, sample_size).into_vec();
    indices.sort_unstable();
    Ok(indices)
}

/// Keep the elements of `batch` whose global index is in `selection`.
///
/// `running_offset` is the global index of the first element of `batch`; it
/// is advanced by `batch.len()` so the next call continues where this one
/// stopped. `selection` must be sorted.
pub fn apply_to_batch<T>(batch: Vec<T>, selection: &[usize], running_offset: &mut usize) -> Vec<T> {
    let start = *running_offset;
    *running_offset += batch.len();

    batch
        .into_iter()
        .enumerate()
        .filter(|(i, _)| selection.binary_search(&(start + i)).is_ok())
        .map(|(_, item)| item)
        .collect()
}

/// A selection together with the running offset into the stream
#[derive(Clone, Debug)]
pub struct SampleWindow {
    selection: Vec<usize>,
    offset: usize,
}

impl SampleWindow {
    /// Draw a selection (see [`select`]) and start at the head of the stream.
    pub fn new(sample_size: usize, total: usize, seed: u64) -> Result<Self> {
        Ok(Self {
            selection: select(sample_size, total, seed)?,
            offset: 0,
        })
    }

    /// Filter the next batch of the stream.
    pub fn apply_to_batch<T>(&mut self, batch: Vec<T>) -> Vec<T> {
        apply_to_batch(batch, &self.selection, &mut self.offset)
    }

    /// The sorted selected indices
    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    /// Global index of the next element to be filtered
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True once the stream has moved past the last selected index
    pub fn is_exhausted(&self) -> bool {
        self.selection.last().is_none_or(|last| *last < self.offset)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_reproducible_for_same_seed() {
        let first = select(4, 22, 1).unwrap();
        let second = select(4, 22, 1).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn select_returns_sorted_distinct_indices_in_range() {
        let picked = select(50, 100, 7).unwrap();

        assert!(picked.windows(2).all(|w| w[0] < w[1]), "sorted and distinct");
        assert!(picked.iter().all(|&i| i < 100));
    }

    #[test]
    fn select_rejects_out_of_range_sizes() {
        for (size, total) in [(0, 10), (10, 10), (11, 10)] {
            match select(size, total, 1) {
                Err(Error::SampleRange { sample_size, total: t }) => {
                    assert_eq!((sample_size, t), (size, total));
                }
                other => panic!("expected SampleRange for ({size}, {total}), got {other:?}"),
            }
        }
    }

    #[test]
    fn apply_to_batch_uses_cumulative_offsets() {
        let selection = vec![1, 4, 5, 9];
        let mut offset = 0;

        let first = apply_to_batch(vec!['a', 'b', 'c'], &selection, &mut offset);
        let second = apply_to_batch(vec!['d', 'e', 'f'], &selection, &mut offset);
        let third = apply_to_batch(vec!['g', 'h', 'i', 'j'], &selection, &mut offset);

        assert_eq!(first, vec!['b']);
        assert_eq!(second, vec!['e', 'f']);
        assert_eq!(third, vec!['j']);
        assert_eq!(offset, 10);
    }

    #[test]
    fn sample_window_covers_whole_selection_across_batches() {
        let mut window = SampleWindow::new(4, 22, 1).unwrap();
        let expected = window.selection().to_vec();
        let items: Vec<usize> = (0..22).collect();

        let mut kept = Vec::new();
        for chunk in items.chunks(5) {
            kept.extend(window.apply_to_batch(chunk.to_vec()));
        }

        assert_eq!(kept, expected);
        assert!(window.is_exhausted());
        assert_eq!(window.offset(), 22);
    }
}
