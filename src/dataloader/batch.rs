use super::dataset::{Dataset, Sample};
use super::error::DataLoaderError;
use super::image_data::{ImageBatch, ImageData};

/// Samples of one training step, in epoch order.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch<F, L> {
    /// Position of this batch within its epoch, starting at 0.
    pub batch_number: usize,
    /// Dataset index of every sample, parallel to `samples`.
    pub indices: Vec<usize>,
    pub samples: Vec<Sample<F, L>>,
}

pub type BatchOf<D> = Batch<<D as Dataset>::Features, <D as Dataset>::Label>;
pub type BatchResult<D> = Result<BatchOf<D>, DataLoaderError>;

impl<F, L> Batch<F, L> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn features(&self) -> impl Iterator<Item = &F> {
        self.samples.iter().map(|s| &s.features)
    }

    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.samples.iter().map(|s| &s.label)
    }

    /// Splits into `(features, labels)`.
    pub fn unzip(self) -> (Vec<F>, Vec<L>) {
        self.samples.into_iter().map(Sample::into_pair).unzip()
    }
}

impl<L> Batch<ImageData, L> {
    pub fn into_image_batch(self) -> Result<ImageBatch<L>, DataLoaderError> {
        ImageBatch::collate(self.batch_number, self.samples)
    }
}

/// Fetches `indices` from `dataset` in order.
///
/// The first failing sample fails the whole batch; the rest of the batch is
/// not fetched. Returns `None` if `should_stop` turns true between samples.
pub(crate) fn fetch_batch<D: Dataset>(
    dataset: &D,
    batch_number: usize,
    indices: Vec<usize>,
    should_stop: impl Fn() -> bool,
) -> Option<BatchResult<D>> {
    let mut samples = Vec::with_capacity(indices.len());
    for &index in &indices {
        if should_stop() {
            return None;
        }
        match dataset.get(index) {
            Ok(sample) => samples.push(sample),
            Err(err) => return Some(Err(err.in_batch(batch_number, index))),
        }
    }

    Some(Ok(Batch {
        batch_number,
        indices,
        samples,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::in_memory::InMemoryDataset;

    #[test]
    fn fetches_in_given_order() {
        let ds = InMemoryDataset::from_pairs((0..6).map(|i| (i * 10, i)));
        let batch = fetch_batch(&ds, 1, vec![5, 0, 3], || false).unwrap().unwrap();
        assert_eq!(batch.batch_number, 1);
        assert_eq!(batch.len(), 3);
        let (features, labels) = batch.unzip();
        assert_eq!(features, vec![50, 0, 30]);
        assert_eq!(labels, vec![5, 0, 3]);
    }

    #[test]
    fn failure_names_the_sample() {
        let ds = InMemoryDataset::from_pairs((0..2).map(|i| (i, i)));
        let err = fetch_batch(&ds, 7, vec![1, 2], || false).unwrap().unwrap_err();
        match err {
            DataLoaderError::Fetch {
                batch_number,
                index,
                ..
            } => assert_eq!((batch_number, index), (7, 2)),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn stops_when_asked() {
        let ds = InMemoryDataset::from_pairs((0..2).map(|i| (i, i)));
        assert!(fetch_batch(&ds, 0, vec![0, 1], || true).is_none());
    }
}
