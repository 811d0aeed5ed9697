use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use super::combinators::Subset;
use super::dataset::Dataset;
use super::error::DataLoaderError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DatasetSplit {
    Train,
    Test,
    Validation,
}

/// Validation receives whatever train and test leave over.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SplitRatios {
    pub train: f32,
    pub test: f32,
}

impl SplitRatios {
    pub fn new(train: f32, test: f32) -> Result<Self, DataLoaderError> {
        if !train.is_finite()
            || !test.is_finite()
            || train + test > 1.0
            || train <= 0.0
            || test < 0.0
        {
            return Err(DataLoaderError::InvalidSplitRatios { train, test });
        }
        Ok(SplitRatios { train, test })
    }

    /// `(train, test, validation)` sample counts for a dataset of `total_size`.
    pub fn sizes(&self, total_size: usize) -> (usize, usize, usize) {
        // Counts above 2^24 are not exact in f32
        let portion = |ratio: f32| ((total_size as f64 * ratio as f64) as usize).min(total_size);
        let train_size = portion(self.train);
        let test_size = portion(self.test).min(total_size - train_size);
        let val_size = total_size - train_size - test_size;
        (train_size, test_size, val_size)
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        SplitRatios {
            train: 0.8,
            test: 0.1,
        }
    }
}

pub struct DatasetSplits<D> {
    pub train: Subset<D>,
    pub test: Subset<D>,
    pub validation: Subset<D>,
}

impl<D> DatasetSplits<D> {
    pub fn get(&self, split: DatasetSplit) -> &Subset<D> {
        match split {
            DatasetSplit::Train => &self.train,
            DatasetSplit::Test => &self.test,
            DatasetSplit::Validation => &self.validation,
        }
    }
}

/// Shuffles all indices once and cuts them into train, test and validation
/// subsets. The three never overlap and together cover the dataset.
pub fn random_split<D: Dataset, R: Rng + ?Sized>(
    dataset: Arc<D>,
    ratios: SplitRatios,
    rng: &mut R,
) -> Result<DatasetSplits<D>, DataLoaderError> {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.shuffle(rng);

    let (train_size, test_size, _) = ratios.sizes(indices.len());
    let validation = indices.split_off(train_size + test_size);
    let test = indices.split_off(train_size);
    let train = indices;

    Ok(DatasetSplits {
        train: Subset::new(Arc::clone(&dataset), train)?,
        test: Subset::new(Arc::clone(&dataset), test)?,
        validation: Subset::new(dataset, validation)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::in_memory::InMemoryDataset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_bad_ratios() {
        assert!(SplitRatios::new(0.9, 0.2).is_err());
        assert!(SplitRatios::new(0.0, 0.5).is_err());
        assert!(SplitRatios::new(0.5, -0.1).is_err());
        assert!(SplitRatios::new(1.0, 0.0).is_ok());
        assert!(SplitRatios::new(f32::NAN, 0.1).is_err());
        assert!(SplitRatios::new(0.5, f32::NAN).is_err());
        assert!(SplitRatios::new(f32::INFINITY, 0.0).is_err());
    }

    #[test]
    fn sizes_never_exceed_large_totals() {
        let total = (1 << 24) + 3;
        assert_eq!(SplitRatios::new(1.0, 0.0).unwrap().sizes(total), (total, 0, 0));

        let (train, test, val) = SplitRatios::new(0.9, 0.1).unwrap().sizes(total);
        assert!(train <= total && test <= total - train);
        assert_eq!(train + test + val, total);
    }

    #[test]
    fn split_covers_dataset_once() {
        let ds = Arc::new(InMemoryDataset::from_pairs((0..100).map(|i| (i, i))));
        let mut rng = StdRng::seed_from_u64(11);
        let splits = random_split(ds, SplitRatios::new(0.7, 0.2).unwrap(), &mut rng).unwrap();

        assert_eq!(splits.get(DatasetSplit::Train).len(), 70);
        assert_eq!(splits.get(DatasetSplit::Test).len(), 20);
        assert_eq!(splits.get(DatasetSplit::Validation).len(), 10);

        let mut all: Vec<usize> = [&splits.train, &splits.test, &splits.validation]
            .iter()
            .flat_map(|s| s.indices().to_vec())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}
