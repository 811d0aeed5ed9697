use rayon::iter::{IntoParallelIterator, ParallelIterator};

use super::dataset::{check_index, Dataset, Sample, SampleOf};
use super::error::DataLoaderError;

/// Every sample held in memory. `get` hands out clones.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDataset<F, L> {
    samples: Vec<Sample<F, L>>,
}

impl<F, L> InMemoryDataset<F, L> {
    pub fn new(samples: Vec<Sample<F, L>>) -> Self {
        InMemoryDataset { samples }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (F, L)>) -> Self {
        InMemoryDataset {
            samples: pairs.into_iter().map(Sample::from).collect(),
        }
    }

    pub fn samples(&self) -> &[Sample<F, L>] {
        &self.samples
    }
}

impl<F: Send, L: Send> InMemoryDataset<F, L> {
    /// Loads every sample of `source` up front, fetching in parallel.
    ///
    /// Sample order matches `source`. The first failing index aborts the load.
    pub fn preload<D>(source: &D) -> Result<Self, DataLoaderError>
    where
        D: Dataset<Features = F, Label = L> + ?Sized,
    {
        // rayon's ordered collect keeps index order regardless of completion order
        let samples = (0..source.len())
            .into_par_iter()
            .map(|idx| source.get(idx))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            dataset = source.name(),
            samples = samples.len(),
            "preloaded dataset into memory"
        );

        Ok(InMemoryDataset { samples })
    }
}

impl<F, L> Dataset for InMemoryDataset<F, L>
where
    F: Clone + Send + Sync,
    L: Clone + Send + Sync,
{
    type Features = F;
    type Label = L;

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError> {
        check_index(index, self.samples.len())?;
        Ok(self.samples[index].clone())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
