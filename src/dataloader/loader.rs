use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::thread_pool::thread_pool::ThreadPool;

use super::batch::{fetch_batch, BatchResult};
use super::config::DataLoaderConfig;
use super::dataset::Dataset;
use super::error::DataLoaderError;
use super::info::LoaderSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderState {
    /// Constructed, or the last pass was abandoned.
    Idle,
    Running,
    /// Every batch of the current pass has been handed out.
    Exhausted,
}

/// Turns a [`Dataset`] into a restartable sequence of batches.
///
/// Each pass starts with [`begin_epoch`](DataLoader::begin_epoch) (or
/// [`epoch`](DataLoader::epoch)), which regenerates the index ordering from
/// the loader's random source when shuffling.
///
/// With `num_workers > 0` whole batches are fetched on a worker pool owned by
/// the loader. At most `prefetch_factor * num_workers` batches are in flight
/// ahead of the consumer, and they are handed out strictly in batch order, so
/// the output is identical to synchronous iteration with the same random source.
pub struct DataLoader<D: Dataset, R = StdRng> {
    dataset: Arc<D>,
    config: DataLoaderConfig,
    rng: R,
    state: LoaderState,
    epoch: usize,
    order: Vec<usize>,
    next_batch: usize,
    next_submit: usize,
    pending: VecDeque<(usize, Receiver<BatchResult<D>>)>,
    cancelled: Arc<AtomicBool>,
    pool: Option<ThreadPool>,
}

impl<D: Dataset + 'static> DataLoader<D, StdRng> {
    pub fn seeded(dataset: D, config: DataLoaderConfig, seed: u64) -> Result<Self, DataLoaderError> {
        Self::new(dataset, config, StdRng::seed_from_u64(seed))
    }
}

impl<D: Dataset + 'static, R: Rng> DataLoader<D, R> {
    pub fn new(dataset: D, config: DataLoaderConfig, rng: R) -> Result<Self, DataLoaderError> {
        let config = config.build()?;

        let pool = if config.num_workers > 0 {
            Some(ThreadPool::new(config.num_workers).map_err(DataLoaderError::WorkerSpawn)?)
        } else {
            None
        };

        Ok(DataLoader {
            dataset: Arc::new(dataset),
            config,
            rng,
            state: LoaderState::Idle,
            epoch: 0,
            order: Vec::new(),
            next_batch: 0,
            next_submit: 0,
            pending: VecDeque::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            pool,
        })
    }

    /// Starts a new pass. A pass still running is abandoned first.
    pub fn begin_epoch(&mut self) {
        if self.state == LoaderState::Running {
            self.abandon_epoch();
        }

        // Always start from the identity so a pass depends only on the rng state
        self.order.clear();
        self.order.extend(0..self.dataset.len());
        if self.config.shuffle {
            self.order.shuffle(&mut self.rng);
        }

        self.next_batch = 0;
        self.next_submit = 0;
        self.cancelled = Arc::new(AtomicBool::new(false));
        self.state = LoaderState::Running;
        self.epoch += 1;

        tracing::debug!(
            epoch = self.epoch,
            shuffle = self.config.shuffle,
            batches = self.num_batches(),
            "epoch started"
        );

        self.request_next_batches();
    }

    /// Next batch of the running pass, or `None` once it is over.
    ///
    /// A failed sample fails only its own batch; the call after it continues
    /// with the following batch.
    pub fn next_batch(&mut self) -> Option<BatchResult<D>> {
        if self.state != LoaderState::Running {
            return None;
        }
        if self.next_batch >= self.num_batches() {
            self.state = LoaderState::Exhausted;
            tracing::debug!(epoch = self.epoch, "epoch exhausted");
            return None;
        }

        let batch_number = self.next_batch;
        self.next_batch += 1;

        let result = if self.pool.is_some() {
            let result = self.wait_for_batch(batch_number);
            self.request_next_batches();
            result
        } else {
            let indices = self.batch_indices(batch_number).to_vec();
            fetch_batch(&*self.dataset, batch_number, indices, || false)
                .unwrap_or(Err(DataLoaderError::WorkerLost { batch_number }))
        };

        if let Err(err) = &result {
            tracing::warn!(epoch = self.epoch, batch = batch_number, error = %err, "batch failed");
        }

        Some(result)
    }

    /// Begins a pass and iterates it. Dropping the iterator early abandons the pass.
    pub fn epoch(&mut self) -> Epoch<'_, D, R> {
        self.begin_epoch();
        Epoch { loader: self }
    }

    fn wait_for_batch(&mut self, batch_number: usize) -> BatchResult<D> {
        match self.pending.pop_front() {
            Some((submitted, receiver)) => {
                debug_assert_eq!(submitted, batch_number);
                receiver
                    .recv()
                    .unwrap_or(Err(DataLoaderError::WorkerLost { batch_number }))
            }
            None => Err(DataLoaderError::WorkerLost { batch_number }),
        }
    }

    fn request_next_batches(&mut self) {
        let pool = match &self.pool {
            Some(pool) => pool,
            None => return,
        };
        let window = self.config.prefetch_window();
        let total = self.num_batches();

        while self.pending.len() < window && self.next_submit < total {
            let batch_number = self.next_submit;
            let indices = self.batch_indices(batch_number).to_vec();
            let dataset = Arc::clone(&self.dataset);
            let cancelled = Arc::clone(&self.cancelled);
            let (sender, receiver) = bounded(1);

            // If the pool refuses the job the sender is dropped with it and
            // the consumer gets WorkerLost for this batch
            pool.submit_work(move || {
                let stop = || cancelled.load(Ordering::Relaxed);
                if let Some(result) = fetch_batch(&*dataset, batch_number, indices, stop) {
                    let _ = sender.send(result);
                }
            });

            self.pending.push_back((batch_number, receiver));
            self.next_submit += 1;
        }
    }
}

impl<D: Dataset, R> DataLoader<D, R> {
    /// Drops the running pass and any in-flight prefetch. Workers notice
    /// between samples and discard their partial batches.
    pub fn abandon_epoch(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.pending.clear();
        if self.state == LoaderState::Running {
            tracing::debug!(
                epoch = self.epoch,
                delivered = self.next_batch,
                "epoch abandoned"
            );
            self.state = LoaderState::Idle;
        }
    }

    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        if self.config.drop_last {
            len / self.config.batch_size
        } else {
            len.div_ceil(self.config.batch_size)
        }
    }

    /// Dataset indices of batch `batch_number` under the current ordering.
    fn batch_indices(&self, batch_number: usize) -> &[usize] {
        let start = batch_number * self.config.batch_size;
        let end = (start + self.config.batch_size).min(self.order.len());
        &self.order[start..end]
    }

    /// Ordering of the current (or last) pass.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Number of passes begun so far.
    pub fn epochs_started(&self) -> usize {
        self.epoch
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn summary(&self) -> LoaderSummary {
        LoaderSummary::new(self.dataset.name(), self.dataset.len(), &self.config)
    }
}

impl<D: Dataset, R> Drop for DataLoader<D, R> {
    fn drop(&mut self) {
        // Let queued jobs return immediately so the pool can join quickly
        self.abandon_epoch();
    }
}

/// One pass over a [`DataLoader`].
pub struct Epoch<'a, D: Dataset, R> {
    loader: &'a mut DataLoader<D, R>,
}

impl<D: Dataset + 'static, R: Rng> Iterator for Epoch<'_, D, R> {
    type Item = BatchResult<D>;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_batch()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.loader.state {
            LoaderState::Running => self.loader.num_batches() - self.loader.next_batch,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl<D: Dataset + 'static, R: Rng> ExactSizeIterator for Epoch<'_, D, R> {}

impl<D: Dataset, R> Drop for Epoch<'_, D, R> {
    fn drop(&mut self) {
        if self.loader.state == LoaderState::Running {
            self.loader.abandon_epoch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::in_memory::InMemoryDataset;

    fn numbers(n: usize) -> InMemoryDataset<usize, usize> {
        InMemoryDataset::from_pairs((0..n).map(|i| (i, i % 3)))
    }

    fn sizes(loader: &mut DataLoader<InMemoryDataset<usize, usize>>) -> Vec<usize> {
        loader.epoch().map(|b| b.unwrap().len()).collect()
    }

    #[test]
    fn ten_by_three() {
        let mut loader = DataLoader::seeded(numbers(10), DataLoaderConfig::new(3, false), 0).unwrap();
        assert_eq!(sizes(&mut loader), vec![3, 3, 3, 1]);

        let config = DataLoaderConfig::new(3, false).drop_last(true);
        let mut loader = DataLoader::seeded(numbers(10), config, 0).unwrap();
        assert_eq!(loader.num_batches(), 3);
        assert_eq!(sizes(&mut loader), vec![3, 3, 3]);
    }

    #[test]
    fn state_machine() {
        let mut loader = DataLoader::seeded(numbers(4), DataLoaderConfig::new(2, true), 1).unwrap();
        assert_eq!(loader.state(), LoaderState::Idle);
        assert!(loader.next_batch().is_none());

        loader.begin_epoch();
        assert_eq!(loader.state(), LoaderState::Running);
        assert!(loader.next_batch().is_some());
        assert!(loader.next_batch().is_some());
        assert_eq!(loader.state(), LoaderState::Running);
        assert!(loader.next_batch().is_none());
        assert_eq!(loader.state(), LoaderState::Exhausted);
        assert!(loader.next_batch().is_none());

        loader.begin_epoch();
        assert_eq!(loader.state(), LoaderState::Running);
        assert_eq!(loader.epochs_started(), 2);
    }

    #[test]
    fn dropping_an_epoch_early_abandons_it() {
        let config = DataLoaderConfig::new(1, false).num_workers(2);
        let mut loader = DataLoader::seeded(numbers(50), config, 3).unwrap();
        {
            let mut epoch = loader.epoch();
            assert_eq!(epoch.len(), 50);
            assert_eq!(epoch.next().unwrap().unwrap().indices, vec![0]);
        }
        assert_eq!(loader.state(), LoaderState::Idle);
        assert!(loader.next_batch().is_none());

        // A fresh pass still starts from batch 0
        let first = loader.epoch().next().unwrap().unwrap();
        assert_eq!(first.batch_number, 0);
    }

    #[test]
    fn empty_dataset_has_no_batches() {
        let ds: InMemoryDataset<usize, usize> = InMemoryDataset::new(Vec::new());
        let mut loader = DataLoader::seeded(ds, DataLoaderConfig::new(4, true), 0).unwrap();
        assert_eq!(loader.epoch().count(), 0);
        assert_eq!(loader.state(), LoaderState::Exhausted);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(DataLoader::seeded(numbers(3), DataLoaderConfig::new(0, false), 0).is_err());
    }
}
