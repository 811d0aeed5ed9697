use super::error::DataLoaderError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLoaderConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Suppress a final batch shorter than `batch_size`.
    pub drop_last: bool,
    /// 0 fetches synchronously on the calling thread.
    pub num_workers: usize,
    /// Batches kept in flight per worker.
    pub prefetch_factor: usize,
}

impl DataLoaderConfig {
    /// Batch size and shuffling have no defaults; everything else does.
    pub fn new(batch_size: usize, shuffle: bool) -> Self {
        Self {
            batch_size,
            shuffle,
            drop_last: false,
            num_workers: 0,
            prefetch_factor: 2,
        }
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// One worker per logical CPU.
    pub fn with_all_cpus(self) -> Self {
        self.num_workers(num_cpus::get())
    }

    pub fn prefetch_factor(mut self, pf: usize) -> Self {
        self.prefetch_factor = pf;
        self
    }

    pub fn build(self) -> Result<Self, DataLoaderError> {
        if self.batch_size == 0 {
            return Err(DataLoaderError::InvalidConfig(
                "batch_size must be positive".into(),
            ));
        }
        if self.num_workers > 0 && self.prefetch_factor == 0 {
            return Err(DataLoaderError::InvalidConfig(
                "prefetch_factor must be positive when workers are enabled".into(),
            ));
        }
        Ok(self)
    }

    /// Upper bound on batches submitted but not yet handed to the consumer.
    pub fn prefetch_window(&self) -> usize {
        self.prefetch_factor * self.num_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DataLoaderConfig::new(8, true).build().unwrap();
        assert!(!cfg.drop_last);
        assert_eq!(cfg.num_workers, 0);
        assert_eq!(cfg.prefetch_window(), 0);
    }

    #[test]
    fn rejects_zero_batch() {
        assert!(DataLoaderConfig::new(0, false).build().is_err());
    }

    #[test]
    fn rejects_zero_prefetch_with_workers() {
        let cfg = DataLoaderConfig::new(4, false).num_workers(2).prefetch_factor(0);
        assert!(cfg.build().is_err());
        let cfg = DataLoaderConfig::new(4, false).num_workers(3);
        assert_eq!(cfg.build().unwrap().prefetch_window(), 6);
    }

    #[test]
    fn all_cpus() {
        assert!(DataLoaderConfig::new(1, false).with_all_cpus().num_workers >= 1);
    }
}
