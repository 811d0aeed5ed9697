use std::fmt;

use super::config::DataLoaderConfig;

/// Batch arithmetic of one loader, printable as a short report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderSummary {
    pub dataset_name: String,
    pub total_size: usize,
    pub batch_size: usize,
    pub batches_per_epoch: usize,
    /// Size of the final batch of a pass; 0 when there are no batches.
    pub last_batch_size: usize,
    /// Samples never returned because of `drop_last`.
    pub dropped_per_epoch: usize,
    pub shuffle: bool,
    pub num_workers: usize,
}

impl LoaderSummary {
    pub fn new(dataset_name: &str, total_size: usize, config: &DataLoaderConfig) -> Self {
        let batch_size = config.batch_size;
        let remainder = total_size % batch_size;
        let full_batches = total_size / batch_size;

        let (batches_per_epoch, last_batch_size, dropped_per_epoch) = if config.drop_last {
            let last = if full_batches > 0 { batch_size } else { 0 };
            (full_batches, last, remainder)
        } else if remainder == 0 {
            let last = if full_batches > 0 { batch_size } else { 0 };
            (full_batches, last, 0)
        } else {
            (full_batches + 1, remainder, 0)
        };

        LoaderSummary {
            dataset_name: dataset_name.to_string(),
            total_size,
            batch_size,
            batches_per_epoch,
            last_batch_size,
            dropped_per_epoch,
            shuffle: config.shuffle,
            num_workers: config.num_workers,
        }
    }
}

impl fmt::Display for LoaderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset Information:")?;
        writeln!(f, "-------------------")?;
        writeln!(f, "Name: {}", self.dataset_name)?;
        writeln!(f, "Total size: {}", self.total_size)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "  Batches: {}", self.batches_per_epoch)?;
        writeln!(f, "  Last batch size: {}", self.last_batch_size)?;
        writeln!(f, "  Dropped per epoch: {}", self.dropped_per_epoch)?;
        writeln!(f, "Shuffle: {}", self.shuffle)?;
        write!(f, "Workers: {}", self.num_workers)
    }
}
