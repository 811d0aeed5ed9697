//! Batched iteration over indexable datasets.
//!
//! A [`Dataset`] is anything with a fixed length and index-addressed samples.
//! A [`DataLoader`] walks one in batches, reshuffling with a caller-supplied
//! random source at every epoch, and can prefetch upcoming batches on a worker
//! pool while still delivering them in order.
//!
//! ```no_run
//! use batchloader::{DataLoader, DataLoaderConfig, ImageDirConfig, ImageManifestDataset};
//!
//! # fn main() -> Result<(), batchloader::DataLoaderError> {
//! let dataset = ImageManifestDataset::from_class_dirs("data/train", ImageDirConfig::default())?;
//! let config = DataLoaderConfig::new(64, true).num_workers(4);
//! let mut loader = DataLoader::seeded(dataset, config, 42)?;
//!
//! for _ in 0..3 {
//!     for batch in loader.epoch() {
//!         let images = batch?.into_image_batch()?;
//!         println!("batch {}: {} images", images.batch_number, images.samples_in_batch);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod dataloader;
pub mod thread_pool;

pub use dataloader::batch::{Batch, BatchOf, BatchResult};
pub use dataloader::combinators::{DatasetExt, MapFeatures, MapLabels, Subset};
pub use dataloader::config::DataLoaderConfig;
pub use dataloader::dataset::{check_index, Dataset, Sample, SampleOf};
pub use dataloader::error::{DataLoaderError, ErrorKind};
pub use dataloader::image_data::{ImageBatch, ImageData, ImageShape, SourceFormat};
pub use dataloader::in_memory::InMemoryDataset;
pub use dataloader::info::LoaderSummary;
pub use dataloader::loader::{DataLoader, Epoch, LoaderState};
pub use dataloader::manifest::{
    Column, CsvManifestConfig, ImageDirConfig, ImageManifestDataset, ManifestLabel,
};
pub use dataloader::split::{random_split, DatasetSplit, DatasetSplits, SplitRatios};
