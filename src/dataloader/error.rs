use std::path::PathBuf;

use thiserror::Error;

/// Broad class of a [`DataLoaderError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The dataset or loader could not be built. Only raised by constructors.
    Construction,
    /// An index outside `[0, len)` was passed to `get`. Always a caller bug.
    OutOfRange,
    /// A single sample (and therefore its batch) could not be produced.
    Fetch,
}

#[derive(Error, Debug)]
pub enum DataLoaderError {
    // Construction
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Could not read dataset at {path}: {source}")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No samples found in {0}")]
    EmptyDataset(String),

    #[error("Invalid manifest at line {line}: {reason}")]
    InvalidManifest { line: usize, reason: String },

    #[error("Manifest references a missing file: {0}")]
    MissingFile(PathBuf),

    #[error("Could not probe image {path}: {source}")]
    ProbeFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid dataset split ratios. Train: {train}, Test: {test}")]
    InvalidSplitRatios { train: f32, test: f32 },

    #[error("Failed to spawn prefetch worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    // Caller bug
    #[error("Index {index} out of range for dataset of length {len}")]
    OutOfRange { index: usize, len: usize },

    // Fetch
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    #[error("Batch {batch_number} has no samples to collate")]
    EmptyBatch { batch_number: usize },

    #[error("Batch {batch_number} failed on sample {index}: {source}")]
    Fetch {
        batch_number: usize,
        index: usize,
        #[source]
        source: Box<DataLoaderError>,
    },

    #[error("Prefetch worker exited before delivering batch {batch_number}")]
    WorkerLost { batch_number: usize },
}

impl DataLoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataLoaderError::DirectoryNotFound(_)
            | DataLoaderError::DatasetUnreadable { .. }
            | DataLoaderError::EmptyDataset(_)
            | DataLoaderError::InvalidManifest { .. }
            | DataLoaderError::MissingFile(_)
            | DataLoaderError::ProbeFailed { .. }
            | DataLoaderError::InvalidConfig(_)
            | DataLoaderError::InvalidSplitRatios { .. }
            | DataLoaderError::WorkerSpawn(_) => ErrorKind::Construction,
            DataLoaderError::OutOfRange { .. } => ErrorKind::OutOfRange,
            DataLoaderError::Io(_)
            | DataLoaderError::Image(_)
            | DataLoaderError::Transform(_)
            | DataLoaderError::ShapeMismatch { .. }
            | DataLoaderError::EmptyBatch { .. }
            | DataLoaderError::Fetch { .. }
            | DataLoaderError::WorkerLost { .. } => ErrorKind::Fetch,
        }
    }

    /// The error of the sample itself, looking through a batch-level `Fetch` wrapper.
    pub fn root(&self) -> &DataLoaderError {
        match self {
            DataLoaderError::Fetch { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_batch(self, batch_number: usize, index: usize) -> Self {
        DataLoaderError::Fetch {
            batch_number,
            index,
            source: Box::new(self),
        }
    }
}
