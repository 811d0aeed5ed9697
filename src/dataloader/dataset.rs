use std::sync::Arc;

use super::error::DataLoaderError;

/// One (features, label) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample<F, L> {
    pub features: F,
    pub label: L,
}

impl<F, L> Sample<F, L> {
    pub fn new(features: F, label: L) -> Self {
        Sample { features, label }
    }

    pub fn map_features<G>(self, f: impl FnOnce(F) -> G) -> Sample<G, L> {
        Sample {
            features: f(self.features),
            label: self.label,
        }
    }

    pub fn map_label<M>(self, f: impl FnOnce(L) -> M) -> Sample<F, M> {
        Sample {
            features: self.features,
            label: f(self.label),
        }
    }

    pub fn into_pair(self) -> (F, L) {
        (self.features, self.label)
    }
}

impl<F, L> From<(F, L)> for Sample<F, L> {
    fn from((features, label): (F, L)) -> Self {
        Sample { features, label }
    }
}

pub type SampleOf<D> = Sample<<D as Dataset>::Features, <D as Dataset>::Label>;

/// An indexed collection of samples.
///
/// `len` is fixed once the dataset is constructed. `get` must not mutate the
/// dataset; it may do I/O. Implementations are shared with prefetch workers,
/// hence `Send + Sync`.
pub trait Dataset: Send + Sync {
    type Features: Send;
    type Label: Send;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index`. Fails with [`DataLoaderError::OutOfRange`] when
    /// `index >= len()`.
    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError>;

    fn name(&self) -> &str {
        "dataset"
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    type Features = D::Features;
    type Label = D::Label;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError> {
        (**self).get(index)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub fn check_index(index: usize, len: usize) -> Result<(), DataLoaderError> {
    if index >= len {
        return Err(DataLoaderError::OutOfRange { index, len });
    }
    Ok(())
}
