use std::sync::Arc;

use super::dataset::{check_index, Dataset, Sample, SampleOf};
use super::error::DataLoaderError;

/// Applies a fallible transform to the features of every sample on `get`.
pub struct MapFeatures<D, F> {
    inner: D,
    transform: F,
}

impl<D, F, G> Dataset for MapFeatures<D, F>
where
    D: Dataset,
    F: Fn(D::Features) -> Result<G, DataLoaderError> + Send + Sync,
    G: Send,
{
    type Features = G;
    type Label = D::Label;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError> {
        let Sample { features, label } = self.inner.get(index)?;
        Ok(Sample::new((self.transform)(features)?, label))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Applies a fallible transform to the label of every sample on `get`.
pub struct MapLabels<D, F> {
    inner: D,
    transform: F,
}

impl<D, F, M> Dataset for MapLabels<D, F>
where
    D: Dataset,
    F: Fn(D::Label) -> Result<M, DataLoaderError> + Send + Sync,
    M: Send,
{
    type Features = D::Features;
    type Label = M;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError> {
        let Sample { features, label } = self.inner.get(index)?;
        Ok(Sample::new(features, (self.transform)(label)?))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

pub trait DatasetExt: Dataset + Sized {
    fn map_features<F, G>(self, transform: F) -> MapFeatures<Self, F>
    where
        F: Fn(Self::Features) -> Result<G, DataLoaderError> + Send + Sync,
    {
        MapFeatures {
            inner: self,
            transform,
        }
    }

    fn map_labels<F, M>(self, transform: F) -> MapLabels<Self, F>
    where
        F: Fn(Self::Label) -> Result<M, DataLoaderError> + Send + Sync,
    {
        MapLabels {
            inner: self,
            transform,
        }
    }
}

impl<D: Dataset> DatasetExt for D {}

/// A view onto selected positions of a shared dataset.
pub struct Subset<D> {
    inner: Arc<D>,
    indices: Vec<usize>,
}

impl<D: Dataset> Subset<D> {
    /// Fails with `OutOfRange` if any position is outside the parent dataset.
    pub fn new(inner: Arc<D>, indices: Vec<usize>) -> Result<Self, DataLoaderError> {
        let len = inner.len();
        for &idx in &indices {
            check_index(idx, len)?;
        }
        Ok(Subset { inner, indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<D: Dataset> Dataset for Subset<D> {
    type Features = D::Features;
    type Label = D::Label;

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Result<SampleOf<Self>, DataLoaderError> {
        check_index(index, self.indices.len())?;
        self.inner.get(self.indices[index])
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::in_memory::InMemoryDataset;

    fn squares(n: usize) -> InMemoryDataset<f32, usize> {
        InMemoryDataset::from_pairs((0..n).map(|i| ((i * i) as f32, i % 2)))
    }

    #[test]
    fn map_features_and_labels() {
        let ds = squares(4)
            .map_features(|x| Ok(x / 2.0))
            .map_labels(|l| Ok(l == 1));
        let s = ds.get(3).unwrap();
        assert_eq!(s.features, 4.5);
        assert!(s.label);
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn failing_transform_surfaces_as_fetch_error() {
        let ds = squares(3).map_features(|x| {
            if x > 1.0 {
                Err(DataLoaderError::Transform(format!("{x} too large")))
            } else {
                Ok(x)
            }
        });
        assert!(ds.get(1).is_ok());
        assert!(matches!(ds.get(2), Err(DataLoaderError::Transform(_))));
        assert!(matches!(ds.get(3), Err(DataLoaderError::OutOfRange { .. })));
    }

    #[test]
    fn subset_reindexes() {
        let parent = Arc::new(squares(5));
        let sub = Subset::new(parent.clone(), vec![4, 1]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get(0).unwrap().features, 16.0);
        assert_eq!(sub.get(1).unwrap().features, 1.0);
        assert!(matches!(
            sub.get(2),
            Err(DataLoaderError::OutOfRange { index: 2, len: 2 })
        ));
        assert!(Subset::new(parent, vec![5]).is_err());
    }
}
