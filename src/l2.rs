//! Cosine-distance search via L2 normalization.
//!
//! [`L2NormalizedBuilder`] wraps any inner builder and scales every
//! observation to unit L2 norm before the inner index sees it; queries are
//! scaled the same way. For unit vectors the squared Euclidean distance
//! equals `2 - 2 * cosine_similarity`, so Euclidean ranking on the
//! normalized data is exactly cosine ranking on the originals. Zero vectors
//! are passed through unchanged rather than dividing by zero.

use crate::error::Result;
use crate::matrix::{ObservationExtractor, ObservationSource};
use crate::traits::{Builder, Prebuilt, Searcher};
use num_traits::Float;

/// Writes a unit-norm copy of `vector` into `buffer`. A zero vector is
/// copied as-is.
fn normalize_into<F: Float>(vector: &[F], buffer: &mut Vec<F>) {
    buffer.clear();
    buffer.extend_from_slice(vector);
    let norm = buffer
        .iter()
        .fold(F::zero(), |sum, &v| sum + v * v)
        .sqrt();
    if norm > F::zero() {
        for v in buffer.iter_mut() {
            *v = *v / norm;
        }
    }
}

/// View over an observation source that normalizes each vector on the fly.
struct L2NormalizedSource<'a, F: Float> {
    inner: &'a dyn ObservationSource<F>,
}

impl<F: Float> ObservationSource<F> for L2NormalizedSource<'_, F> {
    fn num_observations(&self) -> usize {
        self.inner.num_observations()
    }

    fn num_dimensions(&self) -> usize {
        self.inner.num_dimensions()
    }

    fn extractor(&self) -> Box<dyn ObservationExtractor<F> + '_> {
        Box::new(L2NormalizedExtractor {
            inner: self.inner.extractor(),
            buffer: Vec::with_capacity(self.inner.num_dimensions()),
        })
    }
}

struct L2NormalizedExtractor<'a, F: Float> {
    inner: Box<dyn ObservationExtractor<F> + 'a>,
    buffer: Vec<F>,
}

impl<F: Float> ObservationExtractor<F> for L2NormalizedExtractor<'_, F> {
    fn next_observation(&mut self) -> &[F] {
        let raw = self.inner.next_observation();
        normalize_into(raw, &mut self.buffer);
        &self.buffer
    }
}

/// Builder decorator performing a cosine-distance-equivalent search.
///
/// The inner builder is assumed to use Euclidean distance; any other metric
/// yields a well-defined but less meaningful ranking.
///
/// # Examples
///
/// ```
/// use vecino::prelude::*;
///
/// // Observations 0 and 1 point the same direction at different scales.
/// let data = DenseMatrix::from_vec(2, 3, vec![
///     1.0, 0.0,
///     5.0, 0.0,
///     0.0, 1.0,
/// ]).unwrap();
///
/// let builder = L2NormalizedBuilder::new(BruteforceBuilder::new(EuclideanDistance));
/// let prebuilt = builder.build(&data).unwrap();
/// let mut searcher = prebuilt.initialize();
///
/// let mut distances = Vec::new();
/// searcher.search(0, 1, None, Some(&mut distances)).unwrap();
/// assert_eq!(distances, vec![0.0]); // same direction, zero cosine distance
/// ```
pub struct L2NormalizedBuilder<F: Float> {
    inner: Box<dyn Builder<F>>,
}

impl<F: Float> L2NormalizedBuilder<F> {
    /// Wraps an inner builder.
    pub fn new(inner: impl Builder<F> + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl<F: Float + Send + Sync + 'static> Builder<F> for L2NormalizedBuilder<F> {
    fn build(&self, data: &dyn ObservationSource<F>) -> Result<Box<dyn Prebuilt<F>>> {
        let normalized = L2NormalizedSource { inner: data };
        let prebuilt = self.inner.build(&normalized)?;
        Ok(Box::new(L2NormalizedPrebuilt { inner: prebuilt }))
    }
}

/// Prebuilt wrapper holding the inner index built over normalized data.
pub struct L2NormalizedPrebuilt<F: Float> {
    inner: Box<dyn Prebuilt<F>>,
}

impl<F: Float> Prebuilt<F> for L2NormalizedPrebuilt<F> {
    fn num_observations(&self) -> usize {
        self.inner.num_observations()
    }

    fn num_dimensions(&self) -> usize {
        self.inner.num_dimensions()
    }

    fn initialize(&self) -> Box<dyn Searcher<F> + '_> {
        Box::new(L2NormalizedSearcher {
            inner: self.inner.initialize(),
            buffer: Vec::with_capacity(self.inner.num_dimensions()),
        })
    }
}

/// Searcher wrapper that normalizes query vectors before delegating.
///
/// By-id searches delegate directly: the stored data is already normalized.
pub struct L2NormalizedSearcher<'a, F: Float> {
    inner: Box<dyn Searcher<F> + 'a>,
    buffer: Vec<F>,
}

impl<F: Float> Searcher<F> for L2NormalizedSearcher<'_, F> {
    fn search(
        &mut self,
        i: usize,
        k: usize,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        self.inner.search(i, k, output_indices, output_distances)
    }

    fn search_query(
        &mut self,
        query: &[F],
        k: usize,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        normalize_into(query, &mut self.buffer);
        self.inner
            .search_query(&self.buffer, k, output_indices, output_distances)
    }

    fn can_search_all(&self) -> bool {
        self.inner.can_search_all()
    }

    fn search_all(
        &mut self,
        i: usize,
        radius: F,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<usize> {
        self.inner
            .search_all(i, radius, output_indices, output_distances)
    }

    fn search_all_query(
        &mut self,
        query: &[F],
        radius: F,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<usize> {
        normalize_into(query, &mut self.buffer);
        self.inner
            .search_all_query(&self.buffer, radius, output_indices, output_distances)
    }
}
