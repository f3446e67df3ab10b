//! Core traits for the build-once, search-many lifecycle.
//!
//! A [`Builder`] consumes an observation source and produces a [`Prebuilt`]
//! index that owns a copy of the data plus any derived structures. The
//! prebuilt is immutable and may be shared across threads; each thread
//! obtains its own [`Searcher`], a mutable scratch object that borrows the
//! prebuilt for its lifetime.

use crate::error::{Result, VecinoError};
use crate::matrix::ObservationSource;
use num_traits::Float;

/// Constructs a prebuilt search index from an observation source.
///
/// # Examples
///
/// ```
/// use vecino::prelude::*;
///
/// let data = DenseMatrix::from_vec(2, 4, vec![
///     0.0, 0.0,
///     1.0, 0.0,
///     0.0, 1.0,
///     5.0, 5.0,
/// ]).unwrap();
///
/// let builder = BruteforceBuilder::new(EuclideanDistance);
/// let prebuilt = builder.build(&data).unwrap();
/// let mut searcher = prebuilt.initialize();
///
/// let mut indices = Vec::new();
/// searcher.search(0, 2, Some(&mut indices), None).unwrap();
/// assert_eq!(indices, vec![1, 2]);
/// ```
pub trait Builder<F: Float> {
    /// Builds an index over the supplied observations.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::Configuration`] if the source yields
    /// observations of inconsistent dimension, and
    /// [`VecinoError::NumericOverflow`] if the storage size computation
    /// overflows.
    fn build(&self, data: &dyn ObservationSource<F>) -> Result<Box<dyn Prebuilt<F>>>;
}

/// An immutable, fully-built search index.
///
/// Owns its copy of the observation data and all derived structures. Safe to
/// read concurrently; queries go through per-thread [`Searcher`] instances
/// created by [`Prebuilt::initialize`].
pub trait Prebuilt<F: Float>: Send + Sync {
    /// Number of indexed observations.
    fn num_observations(&self) -> usize;

    /// Number of dimensions per observation.
    fn num_dimensions(&self) -> usize;

    /// Creates a searcher borrowing this prebuilt.
    ///
    /// The searcher cannot outlive the prebuilt; create one searcher per
    /// thread to query concurrently.
    fn initialize(&self) -> Box<dyn Searcher<F> + '_>;
}

/// Transient query state for a single thread.
///
/// Holds mutable scratch (the bounded candidate queue, coordinate buffers)
/// and is **not** thread-safe; confine each searcher to one thread or query
/// at a time.
///
/// Output buffers are caller-selectable: pass `None` for either to skip that
/// half of the computation. Reported results are always unique, sorted by
/// ascending distance, and (for by-index queries) exclude the query
/// observation itself.
pub trait Searcher<F: Float> {
    /// Finds the `k` nearest neighbors of observation `i`.
    ///
    /// Reports `min(k, num_observations - 1)` neighbors, excluding `i`
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::Configuration`] if `i` is out of range.
    fn search(
        &mut self,
        i: usize,
        k: usize,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<()>;

    /// Finds the `k` nearest neighbors of an arbitrary query vector.
    ///
    /// Reports `min(k, num_observations)` neighbors; `k == 0` yields an
    /// empty result.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::Configuration`] if the query length does not
    /// match the index dimension.
    fn search_query(
        &mut self,
        query: &[F],
        k: usize,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<()>;

    /// Whether this backend implements radius search.
    fn can_search_all(&self) -> bool {
        false
    }

    /// Finds all neighbors of observation `i` within `radius`, excluding `i`
    /// itself. Returns the neighbor count; with both outputs `None` only the
    /// count is computed.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::UnsupportedOperation`] when
    /// [`Searcher::can_search_all`] is false, or
    /// [`VecinoError::Configuration`] if `i` is out of range.
    fn search_all(
        &mut self,
        i: usize,
        radius: F,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<usize> {
        let _ = (i, radius, output_indices, output_distances);
        Err(VecinoError::unsupported("search_all"))
    }

    /// Finds all neighbors of a query vector within `radius`. Returns the
    /// neighbor count; with both outputs `None` only the count is computed.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::UnsupportedOperation`] when
    /// [`Searcher::can_search_all`] is false, or
    /// [`VecinoError::Configuration`] on a query length mismatch.
    fn search_all_query(
        &mut self,
        query: &[F],
        radius: F,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<usize> {
        let _ = (query, radius, output_indices, output_distances);
        Err(VecinoError::unsupported("search_all"))
    }
}
