//! Observation sources: the input matrix abstraction for index builders.
//!
//! A builder consumes observations through the [`ObservationSource`] trait,
//! which hands out a sequential [`ObservationExtractor`]. The concrete
//! [`DenseMatrix`] stores the data observation-contiguously so that each
//! coordinate vector is a single slice.

use crate::error::{Result, VecinoError};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Sequential access to the coordinate vectors of an observation source.
///
/// A fresh extractor yields the first observation on its first call, the
/// second on the next, and so on for exactly
/// [`ObservationSource::num_observations`] calls. The returned slice is only
/// valid until the next call.
pub trait ObservationExtractor<F: Float> {
    /// Returns the coordinates of the next observation.
    fn next_observation(&mut self) -> &[F];
}

/// A fixed set of dense observations in R^n.
///
/// Implementors expose the shape of the data and sequential extraction of
/// each observation's coordinates. Builders copy the extracted data into
/// their own storage, so a source only needs to survive the `build()` call.
pub trait ObservationSource<F: Float> {
    /// Number of observations.
    fn num_observations(&self) -> usize;

    /// Number of dimensions per observation.
    fn num_dimensions(&self) -> usize;

    /// Returns a new sequential-access extractor.
    fn extractor(&self) -> Box<dyn ObservationExtractor<F> + '_>;
}

/// An owned dense matrix of observations, observation-contiguous.
///
/// Conceptually a `num_dimensions x num_observations` column-major matrix:
/// the coordinates of each observation occupy one contiguous run of the
/// backing vector.
///
/// # Examples
///
/// ```
/// use vecino::matrix::DenseMatrix;
///
/// // Three observations in two dimensions.
/// let m = DenseMatrix::from_vec(2, 3, vec![
///     0.0, 0.0,
///     1.0, 0.0,
///     0.0, 1.0,
/// ]).unwrap();
/// assert_eq!(m.num_observations(), 3);
/// assert_eq!(m.observation(1), &[1.0, 0.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix<F> {
    data: Vec<F>,
    num_dimensions: usize,
    num_observations: usize,
}

impl<F: Float> DenseMatrix<F> {
    /// Creates a matrix from a flat vector of observation-contiguous data.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::NumericOverflow`] if `num_dimensions *
    /// num_observations` overflows, and [`VecinoError::Configuration`] if the
    /// data length does not match that product.
    pub fn from_vec(num_dimensions: usize, num_observations: usize, data: Vec<F>) -> Result<Self> {
        let expected = num_dimensions
            .checked_mul(num_observations)
            .ok_or_else(|| VecinoError::overflow("num_dimensions * num_observations"))?;
        if data.len() != expected {
            return Err(VecinoError::configuration(format!(
                "data length {} does not match num_dimensions * num_observations = {}",
                data.len(),
                expected
            )));
        }
        Ok(Self {
            data,
            num_dimensions,
            num_observations,
        })
    }

    /// Number of observations.
    ///
    /// Also available through [`ObservationSource`]; the inherent method
    /// spares callers the trait import.
    #[must_use]
    pub fn num_observations(&self) -> usize {
        self.num_observations
    }

    /// Number of dimensions per observation.
    #[must_use]
    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    /// Returns the coordinates of observation `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= num_observations`.
    #[must_use]
    pub fn observation(&self, i: usize) -> &[F] {
        let start = i * self.num_dimensions;
        &self.data[start..start + self.num_dimensions]
    }

    /// Returns the underlying data as a flat slice.
    #[must_use]
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }
}

impl<F: Float> ObservationSource<F> for DenseMatrix<F> {
    fn num_observations(&self) -> usize {
        self.num_observations
    }

    fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    fn extractor(&self) -> Box<dyn ObservationExtractor<F> + '_> {
        Box::new(DenseMatrixExtractor { matrix: self, at: 0 })
    }
}

struct DenseMatrixExtractor<'a, F> {
    matrix: &'a DenseMatrix<F>,
    at: usize,
}

impl<F: Float> ObservationExtractor<F> for DenseMatrixExtractor<'_, F> {
    fn next_observation(&mut self) -> &[F] {
        let current = self.at;
        self.at += 1;
        self.matrix.observation(current)
    }
}

/// Copies every observation out of a source into one contiguous vector.
///
/// Returns `(num_dimensions, num_observations, data)`. Shared by the index
/// builders, which all start by taking an owned, observation-contiguous copy
/// of the input.
pub(crate) fn copy_observations<F: Float>(
    source: &dyn ObservationSource<F>,
) -> Result<(usize, usize, Vec<F>)> {
    let num_dimensions = source.num_dimensions();
    let num_observations = source.num_observations();
    let total = num_dimensions
        .checked_mul(num_observations)
        .ok_or_else(|| VecinoError::overflow("num_dimensions * num_observations"))?;

    let mut data = Vec::with_capacity(total);
    let mut extractor = source.extractor();
    for _ in 0..num_observations {
        let observation = extractor.next_observation();
        if observation.len() != num_dimensions {
            return Err(VecinoError::dimension_mismatch(
                num_dimensions,
                observation.len(),
            ));
        }
        data.extend_from_slice(observation);
    }
    Ok((num_dimensions, num_observations, data))
}
