//! Distance metrics with cheap raw proxies.
//!
//! Search backends compare and prune on *raw* distances, a monotonic proxy
//! for the true metric distance (e.g. the squared Euclidean distance), and
//! only pay for the final transform when reporting. `normalize()` converts a
//! raw distance to the true distance; `denormalize()` inverts it, e.g. to
//! move a user-supplied search radius into raw space.

use num_traits::Float;

/// A pluggable distance metric.
///
/// Implementations must guarantee that `raw` is strictly monotonic in the
/// true distance, so comparisons on raw values preserve the true ordering,
/// and that `normalize(raw(x, y))` equals the true distance between `x` and
/// `y`. `denormalize` must invert `normalize` over the raw value's range.
pub trait DistanceMetric<F: Float>: Send + Sync {
    /// Raw (pruning-friendly) distance between two coordinate vectors.
    ///
    /// Both slices must have the same length.
    fn raw(&self, x: &[F], y: &[F]) -> F;

    /// Converts a raw distance to the true metric distance.
    fn normalize(&self, raw: F) -> F;

    /// Converts a true metric distance back to a raw distance.
    fn denormalize(&self, norm: F) -> F;
}

/// Euclidean distance, with the squared distance as the raw proxy.
///
/// # Examples
///
/// ```
/// use vecino::metric::{DistanceMetric, EuclideanDistance};
///
/// let metric = EuclideanDistance;
/// let raw = metric.raw(&[0.0, 0.0], &[3.0, 4.0]);
/// assert_eq!(raw, 25.0);
/// assert_eq!(metric.normalize(raw), 5.0);
/// assert_eq!(metric.denormalize(5.0), 25.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

impl<F: Float> DistanceMetric<F> for EuclideanDistance {
    #[inline]
    fn raw(&self, x: &[F], y: &[F]) -> F {
        debug_assert_eq!(x.len(), y.len());
        let mut total = F::zero();
        for (&a, &b) in x.iter().zip(y.iter()) {
            let delta = a - b;
            total = total + delta * delta;
        }
        total
    }

    #[inline]
    fn normalize(&self, raw: F) -> F {
        raw.sqrt()
    }

    #[inline]
    fn denormalize(&self, norm: F) -> F {
        norm * norm
    }
}

/// Manhattan (L1) distance; the raw value is already the true distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManhattanDistance;

impl<F: Float> DistanceMetric<F> for ManhattanDistance {
    #[inline]
    fn raw(&self, x: &[F], y: &[F]) -> F {
        debug_assert_eq!(x.len(), y.len());
        let mut total = F::zero();
        for (&a, &b) in x.iter().zip(y.iter()) {
            total = total + (a - b).abs();
        }
        total
    }

    #[inline]
    fn normalize(&self, raw: F) -> F {
        raw
    }

    #[inline]
    fn denormalize(&self, norm: F) -> F {
        norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_raw_is_squared() {
        let metric = EuclideanDistance;
        let raw: f64 = metric.raw(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]);
        assert!((raw - 3.0).abs() < 1e-12);
        assert!((metric.normalize(raw) - 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_euclidean_round_trip() {
        let metric = EuclideanDistance;
        for d in [0.0_f64, 0.5, 1.0, 7.25] {
            let raw = metric.denormalize(d);
            assert!((metric.normalize(raw) - d).abs() < 1e-12);
        }
    }

    #[test]
    fn test_manhattan_identity_transforms() {
        let metric = ManhattanDistance;
        let raw: f64 = metric.raw(&[0.0, 0.0], &[1.5, -2.5]);
        assert!((raw - 4.0).abs() < 1e-12);
        assert_eq!(metric.normalize(raw), raw);
        assert_eq!(metric.denormalize(raw), raw);
    }

    #[test]
    fn test_zero_distance() {
        let e = EuclideanDistance;
        let m = ManhattanDistance;
        let v = [1.0_f32, -2.0, 3.0];
        assert_eq!(DistanceMetric::<f32>::raw(&e, &v, &v), 0.0);
        assert_eq!(DistanceMetric::<f32>::raw(&m, &v, &v), 0.0);
    }

    #[test]
    fn test_raw_ordering_agrees_with_normalized() {
        let metric = EuclideanDistance;
        let query = [0.0_f64, 0.0];
        let near = [1.0, 1.0];
        let far = [3.0, 3.0];
        let raw_near: f64 = metric.raw(&query, &near);
        let raw_far: f64 = metric.raw(&query, &far);
        assert!(raw_near < raw_far);
        assert!(metric.normalize(raw_near) < metric.normalize(raw_far));
    }
}
