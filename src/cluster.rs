//! Clustering of the observation set, used to partition data for
//! cluster-pruned search.
//!
//! The [`Clusterer`] trait decouples the partitioning strategy from the index
//! that consumes it; [`KMeans`] is the stock implementation.

use crate::error::{Result, VecinoError};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Result of clustering `num_observations` points into clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering<F> {
    /// Cluster centers, cluster-contiguous (`num_clusters * num_dimensions`).
    pub centers: Vec<F>,
    /// Cluster assignment for each observation.
    pub assignments: Vec<usize>,
    /// Number of observations in each cluster. May contain zeros.
    pub sizes: Vec<usize>,
    /// Number of refinement iterations actually performed.
    pub iterations: usize,
}

impl<F> Clustering<F> {
    /// Number of clusters, including any that ended up empty.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.sizes.len()
    }
}

/// Partitions a flat observation-contiguous data block into clusters.
pub trait Clusterer<F: Float>: Send + Sync {
    /// Clusters `num_observations` points of `num_dimensions` coordinates
    /// each into at most `num_clusters` groups.
    ///
    /// # Errors
    ///
    /// Returns [`VecinoError::Configuration`] if `num_clusters` is zero while
    /// observations are present.
    fn cluster(
        &self,
        data: &[F],
        num_dimensions: usize,
        num_observations: usize,
        num_clusters: usize,
    ) -> Result<Clustering<F>>;
}

/// Lloyd's algorithm with k-means++ seeding.
///
/// Initialization and refinement are fully deterministic for a fixed random
/// state, so clustering the same data twice yields the same partition.
///
/// # Examples
///
/// ```
/// use vecino::cluster::{Clusterer, KMeans};
///
/// // Two well-separated groups on a line.
/// let data = vec![0.0_f64, 0.1, 0.2, 10.0, 10.1, 10.2];
/// let clustering = KMeans::new().cluster(&data, 1, 6, 2).unwrap();
/// assert_eq!(clustering.num_clusters(), 2);
/// assert_eq!(clustering.assignments[0], clustering.assignments[1]);
/// assert_ne!(clustering.assignments[0], clustering.assignments[5]);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans {
    max_iter: usize,
    tol: f64,
    random_state: u64,
}

impl KMeans {
    /// Creates a clusterer with default settings (100 iterations, tolerance
    /// 1e-4, random state 42).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-4,
            random_state: 42,
        }
    }

    /// Sets the maximum number of refinement iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the center-movement convergence tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the seed for center initialization.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new()
    }
}

fn squared_distance<F: Float>(x: &[F], y: &[F]) -> F {
    let mut sum = F::zero();
    for (&a, &b) in x.iter().zip(y.iter()) {
        let delta = a - b;
        sum = sum + delta * delta;
    }
    sum
}

fn row<F>(data: &[F], num_dimensions: usize, i: usize) -> &[F] {
    &data[i * num_dimensions..(i + 1) * num_dimensions]
}

/// k-means++ seeding: the first center is uniform, each further center is
/// drawn proportionally to squared distance from the nearest chosen center.
fn plusplus_init<F: Float>(
    data: &[F],
    num_dimensions: usize,
    num_observations: usize,
    num_clusters: usize,
    rng: &mut StdRng,
) -> Vec<F> {
    let mut centers = Vec::with_capacity(num_clusters * num_dimensions);
    let first = rng.gen_range(0..num_observations);
    centers.extend_from_slice(row(data, num_dimensions, first));

    let mut best = vec![F::infinity(); num_observations];
    for _ in 1..num_clusters {
        let newest = &centers[centers.len() - num_dimensions..];
        let mut total = F::zero();
        for (i, slot) in best.iter_mut().enumerate() {
            let dist = squared_distance(row(data, num_dimensions, i), newest);
            if dist < *slot {
                *slot = dist;
            }
            total = total + *slot;
        }

        let next = if total > F::zero() {
            // Inverse-CDF draw over the squared-distance weights.
            let draw = F::from(rng.gen::<f64>()).unwrap_or_else(F::zero) * total;
            let mut cumulative = F::zero();
            let mut chosen = num_observations - 1;
            for (i, &weight) in best.iter().enumerate() {
                cumulative = cumulative + weight;
                if cumulative >= draw {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // All points coincide with a center already; any pick is as
            // good as another.
            rng.gen_range(0..num_observations)
        };
        centers.extend_from_slice(row(data, num_dimensions, next));
    }
    centers
}

fn nearest_center<F: Float>(point: &[F], centers: &[F], num_dimensions: usize) -> usize {
    let num_clusters = centers.len() / num_dimensions;
    let mut best = 0;
    let mut best_dist = F::infinity();
    for c in 0..num_clusters {
        let dist = squared_distance(point, row(centers, num_dimensions, c));
        if dist
            .partial_cmp(&best_dist)
            .unwrap_or(Ordering::Equal)
            == Ordering::Less
        {
            best = c;
            best_dist = dist;
        }
    }
    best
}

impl<F: Float> Clusterer<F> for KMeans {
    fn cluster(
        &self,
        data: &[F],
        num_dimensions: usize,
        num_observations: usize,
        num_clusters: usize,
    ) -> Result<Clustering<F>> {
        if num_observations == 0 {
            return Ok(Clustering {
                centers: Vec::new(),
                assignments: Vec::new(),
                sizes: Vec::new(),
                iterations: 0,
            });
        }
        if num_clusters == 0 {
            return Err(VecinoError::configuration(
                "number of clusters must be positive",
            ));
        }
        let num_clusters = num_clusters.min(num_observations);

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut centers =
            plusplus_init(data, num_dimensions, num_observations, num_clusters, &mut rng);
        let mut assignments = vec![0; num_observations];
        let mut sizes = vec![0; num_clusters];
        let tol = F::from(self.tol).unwrap_or_else(F::zero);

        let mut iterations = 0;
        for _ in 0..self.max_iter {
            iterations += 1;

            for (i, assignment) in assignments.iter_mut().enumerate() {
                *assignment = nearest_center(row(data, num_dimensions, i), &centers, num_dimensions);
            }

            // Recompute each center as the mean of its members; empty
            // clusters keep their previous center.
            let mut next = vec![F::zero(); centers.len()];
            sizes.iter_mut().for_each(|s| *s = 0);
            for (i, &assignment) in assignments.iter().enumerate() {
                sizes[assignment] += 1;
                let point = row(data, num_dimensions, i);
                let slot = &mut next[assignment * num_dimensions..(assignment + 1) * num_dimensions];
                for (accum, &coord) in slot.iter_mut().zip(point.iter()) {
                    *accum = *accum + coord;
                }
            }
            for (c, &size) in sizes.iter().enumerate() {
                let slot = &mut next[c * num_dimensions..(c + 1) * num_dimensions];
                if size > 0 {
                    let divisor = F::from(size).unwrap_or_else(F::one);
                    for coord in slot.iter_mut() {
                        *coord = *coord / divisor;
                    }
                } else {
                    slot.copy_from_slice(row(&centers, num_dimensions, c));
                }
            }

            let shift = squared_distance(&centers, &next);
            centers = next;
            if shift <= tol * tol {
                break;
            }
        }

        // Final assignment against the converged centers.
        sizes.iter_mut().for_each(|s| *s = 0);
        for (i, assignment) in assignments.iter_mut().enumerate() {
            *assignment = nearest_center(row(data, num_dimensions, i), &centers, num_dimensions);
            sizes[*assignment] += 1;
        }

        Ok(Clustering {
            centers,
            assignments,
            sizes,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<f64> {
        vec![
            0.0, 0.0, //
            0.2, 0.1, //
            0.1, 0.3, //
            9.0, 9.0, //
            9.2, 8.9, //
            8.8, 9.1, //
        ]
    }

    #[test]
    fn test_separates_two_blobs() {
        let data = two_blobs();
        let clustering = KMeans::new().cluster(&data, 2, 6, 2).expect("clustering succeeds");
        assert_eq!(clustering.assignments.len(), 6);
        assert_eq!(clustering.sizes.iter().sum::<usize>(), 6);

        let first = clustering.assignments[0];
        let second = clustering.assignments[3];
        assert_ne!(first, second);
        assert!(clustering.assignments[..3].iter().all(|&a| a == first));
        assert!(clustering.assignments[3..].iter().all(|&a| a == second));
        assert_eq!(clustering.sizes[first], 3);
        assert_eq!(clustering.sizes[second], 3);
    }

    #[test]
    fn test_centers_are_means() {
        let data = two_blobs();
        let clustering = KMeans::new().cluster(&data, 2, 6, 2).expect("clustering succeeds");
        let first = clustering.assignments[0];
        let center = &clustering.centers[first * 2..(first + 1) * 2];
        assert!((center[0] - 0.1).abs() < 1e-9);
        assert!((center[1] - (0.4 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic_for_fixed_state() {
        let data = two_blobs();
        let a = KMeans::new().cluster(&data, 2, 6, 2).expect("clustering succeeds");
        let b = KMeans::new().cluster(&data, 2, 6, 2).expect("clustering succeeds");
        assert_eq!(a, b);
    }

    #[test]
    fn test_clamps_cluster_count() {
        let data = vec![0.0_f64, 1.0, 2.0];
        let clustering = KMeans::new().cluster(&data, 1, 3, 10).expect("clustering succeeds");
        assert!(clustering.num_clusters() <= 3);
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let data = vec![0.0_f64, 1.0];
        let result = <KMeans as Clusterer<f64>>::cluster(&KMeans::new(), &data, 1, 2, 0);
        assert!(matches!(result, Err(VecinoError::Configuration { .. })));
    }

    #[test]
    fn test_empty_data() {
        let clustering = <KMeans as Clusterer<f64>>::cluster(&KMeans::new(), &[], 3, 0, 4)
            .expect("empty data is valid");
        assert!(clustering.centers.is_empty());
        assert!(clustering.assignments.is_empty());
        assert_eq!(clustering.iterations, 0);
    }

    #[test]
    fn test_identical_points() {
        let data = vec![5.0_f64; 8];
        let clustering = KMeans::new().cluster(&data, 2, 4, 2).expect("clustering succeeds");
        assert_eq!(clustering.assignments.len(), 4);
        assert_eq!(clustering.sizes.iter().sum::<usize>(), 4);
    }
}
