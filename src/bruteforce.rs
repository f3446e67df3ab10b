//! Brute-force nearest-neighbor search.
//!
//! Computes every pairwise distance between the query and the stored
//! observations. Quadratic and theoretically the worst method, but with zero
//! indexing overhead it can win when indexing adds no value (few points,
//! high dimensionality), and it doubles as the correctness oracle for the
//! tree- and cluster-based backends.

use crate::error::{Result, VecinoError};
use crate::matrix::{copy_observations, ObservationSource};
use crate::metric::DistanceMetric;
use crate::queue::NeighborQueue;
use crate::report::{count_without_self, report_all_neighbors, AllNeighbors};
use crate::traits::{Builder, Prebuilt, Searcher};
use num_traits::Float;
use std::sync::Arc;

/// Builder for a brute-force index under a pluggable metric.
///
/// # Examples
///
/// ```
/// use vecino::prelude::*;
///
/// let data = DenseMatrix::from_vec(1, 3, vec![0.0, 1.0, 10.0]).unwrap();
/// let prebuilt = BruteforceBuilder::new(EuclideanDistance).build(&data).unwrap();
/// let mut searcher = prebuilt.initialize();
///
/// let mut indices = Vec::new();
/// let mut distances: Vec<f64> = Vec::new();
/// searcher.search_query(&[0.4], 1, Some(&mut indices), Some(&mut distances)).unwrap();
/// assert_eq!(indices, vec![0]);
/// assert!((distances[0] - 0.4).abs() < 1e-12);
/// ```
pub struct BruteforceBuilder<F: Float> {
    metric: Arc<dyn DistanceMetric<F>>,
}

impl<F: Float> BruteforceBuilder<F> {
    /// Creates a builder using the given distance metric.
    pub fn new(metric: impl DistanceMetric<F> + 'static) -> Self {
        Self {
            metric: Arc::new(metric),
        }
    }

    /// Creates a builder from a shared metric instance.
    #[must_use]
    pub fn with_metric(metric: Arc<dyn DistanceMetric<F>>) -> Self {
        Self { metric }
    }
}

impl<F: Float + Send + Sync + 'static> Builder<F> for BruteforceBuilder<F> {
    fn build(&self, data: &dyn ObservationSource<F>) -> Result<Box<dyn Prebuilt<F>>> {
        let (num_dimensions, num_observations, store) = copy_observations(data)?;
        Ok(Box::new(BruteforcePrebuilt {
            num_dimensions,
            num_observations,
            data: store,
            metric: Arc::clone(&self.metric),
        }))
    }
}

/// Prebuilt brute-force index: the owned data copy and nothing else.
pub struct BruteforcePrebuilt<F: Float> {
    num_dimensions: usize,
    num_observations: usize,
    data: Vec<F>,
    metric: Arc<dyn DistanceMetric<F>>,
}

impl<F: Float> BruteforcePrebuilt<F> {
    fn observation(&self, storage_index: usize) -> &[F] {
        let start = storage_index * self.num_dimensions;
        &self.data[start..start + self.num_dimensions]
    }

    /// The stored observation data, observation-contiguous.
    ///
    /// Exposed so external serializers can capture the full index state.
    #[must_use]
    pub fn data(&self) -> &[F] {
        &self.data
    }
}

impl<F: Float + Send + Sync + 'static> Prebuilt<F> for BruteforcePrebuilt<F> {
    fn num_observations(&self) -> usize {
        self.num_observations
    }

    fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    fn initialize(&self) -> Box<dyn Searcher<F> + '_> {
        Box::new(BruteforceSearcher {
            parent: self,
            nearest: NeighborQueue::new(1),
            matches: Vec::new(),
        })
    }
}

/// Searcher over a [`BruteforcePrebuilt`].
pub struct BruteforceSearcher<'a, F: Float> {
    parent: &'a BruteforcePrebuilt<F>,
    nearest: NeighborQueue<F>,
    matches: Vec<(F, usize)>,
}

impl<F: Float> BruteforceSearcher<'_, F> {
    fn scan(&mut self, target: &[F]) {
        for x in 0..self.parent.num_observations {
            let raw = self.parent.metric.raw(target, self.parent.observation(x));
            self.nearest.add(x, raw);
        }
    }

    fn scan_all(&mut self, target: &[F], radius: F, sink: &mut AllNeighbors<'_, F>) {
        let threshold_raw = self.parent.metric.denormalize(radius);
        for x in 0..self.parent.num_observations {
            let raw = self.parent.metric.raw(target, self.parent.observation(x));
            if raw <= threshold_raw {
                sink.push(self.parent.metric.normalize(raw), x);
            }
        }
    }

    fn normalize_output(&self, output_distances: Option<&mut Vec<F>>) {
        if let Some(distances) = output_distances {
            for d in distances.iter_mut() {
                *d = self.parent.metric.normalize(*d);
            }
        }
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.parent.num_observations {
            return Err(VecinoError::index_out_of_bounds(
                i,
                self.parent.num_observations,
            ));
        }
        Ok(())
    }

    fn check_query(&self, query: &[F]) -> Result<()> {
        if query.len() != self.parent.num_dimensions {
            return Err(VecinoError::dimension_mismatch(
                self.parent.num_dimensions,
                query.len(),
            ));
        }
        Ok(())
    }
}

impl<F: Float> Searcher<F> for BruteforceSearcher<'_, F> {
    fn search(
        &mut self,
        i: usize,
        k: usize,
        mut output_indices: Option<&mut Vec<usize>>,
        mut output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        self.check_index(i)?;
        // Capacity k + 1: the observation finds itself during the scan and
        // is removed again at report time.
        self.nearest.reset(k + 1);
        let parent = self.parent;
        let target = parent.observation(i);
        self.scan(target);
        self.nearest.report(
            output_indices.as_mut().map(|v| &mut **v),
            output_distances.as_mut().map(|v| &mut **v),
            Some(i),
        );
        self.normalize_output(output_distances);
        Ok(())
    }

    fn search_query(
        &mut self,
        query: &[F],
        k: usize,
        mut output_indices: Option<&mut Vec<usize>>,
        mut output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        self.check_query(query)?;
        if k == 0 || self.parent.num_observations == 0 {
            if let Some(indices) = output_indices {
                indices.clear();
            }
            if let Some(distances) = output_distances {
                distances.clear();
            }
            return Ok(());
        }
        self.nearest.reset(k);
        self.scan(query);
        self.nearest.report(
            output_indices.as_mut().map(|v| &mut **v),
            output_distances.as_mut().map(|v| &mut **v),
            None,
        );
        self.normalize_output(output_distances);
        Ok(())
    }

    fn can_search_all(&self) -> bool {
        true
    }

    fn search_all(
        &mut self,
        i: usize,
        radius: F,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<usize> {
        self.check_index(i)?;
        let parent = self.parent;
        let target = parent.observation(i);

        if output_indices.is_none() && output_distances.is_none() {
            let mut sink = AllNeighbors::Count(0);
            self.scan_all(target, radius, &mut sink);
            return Ok(count_without_self(sink.count()));
        }

        let mut matches = std::mem::take(&mut self.matches);
        matches.clear();
        let mut sink = AllNeighbors::Collect(&mut matches);
        self.scan_all(target, radius, &mut sink);
        report_all_neighbors(&mut matches, output_indices, output_distances, Some(i));
        let count = count_without_self(matches.len());
        self.matches = matches;
        Ok(count)
    }

    fn search_all_query(
        &mut self,
        query: &[F],
        radius: F,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<usize> {
        self.check_query(query)?;

        if output_indices.is_none() && output_distances.is_none() {
            let mut sink = AllNeighbors::Count(0);
            self.scan_all(query, radius, &mut sink);
            return Ok(sink.count());
        }

        let mut matches = std::mem::take(&mut self.matches);
        matches.clear();
        let mut sink = AllNeighbors::Collect(&mut matches);
        self.scan_all(query, radius, &mut sink);
        report_all_neighbors(&mut matches, output_indices, output_distances, None);
        let count = matches.len();
        self.matches = matches;
        Ok(count)
    }
}
