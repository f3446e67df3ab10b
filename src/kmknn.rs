//! K-means for k-nearest neighbors (KMKNN) search.
//!
//! KMKNN (Wang, 2012) first clusters the observations with k-means, using
//! roughly the square root of the observation count as the number of centers.
//! Each observation's distance to its assigned center is precomputed and the
//! storage is permuted so that every cluster is a contiguous block sorted by
//! that distance. A query then walks the clusters in order of center
//! proximity and uses the triangle inequality against the precomputed
//! distances to skip entire clusters, or the closer prefix of a cluster,
//! that cannot contain a better neighbor.
//!
//! The approach carries little overhead beyond the data itself, which makes
//! it competitive with tree-based methods in higher dimensions where most
//! points must be inspected anyway.

use crate::cluster::{Clusterer, KMeans};
use crate::error::{Result, VecinoError};
use crate::matrix::{copy_observations, ObservationSource};
use crate::metric::DistanceMetric;
use crate::queue::NeighborQueue;
use crate::report::{count_without_self, report_all_neighbors, AllNeighbors};
use crate::traits::{Builder, Prebuilt, Searcher};
use num_traits::Float;
use std::cmp::Ordering;
use std::sync::Arc;

/// Builder for a KMKNN index.
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
///     8.0, 8.0,
/// ]).unwrap();
/// let prebuilt = KmknnBuilder::new(EuclideanDistance).build(&data).unwrap();
/// let mut searcher = prebuilt.initialize();
///
/// let mut indices = Vec::new();
/// searcher.search(0, 2, Some(&mut indices), None).unwrap();
/// assert_eq!(indices, vec![1, 2]);
/// ```
pub struct KmknnBuilder<F: Float> {
    power: f64,
    metric: Arc<dyn DistanceMetric<F>>,
    clusterer: Arc<dyn Clusterer<F>>,
}

impl<F: Float> KmknnBuilder<F> {
    /// Creates a builder using the given metric, the square-root rule for
    /// the center count, and [`KMeans`] for clustering.
    pub fn new(metric: impl DistanceMetric<F> + 'static) -> Self {
        Self {
            power: 0.5,
            metric: Arc::new(metric),
            clusterer: Arc::new(KMeans::new()),
        }
    }

    /// Creates a builder from a shared metric instance.
    #[must_use]
    pub fn with_metric(metric: Arc<dyn DistanceMetric<F>>) -> Self {
        Self {
            power: 0.5,
            metric,
            clusterer: Arc::new(KMeans::new()),
        }
    }

    /// Sets the exponent applied to the observation count to derive the
    /// number of cluster centers. Larger values mean more, smaller clusters.
    #[must_use]
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Replaces the clustering implementation.
    #[must_use]
    pub fn with_clusterer(mut self, clusterer: Arc<dyn Clusterer<F>>) -> Self {
        self.clusterer = clusterer;
        self
    }
}

impl<F: Float + Send + Sync + 'static> Builder<F> for KmknnBuilder<F> {
    fn build(&self, data: &dyn ObservationSource<F>) -> Result<Box<dyn Prebuilt<F>>> {
        let (num_dimensions, num_observations, store) = copy_observations(data)?;
        Ok(Box::new(KmknnPrebuilt::new(
            num_dimensions,
            num_observations,
            store,
            Arc::clone(&self.metric),
            self.clusterer.as_ref(),
            self.power,
        )?))
    }
}

/// Prebuilt KMKNN index.
pub struct KmknnPrebuilt<F: Float> {
    num_dimensions: usize,
    num_observations: usize,
    /// Observation data permuted so each cluster is contiguous and sorted by
    /// distance to its center.
    data: Vec<F>,
    /// Cluster centers, cluster-contiguous. Empty clusters are compacted
    /// away at build time.
    centers: Vec<F>,
    sizes: Vec<usize>,
    offsets: Vec<usize>,
    /// Storage position to original observation id.
    observation_id: Vec<usize>,
    /// Original observation id to storage position.
    new_location: Vec<usize>,
    /// Normalized distance from each stored observation to its own center,
    /// in storage order.
    dist_to_centroid: Vec<F>,
    metric: Arc<dyn DistanceMetric<F>>,
}

impl<F: Float> KmknnPrebuilt<F> {
    fn new(
        num_dimensions: usize,
        num_observations: usize,
        data: Vec<F>,
        metric: Arc<dyn DistanceMetric<F>>,
        clusterer: &dyn Clusterer<F>,
        power: f64,
    ) -> Result<Self> {
        if num_observations == 0 {
            return Ok(Self {
                num_dimensions,
                num_observations,
                data,
                centers: Vec::new(),
                sizes: Vec::new(),
                offsets: Vec::new(),
                observation_id: Vec::new(),
                new_location: Vec::new(),
                dist_to_centroid: Vec::new(),
                metric,
            });
        }

        let num_centers = ((num_observations as f64).powf(power).ceil() as usize)
            .clamp(1, num_observations);
        num_centers
            .checked_mul(num_dimensions)
            .ok_or_else(|| VecinoError::overflow("num_centers * num_dimensions"))?;

        let clustering =
            clusterer.cluster(&data, num_dimensions, num_observations, num_centers)?;

        // Duplicate points can collapse clusters to nothing; compact the
        // survivors into a contiguous id range and remap assignments.
        let requested = clustering.num_clusters();
        let mut centers = Vec::with_capacity(clustering.centers.len());
        let mut sizes = Vec::with_capacity(requested);
        let mut remap = vec![0; requested];
        for (c, &size) in clustering.sizes.iter().enumerate() {
            if size > 0 {
                remap[c] = sizes.len();
                sizes.push(size);
                centers.extend_from_slice(
                    &clustering.centers[c * num_dimensions..(c + 1) * num_dimensions],
                );
            }
        }
        let num_centers = sizes.len();

        let mut offsets = vec![0; num_centers];
        for c in 1..num_centers {
            offsets[c] = offsets[c - 1] + sizes[c - 1];
        }

        // Slot each observation into its cluster's range, then sort every
        // range by distance to the cluster center.
        let mut by_distance: Vec<(F, usize)> = vec![(F::zero(), 0); num_observations];
        let mut cursor = offsets.clone();
        for o in 0..num_observations {
            let c = remap[clustering.assignments[o]];
            let center = &centers[c * num_dimensions..(c + 1) * num_dimensions];
            let observation = &data[o * num_dimensions..(o + 1) * num_dimensions];
            by_distance[cursor[c]] = (metric.normalize(metric.raw(observation, center)), o);
            cursor[c] += 1;
        }
        for c in 0..num_centers {
            by_distance[offsets[c]..offsets[c] + sizes[c]].sort_unstable_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.1.cmp(&b.1))
            });
        }

        // Permute the storage to match, recording the position mappings in
        // both directions.
        let mut reordered = vec![F::zero(); data.len()];
        let mut observation_id = vec![0; num_observations];
        let mut new_location = vec![0; num_observations];
        let mut dist_to_centroid = vec![F::zero(); num_observations];
        for (position, &(dist, original)) in by_distance.iter().enumerate() {
            observation_id[position] = original;
            new_location[original] = position;
            dist_to_centroid[position] = dist;
            reordered[position * num_dimensions..(position + 1) * num_dimensions]
                .copy_from_slice(&data[original * num_dimensions..(original + 1) * num_dimensions]);
        }

        Ok(Self {
            num_dimensions,
            num_observations,
            data: reordered,
            centers,
            sizes,
            offsets,
            observation_id,
            new_location,
            dist_to_centroid,
            metric,
        })
    }

    fn storage_row(&self, position: usize) -> &[F] {
        let start = position * self.num_dimensions;
        &self.data[start..start + self.num_dimensions]
    }

    fn center_row(&self, c: usize) -> &[F] {
        let start = c * self.num_dimensions;
        &self.centers[start..start + self.num_dimensions]
    }

    /// Cluster centers, cluster-contiguous.
    #[must_use]
    pub fn centers(&self) -> &[F] {
        &self.centers
    }

    /// Per-cluster observation counts. Always positive.
    #[must_use]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Per-cluster start positions in the permuted storage.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Storage position to original observation id mapping.
    #[must_use]
    pub fn observation_ids(&self) -> &[usize] {
        &self.observation_id
    }

    /// Original observation id to storage position mapping.
    #[must_use]
    pub fn new_locations(&self) -> &[usize] {
        &self.new_location
    }

    /// Normalized distance of each stored observation to its own center, in
    /// storage order.
    #[must_use]
    pub fn distances_to_centroid(&self) -> &[F] {
        &self.dist_to_centroid
    }

    /// The stored observation data, permuted to cluster order.
    #[must_use]
    pub fn data(&self) -> &[F] {
        &self.data
    }

    /// Clusters in ascending order of raw distance from the target, so the
    /// pruning bound tightens as early as possible.
    fn order_centers(&self, target: &[F]) -> Vec<(F, usize)> {
        let mut order: Vec<(F, usize)> = (0..self.sizes.len())
            .map(|c| (self.metric.raw(target, self.center_row(c)), c))
            .collect();
        order.sort_unstable_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        order
    }

    /// Core k-NN traversal. The queue accumulates **raw** distances keyed by
    /// **storage** positions; callers translate both on report.
    fn search_nn(&self, target: &[F], nearest: &mut NeighborQueue<F>) {
        let mut threshold_raw: Option<F> = None;
        for &(center_raw, center) in &self.order_centers(target) {
            let dist2center = self.metric.normalize(center_raw);
            let size = self.sizes[center];
            let offset = self.offsets[center];
            let dist_to_centroid = &self.dist_to_centroid[offset..offset + size];
            let maxdist = dist_to_centroid[size - 1];

            let mut first = 0;
            if let Some(raw) = threshold_raw {
                let threshold = self.metric.normalize(raw);

                // Triangle inequality: even the farthest member of this
                // cluster cannot beat the current bound.
                let lower_bd = dist2center - threshold;
                if maxdist < lower_bd {
                    continue;
                }

                // Members closer to the center than lower_bd cannot beat the
                // bound either; start the scan past them.
                first = dist_to_centroid.partition_point(|&d| d < lower_bd);
            }

            for member in first..size {
                let position = offset + member;
                let dist_raw = self.metric.raw(target, self.storage_row(position));
                nearest.add(position, dist_raw);
                if nearest.is_full() {
                    threshold_raw = Some(nearest.limit());
                }
            }
        }
    }

    /// Radius traversal: same cluster ordering and pruning, with a fixed
    /// threshold. Matches are pushed as (normalized distance, original id).
    fn search_all(&self, target: &[F], radius: F, sink: &mut AllNeighbors<'_, F>) {
        let threshold_raw = self.metric.denormalize(radius);
        for &(center_raw, center) in &self.order_centers(target) {
            let dist2center = self.metric.normalize(center_raw);
            let size = self.sizes[center];
            let offset = self.offsets[center];
            let dist_to_centroid = &self.dist_to_centroid[offset..offset + size];
            let maxdist = dist_to_centroid[size - 1];

            let lower_bd = dist2center - radius;
            if maxdist < lower_bd {
                continue;
            }
            let first = dist_to_centroid.partition_point(|&d| d < lower_bd);

            for member in first..size {
                let position = offset + member;
                let dist_raw = self.metric.raw(target, self.storage_row(position));
                if dist_raw <= threshold_raw {
                    sink.push(
                        self.metric.normalize(dist_raw),
                        self.observation_id[position],
                    );
                }
            }
        }
    }
}

impl<F: Float + Send + Sync + 'static> Prebuilt<F> for KmknnPrebuilt<F> {
    fn num_observations(&self) -> usize {
        self.num_observations
    }

    fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    fn initialize(&self) -> Box<dyn Searcher<F> + '_> {
        Box::new(KmknnSearcher {
            parent: self,
            nearest: NeighborQueue::new(1),
            matches: Vec::new(),
        })
    }
}

/// Searcher over a [`KmknnPrebuilt`].
pub struct KmknnSearcher<'a, F: Float> {
    parent: &'a KmknnPrebuilt<F>,
    nearest: NeighborQueue<F>,
    matches: Vec<(F, usize)>,
}

impl<F: Float> KmknnSearcher<'_, F> {
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

    /// Rewrites reported storage positions to original ids and raw distances
    /// to normalized distances.
    fn translate_output(
        &self,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) {
        if let Some(indices) = output_indices {
            for index in indices.iter_mut() {
                *index = self.parent.observation_id[*index];
            }
        }
        if let Some(distances) = output_distances {
            for distance in distances.iter_mut() {
                *distance = self.parent.metric.normalize(*distance);
            }
        }
    }
}

impl<F: Float> Searcher<F> for KmknnSearcher<'_, F> {
    fn search(
        &mut self,
        i: usize,
        k: usize,
        mut output_indices: Option<&mut Vec<usize>>,
        mut output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        self.check_index(i)?;
        self.nearest.reset(k + 1);
        let parent = self.parent;
        let position = parent.new_location[i];
        let target = parent.storage_row(position);
        parent.search_nn(target, &mut self.nearest);
        self.nearest.report(
            output_indices.as_mut().map(|v| &mut **v),
            output_distances.as_mut().map(|v| &mut **v),
            Some(position),
        );
        self.translate_output(output_indices, output_distances);
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
        self.parent.search_nn(query, &mut self.nearest);
        self.nearest.report(
            output_indices.as_mut().map(|v| &mut **v),
            output_distances.as_mut().map(|v| &mut **v),
            None,
        );
        self.translate_output(output_indices, output_distances);
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
        let target = parent.storage_row(parent.new_location[i]);

        if output_indices.is_none() && output_distances.is_none() {
            let mut sink = AllNeighbors::Count(0);
            parent.search_all(target, radius, &mut sink);
            return Ok(count_without_self(sink.count()));
        }

        let mut matches = std::mem::take(&mut self.matches);
        matches.clear();
        let mut sink = AllNeighbors::Collect(&mut matches);
        parent.search_all(target, radius, &mut sink);
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
            self.parent.search_all(query, radius, &mut sink);
            return Ok(sink.count());
        }

        let mut matches = std::mem::take(&mut self.matches);
        matches.clear();
        let mut sink = AllNeighbors::Collect(&mut matches);
        self.parent.search_all(query, radius, &mut sink);
        report_all_neighbors(&mut matches, output_indices, output_distances, None);
        let count = matches.len();
        self.matches = matches;
        Ok(count)
    }
}
