//! Vantage-point tree search.
//!
//! Each node of a vantage-point tree (Yianilos, 1993) holds one data point
//! as its center. The remaining points of the node's partition are split by
//! their median distance to that center: the closer half forms the left
//! subtree, the rest the right. Searches traverse the tree and use the
//! triangle inequality against each node's radius to discard whole subtrees.
//!
//! Unlike KD-trees or ball trees there are no intermediate nodes; the data
//! points themselves sit at the nodes, which keeps the tree small and the
//! distance-calculation count low. The node linkage is an arena of indices
//! rather than a pointer graph, and the observation storage is permuted to
//! arena order after the build so that traversal reads memory sequentially.

use crate::error::{Result, VecinoError};
use crate::matrix::{copy_observations, ObservationSource};
use crate::metric::DistanceMetric;
use crate::queue::NeighborQueue;
use crate::report::{count_without_self, report_all_neighbors, AllNeighbors};
use crate::traits::{Builder, Prebuilt, Searcher};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::sync::Arc;

/// Arena sentinel for "no child". Slot 0 holds the root, which is never
/// referenced as a child, so 0 is free to mean "leaf" everywhere else.
const LEAF: usize = 0;

/// One node of the tree arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node<F> {
    /// Original index of the vantage point at this node.
    pub vantage: usize,
    /// Normalized median distance from the vantage point to its partition.
    pub radius: F,
    /// Arena slot of the within-radius subtree, or 0 for none.
    pub left: usize,
    /// Arena slot of the beyond-radius subtree, or 0 for none.
    pub right: usize,
}

/// Builder for a vantage-point tree index.
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
/// let prebuilt = VpTreeBuilder::new(EuclideanDistance).build(&data).unwrap();
/// let mut searcher = prebuilt.initialize();
///
/// let mut indices = Vec::new();
/// searcher.search(0, 2, Some(&mut indices), None).unwrap();
/// assert_eq!(indices, vec![1, 2]);
/// ```
pub struct VpTreeBuilder<F: Float> {
    metric: Arc<dyn DistanceMetric<F>>,
}

impl<F: Float> VpTreeBuilder<F> {
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

impl<F: Float + Send + Sync + 'static> Builder<F> for VpTreeBuilder<F> {
    fn build(&self, data: &dyn ObservationSource<F>) -> Result<Box<dyn Prebuilt<F>>> {
        let (num_dimensions, num_observations, store) = copy_observations(data)?;
        Ok(Box::new(VpTreePrebuilt::new(
            num_dimensions,
            num_observations,
            store,
            Arc::clone(&self.metric),
        )))
    }
}

/// Recursively builds the arena over `items[lower..upper]`, returning the
/// slot of the subtree root. Items carry `(distance-to-vantage, original
/// index)` pairs; distances are scratch state rewritten at every level.
fn build_arena<F: Float>(
    nodes: &mut Vec<Node<F>>,
    lower: usize,
    upper: usize,
    coords: &[F],
    num_dimensions: usize,
    metric: &dyn DistanceMetric<F>,
    items: &mut [(F, usize)],
    rng: &mut StdRng,
) -> usize {
    // Callers guarantee lower < upper.
    let position = nodes.len();
    nodes.push(Node {
        vantage: 0,
        radius: F::zero(),
        left: LEAF,
        right: LEAF,
    });

    let gap = upper - lower;
    if gap > 1 {
        // Pick an arbitrary point in range as the vantage point and move it
        // to the front of the interval. Statistical quality is irrelevant
        // here, but builds of the same data must stay reproducible.
        let pick = lower + rng.gen_range(0..gap);
        items.swap(lower, pick);
        let vantage = items[lower].1;
        nodes[position].vantage = vantage;
        let vantage_row = &coords[vantage * num_dimensions..(vantage + 1) * num_dimensions];

        for item in items[lower + 1..upper].iter_mut() {
            let row = &coords[item.1 * num_dimensions..(item.1 + 1) * num_dimensions];
            item.0 = metric.raw(vantage_row, row);
        }

        // Partition around the median distance with linear-time selection;
        // the smaller-or-equal half goes left.
        let median = lower + gap / 2;
        let lower_p1 = lower + 1;
        items[lower_p1..upper].select_nth_unstable_by(median - lower_p1, |a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        nodes[position].radius = metric.normalize(items[median].0);

        if lower_p1 < median {
            nodes[position].left =
                build_arena(nodes, lower_p1, median, coords, num_dimensions, metric, items, rng);
        }
        if median < upper {
            nodes[position].right =
                build_arena(nodes, median, upper, coords, num_dimensions, metric, items, rng);
        }
    } else {
        nodes[position].vantage = items[lower].1;
    }

    position
}

/// Prebuilt vantage-point tree.
pub struct VpTreePrebuilt<F: Float> {
    num_dimensions: usize,
    num_observations: usize,
    /// Observation data permuted to arena order: slot `n` of the arena owns
    /// the coordinates at `data[n * num_dimensions..]`.
    data: Vec<F>,
    nodes: Vec<Node<F>>,
    /// Maps an original observation id to its arena slot.
    new_locations: Vec<usize>,
    metric: Arc<dyn DistanceMetric<F>>,
}

impl<F: Float> VpTreePrebuilt<F> {
    fn new(
        num_dimensions: usize,
        num_observations: usize,
        mut data: Vec<F>,
        metric: Arc<dyn DistanceMetric<F>>,
    ) -> Self {
        let mut nodes = Vec::with_capacity(num_observations);
        let mut new_locations = vec![0; num_observations];

        if num_observations > 0 {
            let mut items: Vec<(F, usize)> =
                (0..num_observations).map(|i| (F::zero(), i)).collect();

            // Deterministically seeded so repeated builds of the same data
            // pick the same vantage points (and therefore the same ties),
            // while different shapes get a different stream.
            let seed = 1234567890u64
                .wrapping_mul(num_observations as u64)
                .wrapping_add(num_dimensions as u64);
            let mut rng = StdRng::seed_from_u64(seed);

            build_arena(
                &mut nodes,
                0,
                num_observations,
                &data,
                num_dimensions,
                metric.as_ref(),
                &mut items,
                &mut rng,
            );

            // Reorder the storage to match arena order for cache locality
            // during traversal.
            let mut reordered = vec![F::zero(); data.len()];
            for (slot, node) in nodes.iter().enumerate() {
                new_locations[node.vantage] = slot;
                reordered[slot * num_dimensions..(slot + 1) * num_dimensions].copy_from_slice(
                    &data[node.vantage * num_dimensions..(node.vantage + 1) * num_dimensions],
                );
            }
            data = reordered;
        }

        Self {
            num_dimensions,
            num_observations,
            data,
            nodes,
            new_locations,
            metric,
        }
    }

    fn storage_row(&self, slot: usize) -> &[F] {
        let start = slot * self.num_dimensions;
        &self.data[start..start + self.num_dimensions]
    }

    /// The tree arena, in slot order.
    ///
    /// Exposed so external serializers can capture the full index state.
    #[must_use]
    pub fn nodes(&self) -> &[Node<F>] {
        &self.nodes
    }

    /// Original observation id to arena slot mapping.
    #[must_use]
    pub fn new_locations(&self) -> &[usize] {
        &self.new_locations
    }

    /// The stored observation data, permuted to arena order.
    #[must_use]
    pub fn data(&self) -> &[F] {
        &self.data
    }

    fn search_nn(
        &self,
        slot: usize,
        target: &[F],
        max_dist: &mut F,
        nearest: &mut NeighborQueue<F>,
    ) {
        let dist = self
            .metric
            .normalize(self.metric.raw(self.storage_row(slot), target));
        let node = self.nodes[slot];

        if dist <= *max_dist {
            nearest.add(node.vantage, dist);
            if nearest.is_full() {
                // Tighten the bound to the farthest retained candidate.
                *max_dist = nearest.limit();
            }
        }

        if dist < node.radius {
            // Target inside the ball: the within-radius subtree is more
            // likely to shrink the bound, so visit it first.
            if node.left != LEAF && dist - *max_dist <= node.radius {
                self.search_nn(node.left, target, max_dist, nearest);
            }
            if node.right != LEAF && dist + *max_dist >= node.radius {
                self.search_nn(node.right, target, max_dist, nearest);
            }
        } else {
            if node.right != LEAF && dist + *max_dist >= node.radius {
                self.search_nn(node.right, target, max_dist, nearest);
            }
            if node.left != LEAF && dist - *max_dist <= node.radius {
                self.search_nn(node.left, target, max_dist, nearest);
            }
        }
    }

    /// Same traversal as `search_nn` but with a fixed threshold, for radius
    /// search.
    fn search_all(&self, slot: usize, target: &[F], threshold: F, sink: &mut AllNeighbors<'_, F>) {
        let dist = self
            .metric
            .normalize(self.metric.raw(self.storage_row(slot), target));
        let node = self.nodes[slot];

        if dist <= threshold {
            sink.push(dist, node.vantage);
        }

        if dist < node.radius {
            if node.left != LEAF && dist - threshold <= node.radius {
                self.search_all(node.left, target, threshold, sink);
            }
            if node.right != LEAF && dist + threshold >= node.radius {
                self.search_all(node.right, target, threshold, sink);
            }
        } else {
            if node.right != LEAF && dist + threshold >= node.radius {
                self.search_all(node.right, target, threshold, sink);
            }
            if node.left != LEAF && dist - threshold <= node.radius {
                self.search_all(node.left, target, threshold, sink);
            }
        }
    }
}

impl<F: Float + Send + Sync + 'static> Prebuilt<F> for VpTreePrebuilt<F> {
    fn num_observations(&self) -> usize {
        self.num_observations
    }

    fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    fn initialize(&self) -> Box<dyn Searcher<F> + '_> {
        Box::new(VpTreeSearcher {
            parent: self,
            nearest: NeighborQueue::new(1),
            matches: Vec::new(),
        })
    }
}

/// Searcher over a [`VpTreePrebuilt`].
pub struct VpTreeSearcher<'a, F: Float> {
    parent: &'a VpTreePrebuilt<F>,
    nearest: NeighborQueue<F>,
    matches: Vec<(F, usize)>,
}

impl<F: Float> VpTreeSearcher<'_, F> {
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

impl<F: Float> Searcher<F> for VpTreeSearcher<'_, F> {
    fn search(
        &mut self,
        i: usize,
        k: usize,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        self.check_index(i)?;
        self.nearest.reset(k + 1);
        let parent = self.parent;
        let target = parent.storage_row(parent.new_locations[i]);
        let mut max_dist = F::infinity();
        parent.search_nn(0, target, &mut max_dist, &mut self.nearest);
        self.nearest.report(output_indices, output_distances, Some(i));
        Ok(())
    }

    fn search_query(
        &mut self,
        query: &[F],
        k: usize,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
    ) -> Result<()> {
        self.check_query(query)?;
        // k = 0 would need a zero-capacity queue; an empty tree has no slot
        // 0 to start the recursion from. Both yield an empty result.
        if k == 0 || self.parent.nodes.is_empty() {
            if let Some(indices) = output_indices {
                indices.clear();
            }
            if let Some(distances) = output_distances {
                distances.clear();
            }
            return Ok(());
        }
        self.nearest.reset(k);
        let mut max_dist = F::infinity();
        self.parent
            .search_nn(0, query, &mut max_dist, &mut self.nearest);
        self.nearest.report(output_indices, output_distances, None);
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
        let target = parent.storage_row(parent.new_locations[i]);

        if output_indices.is_none() && output_distances.is_none() {
            let mut sink = AllNeighbors::Count(0);
            parent.search_all(0, target, radius, &mut sink);
            return Ok(count_without_self(sink.count()));
        }

        let mut matches = std::mem::take(&mut self.matches);
        matches.clear();
        let mut sink = AllNeighbors::Collect(&mut matches);
        parent.search_all(0, target, radius, &mut sink);
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
        if self.parent.nodes.is_empty() {
            if let Some(indices) = output_indices {
                indices.clear();
            }
            if let Some(distances) = output_distances {
                distances.clear();
            }
            return Ok(0);
        }

        if output_indices.is_none() && output_distances.is_none() {
            let mut sink = AllNeighbors::Count(0);
            self.parent.search_all(0, query, radius, &mut sink);
            return Ok(sink.count());
        }

        let mut matches = std::mem::take(&mut self.matches);
        matches.clear();
        let mut sink = AllNeighbors::Collect(&mut matches);
        self.parent.search_all(0, query, radius, &mut sink);
        report_all_neighbors(&mut matches, output_indices, output_distances, None);
        let count = matches.len();
        self.matches = matches;
        Ok(count)
    }
}
