//! Bounded top-k queue for nearest-neighbor candidates.
//!
//! [`NeighborQueue`] retains the `k` smallest-distance candidates seen so far
//! in a stream. It is the workhorse behind every `search()` implementation:
//! backends offer every surviving candidate to the queue and read the final
//! worst retained distance back out to tighten their pruning bounds.

use num_traits::Float;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A single (distance, index) candidate.
///
/// Ordered lexicographically by distance then index, so the heap's top is
/// always the farthest retained candidate, with the largest index breaking
/// exact distance ties deterministically.
#[derive(Debug, Clone, Copy)]
struct Candidate<F> {
    distance: F,
    index: usize,
}

impl<F: Float> PartialEq for Candidate<F> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<F: Float> Eq for Candidate<F> {}

impl<F: Float> PartialOrd for Candidate<F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<F: Float> Ord for Candidate<F> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Distances are never NaN for the metrics used here.
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Fixed-capacity max-structure retaining the k nearest candidates.
///
/// While not full, every offered candidate is retained. Once full, a new
/// candidate replaces the current worst **only if its distance is strictly
/// smaller**; an already-admitted candidate is never evicted by a later
/// equal-distance arrival. The final candidate set therefore depends on scan
/// order for exact ties, but is deterministic for a fixed scan order.
///
/// When searching for neighbors of an observation that is itself part of the
/// dataset, reset the queue to `k + 1` and pass the observation's index to
/// [`NeighborQueue::report`] so it can be excluded from its own neighbor
/// list.
///
/// # Examples
///
/// ```
/// use vecino::queue::NeighborQueue;
///
/// let mut queue = NeighborQueue::new(2);
/// queue.add(7, 0.5);
/// queue.add(3, 0.1);
/// queue.add(9, 0.3); // evicts (7, 0.5)
///
/// let mut indices = Vec::new();
/// let mut distances = Vec::new();
/// queue.report(Some(&mut indices), Some(&mut distances), None);
/// assert_eq!(indices, vec![3, 9]);
/// assert_eq!(distances, vec![0.1_f64, 0.3]);
/// ```
#[derive(Debug, Clone)]
pub struct NeighborQueue<F: Float> {
    nearest: BinaryHeap<Candidate<F>>,
    capacity: usize,
    full: bool,
}

impl<F: Float> NeighborQueue<F> {
    /// Creates a queue retaining up to `capacity` candidates.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Callers that want no neighbors should
    /// skip the search altogether rather than building an empty queue.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            nearest: BinaryHeap::with_capacity(capacity),
            capacity,
            full: false,
        }
    }

    /// Clears the queue and sets a new capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn reset(&mut self, capacity: usize) {
        assert!(capacity > 0, "queue capacity must be positive");
        self.nearest.clear();
        self.capacity = capacity;
        self.full = false;
    }

    /// Whether the queue holds `capacity` candidates.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Number of retained candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nearest.len()
    }

    /// Whether the queue holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nearest.is_empty()
    }

    /// Distance of the current worst retained candidate.
    ///
    /// Only meaningful when [`NeighborQueue::is_full`] returns true; search
    /// backends use this as their pruning bound.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty.
    #[must_use]
    pub fn limit(&self) -> F {
        self.nearest
            .peek()
            .expect("limit() requires a non-empty queue")
            .distance
    }

    /// Offers a candidate to the queue.
    ///
    /// Retained unconditionally while the queue is filling; once full, the
    /// worst candidate is replaced only if `distance` is strictly smaller
    /// than the current worst distance.
    pub fn add(&mut self, index: usize, distance: F) {
        if self.full {
            // Strict improvement only: equal-distance arrivals never evict.
            let worst = self.limit();
            if distance < worst {
                self.nearest.pop();
                self.nearest.push(Candidate { distance, index });
            }
        } else {
            self.nearest.push(Candidate { distance, index });
            if self.nearest.len() == self.capacity {
                self.full = true;
            }
        }
    }

    /// Drains the queue into the output buffers, sorted by ascending
    /// distance (ties by ascending index).
    ///
    /// If `self_index` is supplied, its entry is removed from the output; if
    /// it is not present (duplicate points pushed it out of a full queue),
    /// the single farthest candidate is dropped instead, so the output always
    /// shrinks by exactly one entry. Either output may be `None` to skip that
    /// half of the report.
    ///
    /// The queue is empty afterwards.
    pub fn report(
        &mut self,
        output_indices: Option<&mut Vec<usize>>,
        output_distances: Option<&mut Vec<F>>,
        self_index: Option<usize>,
    ) {
        // Draining the max-heap yields descending order; reverse for ascending.
        let mut drained = Vec::with_capacity(self.nearest.len());
        while let Some(candidate) = self.nearest.pop() {
            drained.push(candidate);
        }
        drained.reverse();
        self.full = false;

        if let Some(self_id) = self_index {
            match drained.iter().position(|c| c.index == self_id) {
                Some(at) => {
                    drained.remove(at);
                }
                None => {
                    // Too many duplicates pushed the observation out of its
                    // own neighbor list; dropping the farthest candidate
                    // keeps the reported count consistent.
                    drained.pop();
                }
            }
        }

        if let Some(indices) = output_indices {
            indices.clear();
            indices.extend(drained.iter().map(|c| c.index));
        }
        if let Some(distances) = output_distances {
            distances.clear();
            distances.extend(drained.iter().map(|c| c.distance));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_pairs(queue: &mut NeighborQueue<f64>, self_index: Option<usize>) -> Vec<(usize, f64)> {
        let mut indices = Vec::new();
        let mut distances = Vec::new();
        queue.report(Some(&mut indices), Some(&mut distances), self_index);
        indices.into_iter().zip(distances).collect()
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _ = NeighborQueue::<f64>::new(0);
    }

    #[test]
    fn test_retains_while_filling() {
        let mut queue = NeighborQueue::new(3);
        queue.add(0, 5.0);
        queue.add(1, 4.0);
        assert!(!queue.is_full());
        queue.add(2, 6.0);
        assert!(queue.is_full());
        assert_eq!(queue.limit(), 6.0);
    }

    #[test]
    fn test_eviction_on_strict_improvement() {
        let mut queue = NeighborQueue::new(2);
        queue.add(0, 2.0);
        queue.add(1, 3.0);
        queue.add(2, 1.0);
        assert_eq!(report_pairs(&mut queue, None), vec![(2, 1.0), (0, 2.0)]);
    }

    #[test]
    fn test_tie_stability() {
        // An equal-distance arrival never evicts an admitted candidate.
        let mut queue = NeighborQueue::new(2);
        queue.add(5, 1.0);
        queue.add(6, 1.0);
        queue.add(0, 1.0);
        assert_eq!(report_pairs(&mut queue, None), vec![(5, 1.0), (6, 1.0)]);
    }

    #[test]
    fn test_report_sorted_ascending() {
        let mut queue = NeighborQueue::new(4);
        queue.add(3, 0.3);
        queue.add(1, 0.1);
        queue.add(4, 0.4);
        queue.add(2, 0.2);
        let pairs = report_pairs(&mut queue, None);
        assert_eq!(pairs, vec![(1, 0.1), (2, 0.2), (3, 0.3), (4, 0.4)]);
    }

    #[test]
    fn test_self_exclusion() {
        let mut queue = NeighborQueue::new(3);
        queue.add(0, 0.0);
        queue.add(1, 1.0);
        queue.add(2, 2.0);
        assert_eq!(report_pairs(&mut queue, Some(0)), vec![(1, 1.0), (2, 2.0)]);
    }

    #[test]
    fn test_self_missing_drops_worst() {
        // Duplicates may displace the observation from its own neighbor
        // list; the farthest candidate goes instead.
        let mut queue = NeighborQueue::new(3);
        queue.add(1, 0.0);
        queue.add(2, 0.0);
        queue.add(3, 1.0);
        assert_eq!(report_pairs(&mut queue, Some(7)), vec![(1, 0.0), (2, 0.0)]);
    }

    #[test]
    fn test_report_indices_only() {
        let mut queue = NeighborQueue::new(2);
        queue.add(1, 0.5);
        queue.add(0, 0.25);
        let mut indices = Vec::new();
        queue.report(Some(&mut indices), None, None);
        assert_eq!(indices, vec![0, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut queue = NeighborQueue::new(1);
        queue.add(0, 1.0);
        assert!(queue.is_full());
        queue.reset(2);
        assert!(!queue.is_full());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_distance_ties_report_by_index() {
        let mut queue = NeighborQueue::new(3);
        queue.add(9, 1.0);
        queue.add(4, 1.0);
        queue.add(7, 1.0);
        let pairs = report_pairs(&mut queue, None);
        assert_eq!(pairs, vec![(4, 1.0), (7, 1.0), (9, 1.0)]);
    }
}
