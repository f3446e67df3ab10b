//! Output formatting shared by the radius-search implementations.

use num_traits::Float;

/// Accumulator for radius-search matches.
///
/// Counting and collecting share one traversal; callers that only want the
/// neighbor count avoid materializing the match list.
pub(crate) enum AllNeighbors<'a, F> {
    Count(usize),
    Collect(&'a mut Vec<(F, usize)>),
}

impl<F: Float> AllNeighbors<'_, F> {
    pub(crate) fn push(&mut self, distance: F, index: usize) {
        match self {
            AllNeighbors::Count(n) => *n += 1,
            AllNeighbors::Collect(matches) => matches.push((distance, index)),
        }
    }

    pub(crate) fn count(&self) -> usize {
        match self {
            AllNeighbors::Count(n) => *n,
            AllNeighbors::Collect(matches) => matches.len(),
        }
    }
}

/// Neighbor count after removing the query observation from its own matches.
///
/// Guards the pathological case where an observation fails to be detected as
/// its own neighbor (e.g. a negative radius), so the count never underflows.
pub(crate) fn count_without_self(count: usize) -> usize {
    count.saturating_sub(1)
}

/// Sorts matches by ascending distance (ties by index) and writes them to
/// the output buffers, dropping the entry for `self_index` if present.
pub(crate) fn report_all_neighbors<F: Float>(
    matches: &mut Vec<(F, usize)>,
    output_indices: Option<&mut Vec<usize>>,
    output_distances: Option<&mut Vec<F>>,
    self_index: Option<usize>,
) {
    matches.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let keep = |&(_, index): &(F, usize)| self_index != Some(index);
    if let Some(indices) = output_indices {
        indices.clear();
        indices.extend(matches.iter().filter(|m| keep(m)).map(|m| m.1));
    }
    if let Some(distances) = output_distances {
        distances.clear();
        distances.extend(matches.iter().filter(|m| keep(m)).map(|m| m.0));
    }
}
