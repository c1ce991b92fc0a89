//! One-dimensional gap clustering.
//!
//! Used for column bands (left edges of blocks on a page) and for table
//! column bands (left edges of blocks inside a candidate region). Every gap
//! that clears an absolute minimum starts out as a boundary; boundaries that
//! do not dominate the spread of the groups on either side are then removed,
//! narrowest first, until every remaining gap stands out.

use super::Ambiguity;

/// A group of nearby values.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Smallest member value
    pub min: f32,
    /// Largest member value
    pub max: f32,
    /// Indices of the members in the input slice, in ascending value order
    pub members: Vec<usize>,
}

impl Cluster {
    /// Distance between the extreme members.
    pub fn spread(&self) -> f32 {
        self.max - self.min
    }
}

/// Parameters of a clustering run.
#[derive(Debug, Clone, Copy)]
pub struct GapClustering {
    /// A gap narrower than this never separates two clusters
    pub min_gap: f32,
    /// A separating gap must be at least this multiple of the larger neighbour's spread
    pub separation_ratio: f32,
    /// Maximum number of boundary removals before giving up
    pub iteration_cap: usize,
}

impl GapClustering {
    /// Cluster `values`, returning clusters in ascending order.
    ///
    /// Fails with [`Ambiguity::IterationCap`] when more than `iteration_cap`
    /// boundary removals would be needed; callers fall back to a single group.
    pub fn cluster(&self, values: &[f32]) -> Result<Vec<Cluster>, Ambiguity> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
        let sorted: Vec<f32> = order.iter().map(|&i| values[i]).collect();

        // A boundary at `i` separates sorted[i - 1] from sorted[i].
        let mut boundaries: Vec<usize> = (1..sorted.len())
            .filter(|&i| sorted[i] - sorted[i - 1] >= self.min_gap)
            .collect();
        let mut iterations = 0usize;

        while let Some(pos) = self.weakest_boundary(&sorted, &boundaries) {
            iterations += 1;
            if iterations > self.iteration_cap {
                return Err(Ambiguity::IterationCap {
                    cap: self.iteration_cap,
                });
            }
            boundaries.remove(pos);
        }

        let mut clusters = Vec::with_capacity(boundaries.len() + 1);
        let mut start = 0;
        for end in boundaries.into_iter().chain(std::iter::once(sorted.len())) {
            clusters.push(Cluster {
                min: sorted[start],
                max: sorted[end - 1],
                members: order[start..end].to_vec(),
            });
            start = end;
        }
        Ok(clusters)
    }

    /// Position (in `boundaries`) of the narrowest boundary that fails the
    /// separation test, if any.
    fn weakest_boundary(&self, sorted: &[f32], boundaries: &[usize]) -> Option<usize> {
        let mut weakest: Option<(f32, usize)> = None;
        for (pos, &at) in boundaries.iter().enumerate() {
            let start = if pos == 0 { 0 } else { boundaries[pos - 1] };
            let end = boundaries.get(pos + 1).copied().unwrap_or(sorted.len());
            let gap = sorted[at] - sorted[at - 1];
            let left_spread = sorted[at - 1] - sorted[start];
            let right_spread = sorted[end - 1] - sorted[at];
            if gap >= self.separation_ratio * left_spread.max(right_spread) {
                continue;
            }
            if weakest.map_or(true, |(w, _)| gap < w) {
                weakest = Some((gap, pos));
            }
        }
        weakest.map(|(_, pos)| pos)
    }
}
