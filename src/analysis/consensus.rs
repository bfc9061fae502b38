use crate::error::DfaError;
use std::collections::HashMap;
use std::hash::Hash;

/// Occurrence counter for the candidate values of one key segment.
#[derive(Clone, Debug)]
pub struct CandidateSet<K> {
    counts: HashMap<K, u64>,
}

impl<K> Default for CandidateSet<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> CandidateSet<K> {
    pub fn add(&mut self, candidate: K) {
        *self.counts.entry(candidate).or_insert(0) += 1;
    }

    pub fn count(&self, candidate: &K) -> u64 {
        self.counts.get(candidate).copied().unwrap_or(0)
    }

    /// Number of distinct candidates
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Adds the counters of `other` to this set.
    pub fn merge(&mut self, other: CandidateSet<K>) {
        for (candidate, count) in other.counts {
            *self.counts.entry(candidate).or_insert(0) += count;
        }
    }

    /// The candidate with the highest count.
    ///
    /// Equal counts go to the smallest candidate, so the answer does not
    /// depend on insertion order or on how the batch was split over threads.
    pub fn most_common(&self) -> Option<(K, u64)> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(candidate, count)| (*candidate, *count))
    }
}

/// One `CandidateSet` per key segment, accumulated over a whole fault batch.
#[derive(Clone, Debug)]
pub struct ConsensusAggregator<K> {
    sets: Vec<CandidateSet<K>>,
}

impl<K: Copy + Eq + Hash + Ord> ConsensusAggregator<K> {
    pub fn new(segments: usize) -> Self {
        Self {
            sets: (0..segments).map(|_| CandidateSet::default()).collect(),
        }
    }

    pub fn add(&mut self, segment: usize, candidate: K) {
        self.sets[segment].add(candidate);
    }

    pub fn segment(&self, segment: usize) -> &CandidateSet<K> {
        &self.sets[segment]
    }

    /// Merges another aggregator segment by segment (counter addition).
    pub fn merge(&mut self, other: ConsensusAggregator<K>) {
        for (set, other_set) in self.sets.iter_mut().zip(other.sets) {
            set.merge(other_set);
        }
    }

    /// Winning candidate and its vote count for every segment.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<(K, u64)>)` - One winner per segment, in segment order.
    /// * `Err(DfaError::InsufficientFaults)` - A segment never received a candidate.
    pub fn most_common(&self) -> Result<Vec<(K, u64)>, DfaError> {
        self.sets
            .iter()
            .enumerate()
            .map(|(segment, set)| {
                set.most_common()
                    .ok_or(DfaError::InsufficientFaults { segment })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_frequent_candidate_wins() {
        let mut set = CandidateSet::default();
        for candidate in [7u8, 3, 7, 9, 7, 3] {
            set.add(candidate);
        }
        assert_eq!(set.most_common(), Some((7, 3)));
        assert_eq!(set.count(&3), 2);
        assert_eq!(set.count(&42), 0);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn ties_go_to_the_smallest_candidate() {
        let mut forward = CandidateSet::default();
        let mut backward = CandidateSet::default();
        for candidate in [[5u8, 0, 0, 0], [1, 2, 3, 4], [9, 9, 9, 9]] {
            forward.add(candidate);
        }
        for candidate in [[9u8, 9, 9, 9], [1, 2, 3, 4], [5, 0, 0, 0]] {
            backward.add(candidate);
        }
        assert_eq!(forward.most_common(), Some(([1, 2, 3, 4], 1)));
        assert_eq!(backward.most_common(), forward.most_common());
    }

    #[test]
    fn merge_adds_counters() {
        let mut left = ConsensusAggregator::new(2);
        left.add(0, 1u8);
        left.add(1, 5u8);
        let mut right = ConsensusAggregator::new(2);
        right.add(0, 1u8);
        right.add(0, 2u8);
        left.merge(right);
        assert_eq!(left.segment(0).count(&1), 2);
        assert_eq!(left.segment(0).count(&2), 1);
        assert_eq!(left.most_common().unwrap(), vec![(1, 2), (5, 1)]);
    }

    #[test]
    fn empty_segment_is_insufficient() {
        let mut aggregator = ConsensusAggregator::new(3);
        aggregator.add(0, 1u8);
        aggregator.add(2, 1u8);
        assert!(matches!(
            aggregator.most_common(),
            Err(DfaError::InsufficientFaults { segment: 1 })
        ));
    }
}
