//! Sensitivity analysis
//!
//! Turns per-layer SQNR values into the two orderings the search consumes:
//! - `weight_rank`: layers by descending weight SQNR, most tolerant first
//! - `act_groups`: activation layers in ascending SQNR, split into
//!   [`ACTIVATION_GROUPS`] contiguous buckets (or singletons when there are
//!   no more layers than buckets)

use crate::stats::ResolvedStatistics;
use serde::{Deserialize, Serialize};

/// Number of activation buckets for grouped refinement
pub const ACTIVATION_GROUPS: usize = 4;

/// Layer orderings derived from SQNR statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityRanking {
    /// Layer indices by descending weight SQNR
    pub weight_rank: Vec<usize>,
    /// Activation layer indices grouped by ascending SQNR
    pub act_groups: Vec<Vec<usize>>,
}

impl SensitivityRanking {
    pub fn new(weight_sqnr: &[f64], activation_sqnr: &[(usize, f64)]) -> Self {
        Self {
            weight_rank: rank_weights(weight_sqnr),
            act_groups: group_activations(activation_sqnr),
        }
    }

    pub fn from_statistics(stats: &ResolvedStatistics) -> Self {
        Self::new(&stats.weight_sqnr, &stats.activation_sqnr)
    }
}

/// Sort layer indices by descending SQNR; equal SQNR keeps index order.
pub fn rank_weights(weight_sqnr: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..weight_sqnr.len()).collect();
    order.sort_by(|&a, &b| weight_sqnr[b].total_cmp(&weight_sqnr[a]));
    order
}

/// Group activation layers by ascending SQNR.
///
/// With more than [`ACTIVATION_GROUPS`] entries, each of the first three
/// groups takes `floor(n / 4)` layers and the last takes the remainder.
pub fn group_activations(activation_sqnr: &[(usize, f64)]) -> Vec<Vec<usize>> {
    let mut sorted = activation_sqnr.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
    let ordered: Vec<usize> = sorted.into_iter().map(|(index, _)| index).collect();

    if ordered.len() <= ACTIVATION_GROUPS {
        return ordered.into_iter().map(|index| vec![index]).collect();
    }

    let per_group = ordered.len() / ACTIVATION_GROUPS;
    let mut groups: Vec<Vec<usize>> = ordered
        .chunks(per_group)
        .take(ACTIVATION_GROUPS - 1)
        .map(<[usize]>::to_vec)
        .collect();
    groups.push(ordered[(ACTIVATION_GROUPS - 1) * per_group..].to_vec());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_descending() {
        assert_eq!(rank_weights(&[10.0, 30.0, 20.0]), vec![1, 2, 0]);
    }

    #[test]
    fn test_rank_ties_keep_index_order() {
        assert_eq!(rank_weights(&[5.0, 7.0, 5.0, 7.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_few_activations_are_singletons() {
        let groups = group_activations(&[(0, 3.0), (1, 1.0), (2, 2.0)]);
        assert_eq!(groups, vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn test_four_activations_are_singletons() {
        let groups = group_activations(&[(0, 4.0), (1, 3.0), (2, 2.0), (3, 1.0)]);
        assert_eq!(groups, vec![vec![3], vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn test_many_activations_form_four_groups() {
        // 10 layers: 2 + 2 + 2 + 4
        let sqnr: Vec<(usize, f64)> = (0..10).map(|i| (i, (10 - i) as f64)).collect();
        let groups = group_activations(&sqnr);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0], vec![9, 8]);
        assert_eq!(groups[1], vec![7, 6]);
        assert_eq!(groups[2], vec![5, 4]);
        assert_eq!(groups[3], vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_five_activations() {
        let sqnr: Vec<(usize, f64)> = (0..5).map(|i| (i, i as f64)).collect();
        let groups = group_activations(&sqnr);
        assert_eq!(groups, vec![vec![0], vec![1], vec![2], vec![3, 4]]);
    }

    #[test]
    fn test_empty_inputs() {
        let ranking = SensitivityRanking::new(&[], &[]);
        assert!(ranking.weight_rank.is_empty());
        assert!(ranking.act_groups.is_empty());
    }
}
