use std::collections::BTreeMap;

use eurogenius_db::models::{Draw, NumberTuple, canonical_pairs, canonical_triplets};
use serde::Serialize;

use crate::frequency::ratio;
use crate::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupleFrequency {
    /// Strictly ascending.
    pub numbers: Vec<u8>,
    pub count: u32,
    /// Share of draws containing the tuple, in percent, 2 decimals.
    pub percentage: f64,
}

pub fn pair_counts(draws: &[Draw]) -> BTreeMap<[u8; 2], u32> {
    let mut counts = BTreeMap::new();
    for draw in draws {
        for pair in canonical_pairs(&draw.numbers) {
            *counts.entry(pair).or_insert(0) += 1;
        }
    }
    counts
}

pub fn triplet_counts(draws: &[Draw]) -> BTreeMap<[u8; 3], u32> {
    let mut counts = BTreeMap::new();
    for draw in draws {
        for triplet in canonical_triplets(&draw.numbers) {
            *counts.entry(triplet).or_insert(0) += 1;
        }
    }
    counts
}

/// Top `k` by count descending, ties in ascending tuple order.
fn rank<const N: usize>(counts: BTreeMap<[u8; N], u32>, total: u32, k: usize) -> Vec<TupleFrequency> {
    let mut ranked: Vec<([u8; N], u32)> = counts.into_iter().collect();
    // stable: BTreeMap order already breaks ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(k)
        .map(|(numbers, count)| TupleFrequency {
            numbers: numbers.to_vec(),
            count,
            percentage: round_to(ratio(count, total) * 100.0, 2),
        })
        .collect()
}

pub fn top_pairs(draws: &[Draw], k: usize) -> Vec<TupleFrequency> {
    rank(pair_counts(draws), draws.len() as u32, k)
}

pub fn top_triplets(draws: &[Draw], k: usize) -> Vec<TupleFrequency> {
    rank(triplet_counts(draws), draws.len() as u32, k)
}

/// Annotates stored counters with their share of `total_draws`.
pub fn from_stored(tuples: &[NumberTuple], total_draws: u32) -> Vec<TupleFrequency> {
    tuples
        .iter()
        .map(|t| TupleFrequency {
            numbers: t.numbers.clone(),
            count: t.frequency,
            percentage: round_to(ratio(t.frequency, total_draws) * 100.0, 2),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{arb_history, draw_with, stored};
    use proptest::prelude::*;

    #[test]
    fn test_ranking_and_ties() {
        let draws = vec![
            draw_with(0, [1, 2, 3, 4, 5], [1, 2]),
            draw_with(1, [1, 2, 10, 11, 12], [1, 2]),
            draw_with(2, [3, 4, 20, 21, 22], [1, 2]),
        ];
        let pairs = top_pairs(&draws, 3);
        assert_eq!(pairs[0].numbers, vec![1, 2]);
        assert_eq!(pairs[0].count, 2);
        assert_eq!(pairs[0].percentage, 66.67);
        assert_eq!(pairs[1].numbers, vec![3, 4]);
        assert_eq!(pairs[1].count, 2);
        // first of the count-1 pairs in tuple order
        assert_eq!(pairs[2].numbers, vec![1, 3]);
    }

    #[test]
    fn test_unsorted_draw_is_canonicalized() {
        let mut draw = draw_with(0, [1, 2, 3, 4, 5], [1, 2]);
        draw.numbers = [9, 2, 7, 1, 5];
        let counts = pair_counts(&[draw]);
        assert!(counts.contains_key(&[2, 9]));
        assert!(!counts.contains_key(&[9, 2]));
        let triplets = triplet_counts(&[draw_with(0, [5, 4, 3, 2, 1], [1, 2])]);
        assert!(triplets.keys().all(|t| t[0] < t[1] && t[1] < t[2]));
    }

    #[test]
    fn test_empty_window() {
        assert!(top_pairs(&[], 10).is_empty());
        assert!(top_triplets(&[], 10).is_empty());
    }

    #[test]
    fn test_from_stored() {
        let tuples = vec![NumberTuple {
            numbers: vec![4, 8],
            frequency: 3,
            last_draw_id: Some(9),
        }];
        let view = from_stored(&tuples, 12);
        assert_eq!(view[0].percentage, 25.0);
        assert_eq!(from_stored(&tuples, 0)[0].percentage, 0.0);
    }

    proptest! {
        #[test]
        fn pair_and_triplet_sums(history in arb_history(40)) {
            let draws = stored(history);
            let pairs: u32 = pair_counts(&draws).values().sum();
            let triplets: u32 = triplet_counts(&draws).values().sum();
            prop_assert_eq!(pairs, 10 * draws.len() as u32);
            prop_assert_eq!(triplets, 10 * draws.len() as u32);
        }
    }
}
