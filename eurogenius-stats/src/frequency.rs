use eurogenius_db::models::{Draw, Pool};
use serde::Serialize;

use crate::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityFrequency {
    pub value: u8,
    pub count: u32,
    /// `count / window_size`, 4 decimals.
    pub frequency: f64,
    /// `frequency * 100`, 2 decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyTable {
    pub window_size: u32,
    pub numbers: Vec<EntityFrequency>,
    pub stars: Vec<EntityFrequency>,
}

/// Occurrences of each entity of `pool`, indexed by `value - 1`.
pub fn count_entities(draws: &[Draw], pool: Pool) -> Vec<u32> {
    let mut counts = vec![0u32; pool.size()];
    for draw in draws {
        for &n in pool.entities_from(draw) {
            let idx = (n - 1) as usize;
            if idx < counts.len() {
                counts[idx] += 1;
            }
        }
    }
    counts
}

pub fn ratio(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub fn entity_frequencies(draws: &[Draw], pool: Pool) -> Vec<EntityFrequency> {
    let window_size = draws.len() as u32;
    count_entities(draws, pool)
        .into_iter()
        .zip(pool.entities())
        .map(|(count, value)| {
            let r = ratio(count, window_size);
            EntityFrequency {
                value,
                count,
                frequency: round_to(r, 4),
                percentage: round_to(r * 100.0, 2),
            }
        })
        .collect()
}

pub fn frequency_table(draws: &[Draw]) -> FrequencyTable {
    FrequencyTable {
        window_size: draws.len() as u32,
        numbers: entity_frequencies(draws, Pool::Numbers),
        stars: entity_frequencies(draws, Pool::Stars),
    }
}

/// How often each number lands in each sorted slot of a draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionalCount {
    pub number: u8,
    pub positions: [u32; 5],
}

pub fn positional_distribution(draws: &[Draw]) -> Vec<PositionalCount> {
    let mut rows: Vec<PositionalCount> = Pool::Numbers
        .entities()
        .map(|number| PositionalCount {
            number,
            positions: [0; 5],
        })
        .collect();
    for draw in draws {
        let mut sorted = draw.numbers;
        sorted.sort_unstable();
        for (position, &n) in sorted.iter().enumerate() {
            if let Some(row) = rows.get_mut((n - 1) as usize) {
                row.positions[position] += 1;
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{arb_history, stored};
    use eurogenius_db::models::make_test_draws;
    use proptest::prelude::*;

    #[test]
    fn test_empty_window_is_all_zero() {
        let table = frequency_table(&[]);
        assert_eq!(table.window_size, 0);
        assert_eq!(table.numbers.len(), 50);
        assert_eq!(table.stars.len(), 12);
        assert!(table.numbers.iter().all(|f| f.count == 0 && f.frequency == 0.0));
        assert!(table.stars.iter().all(|f| f.percentage == 0.0));
    }

    #[test]
    fn test_frequency_rounding() {
        let draws = stored(make_test_draws(3));
        let numbers = entity_frequencies(&draws, Pool::Numbers);
        // numbers 1..=15 appear once each in 3 draws
        assert_eq!(numbers[0].count, 1);
        assert_eq!(numbers[0].frequency, 0.3333);
        assert_eq!(numbers[0].percentage, 33.33);
        assert_eq!(numbers[15].count, 0);
    }

    #[test]
    fn test_positional_distribution() {
        let draws = stored(make_test_draws(10));
        let rows = positional_distribution(&draws);
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0].positions, [1, 0, 0, 0, 0]);
        assert_eq!(rows[4].positions, [0, 0, 0, 0, 1]);
        let total: u32 = rows.iter().flat_map(|r| r.positions).sum();
        assert_eq!(total, 50);
    }

    proptest! {
        #[test]
        fn counts_sum_to_picks_per_draw(history in arb_history(60)) {
            let draws = stored(history);
            let table = frequency_table(&draws);
            let numbers: u32 = table.numbers.iter().map(|f| f.count).sum();
            let stars: u32 = table.stars.iter().map(|f| f.count).sum();
            prop_assert_eq!(numbers, 5 * draws.len() as u32);
            prop_assert_eq!(stars, 2 * draws.len() as u32);
        }

        #[test]
        fn frequencies_ignore_draw_order(
            (history, shuffled) in arb_history(40).prop_flat_map(|h| {
                let shuffled = Just(h.clone()).prop_shuffle();
                (Just(h), shuffled)
            })
        ) {
            let a = frequency_table(&stored(history));
            let b = frequency_table(&stored(shuffled));
            prop_assert_eq!(a, b);
        }
    }
}
