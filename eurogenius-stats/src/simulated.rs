//! Results built from the theoretical uniform draw, served when the store
//! cannot be reached. Always reported with [`Origin::Simulated`](crate::engine::Origin).

use eurogenius_db::models::{Catalog, EntityStat, Pool};

use crate::config::StatsConfig;
use crate::error::Result;
use crate::frequency::{EntityFrequency, FrequencyTable};
use crate::gaps::{GapAnalysis, GapRecord};
use crate::generator::{Combination, Constraints, Profile, RandomSource, Strategy, generate_batch};
use crate::hotcold::{Period, WindowedClasses, WindowedHotCold, hot_threshold};
use crate::round_to;

/// Chance that a given entity is drawn: 5/50 for numbers, 2/12 for stars.
pub fn draw_probability(pool: Pool) -> f64 {
    pool.pick_count() as f64 / pool.size() as f64
}

/// Expected draws between two appearances.
pub fn expected_gap(pool: Pool) -> f64 {
    pool.size() as f64 / pool.pick_count() as f64
}

/// Every entity at its expected gap, nothing counted, nothing hot.
pub fn uniform_catalog() -> Catalog {
    let rows = |pool: Pool| -> Vec<EntityStat> {
        pool.entities()
            .map(|value| EntityStat {
                average_gap: expected_gap(pool),
                ..EntityStat::zeroed(value)
            })
            .collect()
    };
    Catalog {
        numbers: rows(Pool::Numbers),
        stars: rows(Pool::Stars),
        draw_count: 0,
    }
}

fn uniform_frequencies(pool: Pool, window_size: u32) -> Vec<EntityFrequency> {
    let p = draw_probability(pool);
    pool.entities()
        .map(|value| EntityFrequency {
            value,
            count: (p * window_size as f64).round() as u32,
            frequency: round_to(p, 4),
            percentage: round_to(p * 100.0, 2),
        })
        .collect()
}

pub fn frequency_table(window_size: u32) -> FrequencyTable {
    FrequencyTable {
        window_size,
        numbers: uniform_frequencies(Pool::Numbers, window_size),
        stars: uniform_frequencies(Pool::Stars, window_size),
    }
}

fn uniform_gaps(pool: Pool) -> Vec<GapRecord> {
    pool.entities()
        .map(|value| GapRecord {
            value,
            last_appearance_index: None,
            current_gap: 0,
            max_gap: 0,
            average_gap: round_to(expected_gap(pool), 2),
            appearances: 0,
            ratio: Some(0.0),
        })
        .collect()
}

pub fn gap_analysis(window_size: u32) -> GapAnalysis {
    GapAnalysis {
        window_size,
        numbers: uniform_gaps(Pool::Numbers),
        stars: uniform_gaps(Pool::Stars),
    }
}

pub fn hot_cold(period: Period, config: &StatsConfig) -> WindowedHotCold {
    let window_size = period.window(config);
    let empty = |divisor: u32| WindowedClasses {
        threshold: hot_threshold(window_size, divisor),
        hot: Vec::new(),
        cold: Vec::new(),
    };
    WindowedHotCold {
        period,
        window_size,
        numbers: empty(config.number_hot_divisor),
        stars: empty(config.star_hot_divisor),
    }
}

/// With no preferred entity every strategy reduces to a uniform pick; the
/// requested strategy and its confidence schedule are kept on the output.
pub fn generate(
    strategy: Strategy,
    constraints: &Constraints,
    count: usize,
    max_batch: usize,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Combination>> {
    let profile = Profile::from_catalog(&uniform_catalog());
    let mut batch = generate_batch(&profile, Strategy::Balanced, constraints, count, max_batch, rng)?;
    for (i, combination) in batch.iter_mut().enumerate() {
        combination.strategy = strategy;
        combination.confidence = strategy.confidence(i);
    }
    Ok(batch)
}
