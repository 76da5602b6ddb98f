use eurogenius_db::models::{Draw, EntityStat, Pool};
use serde::{Deserialize, Serialize};

use crate::config::StatsConfig;
use crate::frequency::{count_entities, ratio};
use crate::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Heat {
    Hot,
    Cold,
    Neutral,
}

impl std::fmt::Display for Heat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Heat::Hot => write!(f, "HOT"),
            Heat::Cold => write!(f, "COLD"),
            Heat::Neutral => write!(f, "-"),
        }
    }
}

// ── Mean-relative policy ──

pub fn mean_frequency(stats: &[EntityStat]) -> f64 {
    if stats.is_empty() {
        return 0.0;
    }
    stats.iter().map(|s| s.frequency as f64).sum::<f64>() / stats.len() as f64
}

/// Hot above the catalog mean, cold below it, neutral exactly at it.
pub fn mean_relative_heat(stat: &EntityStat, mean: f64) -> Heat {
    let frequency = stat.frequency as f64;
    if frequency > mean {
        Heat::Hot
    } else if frequency < mean {
        Heat::Cold
    } else {
        Heat::Neutral
    }
}

/// Recomputes the stored hot flag of every row from the current frequencies.
pub fn refresh_hot_flags(stats: &mut [EntityStat]) {
    let mean = mean_frequency(stats);
    for stat in stats.iter_mut() {
        stat.is_hot = mean_relative_heat(stat, mean) == Heat::Hot;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEntity {
    pub value: u8,
    pub frequency: u32,
    /// Share of all draws, percent, 2 decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanRelativeClasses {
    pub mean: f64,
    /// Frequency descending.
    pub hot: Vec<ClassifiedEntity>,
    /// Frequency ascending.
    pub cold: Vec<ClassifiedEntity>,
}

pub fn mean_relative_classes(stats: &[EntityStat], draw_count: u32) -> MeanRelativeClasses {
    let mean = mean_frequency(stats);
    let classify = |heat: Heat| -> Vec<ClassifiedEntity> {
        stats
            .iter()
            .filter(|s| mean_relative_heat(s, mean) == heat)
            .map(|s| ClassifiedEntity {
                value: s.value,
                frequency: s.frequency,
                percentage: round_to(ratio(s.frequency, draw_count) * 100.0, 2),
            })
            .collect()
    };
    let mut hot = classify(Heat::Hot);
    hot.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.value.cmp(&b.value)));
    let mut cold = classify(Heat::Cold);
    cold.sort_by(|a, b| a.frequency.cmp(&b.frequency).then(a.value.cmp(&b.value)));
    MeanRelativeClasses {
        mean: round_to(mean, 2),
        hot,
        cold,
    }
}

// ── Recent-window policy ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Recent,
    Medium,
    All,
}

impl Period {
    /// Number of most recent draws the period covers.
    pub fn window(&self, config: &StatsConfig) -> u32 {
        match self {
            Period::Recent => config.recent_window,
            Period::Medium => config.medium_window,
            Period::All => config.all_window_cap,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Recent => write!(f, "recent"),
            Period::Medium => write!(f, "medium"),
            Period::All => write!(f, "all"),
        }
    }
}

pub fn hot_threshold(window_size: u32, divisor: u32) -> u32 {
    (window_size / divisor.max(1)).max(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowedClasses {
    pub threshold: u32,
    /// Ascending.
    pub hot: Vec<u8>,
    /// Ascending; entities not seen at all in the window.
    pub cold: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowedHotCold {
    pub period: Period,
    pub window_size: u32,
    pub numbers: WindowedClasses,
    pub stars: WindowedClasses,
}

fn windowed_classes(draws: &[Draw], pool: Pool, divisor: u32) -> WindowedClasses {
    let threshold = hot_threshold(draws.len() as u32, divisor);
    let counts = count_entities(draws, pool);
    let pick = |keep: &dyn Fn(u32) -> bool| -> Vec<u8> {
        counts
            .iter()
            .zip(pool.entities())
            .filter(|(count, _)| keep(**count))
            .map(|(_, value)| value)
            .collect()
    };
    WindowedClasses {
        threshold,
        hot: pick(&|c| c >= threshold),
        cold: pick(&|c| c == 0),
    }
}

/// Classifies over `draws`, which must already be the period's window.
/// Computed on demand, never stored.
pub fn windowed_hot_cold(draws: &[Draw], period: Period, config: &StatsConfig) -> WindowedHotCold {
    WindowedHotCold {
        period,
        window_size: draws.len() as u32,
        numbers: windowed_classes(draws, Pool::Numbers, config.number_hot_divisor),
        stars: windowed_classes(draws, Pool::Stars, config.star_hot_divisor),
    }
}
