pub mod constraints;
pub mod random;

use std::cmp::Ordering;

use eurogenius_db::models::{Catalog, EntityStat, Pool};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StatsError};
use crate::hotcold::{Heat, mean_frequency};
use crate::round_to;

pub use constraints::Constraints;
pub use random::{RandomSource, RngSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Hot,
    Cold,
    Due,
    Rare,
    Balanced,
    Statistical,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::Hot,
        Strategy::Cold,
        Strategy::Due,
        Strategy::Rare,
        Strategy::Balanced,
        Strategy::Statistical,
    ];

    pub fn base_confidence(&self) -> f64 {
        match self {
            Strategy::Statistical => 0.70,
            Strategy::Hot => 0.65,
            Strategy::Balanced => 0.60,
            Strategy::Due => 0.55,
            Strategy::Cold => 0.50,
            Strategy::Rare => 0.40,
        }
    }

    /// Confidence lost by each later combination of a batch.
    pub fn batch_step(&self) -> f64 {
        match self {
            Strategy::Balanced => 0.03,
            _ => 0.05,
        }
    }

    /// Confidence of the `index`-th combination of a batch, in `[0, 1]`, 2 decimals.
    pub fn confidence(&self, index: usize) -> f64 {
        let raw = self.base_confidence() - self.batch_step() * index as f64;
        round_to(raw.clamp(0.0, 1.0), 2)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Hot => "hot",
            Strategy::Cold => "cold",
            Strategy::Due => "due",
            Strategy::Rare => "rare",
            Strategy::Balanced => "balanced",
            Strategy::Statistical => "statistical",
        };
        write!(f, "{name}")
    }
}

/// What the strategies rank one entity by.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: u8,
    pub frequency: u32,
    pub heat: Heat,
    pub current_gap: u32,
    pub average_gap: f64,
}

impl Candidate {
    pub fn due_ratio(&self) -> Option<f64> {
        (self.average_gap > 0.0).then(|| self.current_gap as f64 / self.average_gap)
    }
}

/// Candidates of one pool, ascending by value.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolProfile {
    pub pool: Pool,
    pub candidates: Vec<Candidate>,
}

/// Hot comes from the stored flag; cold is below the catalog mean.
fn stored_heat(stat: &EntityStat, mean: f64) -> Heat {
    if stat.is_hot {
        Heat::Hot
    } else if (stat.frequency as f64) < mean {
        Heat::Cold
    } else {
        Heat::Neutral
    }
}

impl PoolProfile {
    pub fn from_stats(pool: Pool, stats: &[EntityStat]) -> Self {
        let mean = mean_frequency(stats);
        let mut candidates: Vec<Candidate> = stats
            .iter()
            .map(|s| Candidate {
                value: s.value,
                frequency: s.frequency,
                heat: stored_heat(s, mean),
                current_gap: s.current_gap,
                average_gap: s.average_gap,
            })
            .collect();
        candidates.sort_by_key(|c| c.value);
        Self { pool, candidates }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub numbers: PoolProfile,
    pub stars: PoolProfile,
}

impl Profile {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            numbers: PoolProfile::from_stats(Pool::Numbers, &catalog.numbers),
            stars: PoolProfile::from_stats(Pool::Stars, &catalog.stars),
        }
    }

    pub fn pool(&self, pool: Pool) -> &PoolProfile {
        match pool {
            Pool::Numbers => &self.numbers,
            Pool::Stars => &self.stars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combination {
    pub numbers: [u8; 5],
    pub stars: [u8; 2],
    pub strategy: Strategy,
    pub confidence: f64,
}

fn by_frequency_desc(a: &&Candidate, b: &&Candidate) -> Ordering {
    b.frequency.cmp(&a.frequency).then(a.value.cmp(&b.value))
}

fn by_frequency_asc(a: &&Candidate, b: &&Candidate) -> Ordering {
    a.frequency.cmp(&b.frequency).then(a.value.cmp(&b.value))
}

/// Highest gap ratio first; entities without a ratio come last, by current gap.
fn by_due(a: &&Candidate, b: &&Candidate) -> Ordering {
    let ratio = match (a.due_ratio(), b.due_ratio()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    ratio
        .then(b.current_gap.cmp(&a.current_gap))
        .then(a.value.cmp(&b.value))
}

fn ranked(
    available: &[&Candidate],
    slots: usize,
    order: fn(&&Candidate, &&Candidate) -> Ordering,
) -> Vec<u8> {
    let mut sorted = available.to_vec();
    sorted.sort_by(order);
    sorted.into_iter().take(slots).map(|c| c.value).collect()
}

/// Random picks among `heat` entities when there are enough of them; otherwise
/// all of them plus the best of the rest by `fallback`.
fn prefer(
    available: &[&Candidate],
    slots: usize,
    heat: Heat,
    fallback: fn(&&Candidate, &&Candidate) -> Ordering,
    rng: &mut dyn RandomSource,
) -> Vec<u8> {
    let preferred: Vec<u8> = available
        .iter()
        .filter(|c| c.heat == heat)
        .map(|c| c.value)
        .collect();
    if preferred.len() >= slots {
        return random::choose(rng, &preferred, slots);
    }
    let rest: Vec<&Candidate> = available
        .iter()
        .copied()
        .filter(|c| c.heat != heat)
        .collect();
    let mut picked = preferred;
    let missing = slots - picked.len();
    picked.extend(ranked(&rest, missing, fallback));
    picked
}

/// Half the slots (rounded up) from the hot entities, the rest uniformly from
/// everything else still available.
fn mixed(available: &[&Candidate], slots: usize, rng: &mut dyn RandomSource) -> Vec<u8> {
    if available.len() <= slots {
        return available.iter().map(|c| c.value).collect();
    }
    let hot: Vec<u8> = available
        .iter()
        .filter(|c| c.heat == Heat::Hot)
        .map(|c| c.value)
        .collect();
    let hot_count = slots.div_ceil(2).min(hot.len());
    let mut picked = random::choose(rng, &hot, hot_count);
    let rest: Vec<u8> = available
        .iter()
        .map(|c| c.value)
        .filter(|v| !picked.contains(v))
        .collect();
    let fill = random::choose(rng, &rest, slots - picked.len());
    picked.extend(fill);
    picked
}

fn select(
    strategy: Strategy,
    available: &[&Candidate],
    slots: usize,
    rng: &mut dyn RandomSource,
) -> Vec<u8> {
    if slots == 0 {
        return Vec::new();
    }
    match strategy {
        Strategy::Hot => prefer(available, slots, Heat::Hot, by_frequency_desc, rng),
        Strategy::Cold => prefer(available, slots, Heat::Cold, by_frequency_asc, rng),
        Strategy::Due => ranked(available, slots, by_due),
        Strategy::Rare => ranked(available, slots, by_frequency_asc),
        Strategy::Statistical => ranked(available, slots, by_frequency_desc),
        Strategy::Balanced => mixed(available, slots, rng),
    }
}

/// Includes verbatim plus strategy picks for the open slots, ascending.
fn fill_pool(
    profile: &PoolProfile,
    strategy: Strategy,
    constraints: &Constraints,
    rng: &mut dyn RandomSource,
) -> Result<Vec<u8>> {
    let pool = profile.pool;
    let include = constraints.include(pool);
    let exclude = constraints.exclude(pool);
    let slots = pool.pick_count() - include.len();

    let available: Vec<&Candidate> = profile
        .candidates
        .iter()
        .filter(|c| !include.contains(&c.value) && !exclude.contains(&c.value))
        .collect();

    let mut picked = select(strategy, &available, slots, rng);
    if picked.len() != slots {
        return Err(StatsError::validation(format!(
            "cannot fill {slots} {pool} from {} candidates",
            available.len()
        )));
    }
    picked.extend_from_slice(include);
    picked.sort_unstable();
    Ok(picked)
}

/// One combination, as the `index`-th item of a batch.
pub fn generate_combination(
    profile: &Profile,
    strategy: Strategy,
    constraints: &Constraints,
    index: usize,
    rng: &mut dyn RandomSource,
) -> Result<Combination> {
    constraints.validate()?;

    let numbers = fill_pool(&profile.numbers, strategy, constraints, rng)?;
    let stars = fill_pool(&profile.stars, strategy, constraints, rng)?;

    let combination = Combination {
        numbers: [numbers[0], numbers[1], numbers[2], numbers[3], numbers[4]],
        stars: [stars[0], stars[1]],
        strategy,
        confidence: strategy.confidence(index),
    };
    debug!(
        strategy = %strategy,
        numbers = ?combination.numbers,
        stars = ?combination.stars,
        confidence = combination.confidence,
        "combination generated"
    );
    Ok(combination)
}

pub fn generate_batch(
    profile: &Profile,
    strategy: Strategy,
    constraints: &Constraints,
    count: usize,
    max_batch: usize,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Combination>> {
    if count == 0 || count > max_batch {
        return Err(StatsError::validation(format!(
            "count must be between 1 and {max_batch}, got {count}"
        )));
    }
    constraints.validate()?;
    (0..count)
        .map(|i| generate_combination(profile, strategy, constraints, i, rng))
        .collect()
}
