use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const NUMBER_MAX: u8 = 50;
pub const STAR_MAX: u8 = 12;

/// A draw as received, before the store assigns it an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDraw {
    pub draw_date: NaiveDate,
    pub numbers: [u8; 5],
    pub stars: [u8; 2],
    pub jackpot: Option<f64>,
}

impl NewDraw {
    /// Validates the draw and stores numbers and stars in ascending order.
    pub fn new(
        draw_date: NaiveDate,
        mut numbers: [u8; 5],
        mut stars: [u8; 2],
        jackpot: Option<f64>,
    ) -> Result<Self, DrawValidationError> {
        validate_draw(&numbers, &stars)?;
        numbers.sort_unstable();
        stars.sort_unstable();
        Ok(Self {
            draw_date,
            numbers,
            stars,
            jackpot,
        })
    }
}

/// A persisted draw. Immutable once the store has handed it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    pub id: i64,
    pub draw_date: NaiveDate,
    pub numbers: [u8; 5],
    pub stars: [u8; 2],
    pub jackpot: Option<f64>,
}

impl Draw {
    pub fn from_new(id: i64, draw: &NewDraw) -> Self {
        Self {
            id,
            draw_date: draw.draw_date,
            numbers: draw.numbers,
            stars: draw.stars,
            jackpot: draw.jackpot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Numbers,
    Stars,
}

impl Pool {
    pub const ALL: [Pool; 2] = [Pool::Numbers, Pool::Stars];

    pub fn size(&self) -> usize {
        match self {
            Pool::Numbers => NUMBER_MAX as usize,
            Pool::Stars => STAR_MAX as usize,
        }
    }

    pub fn pick_count(&self) -> usize {
        match self {
            Pool::Numbers => 5,
            Pool::Stars => 2,
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = u8> {
        1..=self.size() as u8
    }

    pub fn contains(&self, value: u8) -> bool {
        value >= 1 && value as usize <= self.size()
    }

    pub fn entities_from<'a>(&self, draw: &'a Draw) -> &'a [u8] {
        match self {
            Pool::Numbers => &draw.numbers,
            Pool::Stars => &draw.stars,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Pool::Numbers => "number",
            Pool::Stars => "star",
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pool::Numbers => write!(f, "numbers"),
            Pool::Stars => write!(f, "stars"),
        }
    }
}

/// Cumulative per-entity aggregate row. One exists for every number and
/// every star; rows are created zeroed and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStat {
    pub value: u8,
    pub frequency: u32,
    pub current_gap: u32,
    pub average_gap: f64,
    pub max_gap: u32,
    pub is_hot: bool,
    pub last_draw_id: Option<i64>,
}

impl EntityStat {
    pub fn zeroed(value: u8) -> Self {
        Self {
            value,
            frequency: 0,
            current_gap: 0,
            average_gap: 0.0,
            max_gap: 0,
            is_hot: false,
            last_draw_id: None,
        }
    }
}

/// Stored co-occurrence counter for a pair or triplet of numbers.
/// `numbers` is strictly ascending and is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberTuple {
    pub numbers: Vec<u8>,
    pub frequency: u32,
    pub last_draw_id: Option<i64>,
}

/// One consistent read of the stat rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub numbers: Vec<EntityStat>,
    pub stars: Vec<EntityStat>,
    pub draw_count: u32,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            numbers: Pool::Numbers.entities().map(EntityStat::zeroed).collect(),
            stars: Pool::Stars.entities().map(EntityStat::zeroed).collect(),
            draw_count: 0,
        }
    }

    pub fn stats(&self, pool: Pool) -> &[EntityStat] {
        match pool {
            Pool::Numbers => &self.numbers,
            Pool::Stars => &self.stars,
        }
    }
}

/// Stat rows and the top co-occurrence counters, read at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub catalog: Catalog,
    /// Frequency descending, then tuple ascending.
    pub pairs: Vec<NumberTuple>,
    pub triplets: Vec<NumberTuple>,
}

/// Which draws a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    All,
    Last(u32),
}

impl Window {
    pub fn limit(&self) -> Option<u32> {
        match self {
            Window::All => None,
            Window::Last(n) => Some(*n),
        }
    }
}

/// The 10 ascending pairs of an ascending 5-number draw.
pub fn canonical_pairs(numbers: &[u8; 5]) -> Vec<[u8; 2]> {
    let mut sorted = *numbers;
    sorted.sort_unstable();
    let mut pairs = Vec::with_capacity(10);
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            pairs.push([sorted[i], sorted[j]]);
        }
    }
    pairs
}

/// The 10 ascending triplets of a 5-number draw.
pub fn canonical_triplets(numbers: &[u8; 5]) -> Vec<[u8; 3]> {
    let mut sorted = *numbers;
    sorted.sort_unstable();
    let mut triplets = Vec::with_capacity(10);
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            for k in (j + 1)..sorted.len() {
                triplets.push([sorted[i], sorted[j], sorted[k]]);
            }
        }
    }
    triplets
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawValidationError {
    #[error("number {0} out of range (1-50)")]
    NumberOutOfRange(u8),
    #[error("star {0} out of range (1-12)")]
    StarOutOfRange(u8),
    #[error("duplicate number: {0}")]
    DuplicateNumber(u8),
    #[error("duplicate star: {0}")]
    DuplicateStar(u8),
}

pub fn validate_draw(numbers: &[u8; 5], stars: &[u8; 2]) -> Result<(), DrawValidationError> {
    for &n in numbers {
        if !Pool::Numbers.contains(n) {
            return Err(DrawValidationError::NumberOutOfRange(n));
        }
    }
    for &s in stars {
        if !Pool::Stars.contains(s) {
            return Err(DrawValidationError::StarOutOfRange(s));
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                return Err(DrawValidationError::DuplicateNumber(numbers[i]));
            }
        }
    }
    if stars[0] == stars[1] {
        return Err(DrawValidationError::DuplicateStar(stars[0]));
    }
    Ok(())
}

/// Deterministic history for tests: draw `i` is dated `2024-01-01 + i days`.
pub fn make_test_draws(n: usize) -> Vec<NewDraw> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    (0..n)
        .map(|i| {
            let base = (i % 10) as u8;
            NewDraw {
                draw_date: start + chrono::Days::new(i as u64),
                numbers: [
                    base * 5 + 1,
                    base * 5 + 2,
                    base * 5 + 3,
                    base * 5 + 4,
                    base * 5 + 5,
                ],
                stars: [base % 12 + 1, (base + 1) % 12 + 1],
                jackpot: None,
            }
        })
        .map(|mut d| {
            d.stars.sort_unstable();
            d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_draw_ok() {
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[1, 2]).is_ok());
        assert!(validate_draw(&[50, 49, 48, 47, 46], &[11, 12]).is_ok());
    }

    #[test]
    fn test_validate_draw_number_out_of_range() {
        assert_eq!(
            validate_draw(&[0, 2, 3, 4, 5], &[1, 2]),
            Err(DrawValidationError::NumberOutOfRange(0))
        );
        assert!(validate_draw(&[1, 2, 3, 4, 51], &[1, 2]).is_err());
    }

    #[test]
    fn test_validate_draw_star_out_of_range() {
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[0, 2]).is_err());
        assert_eq!(
            validate_draw(&[1, 2, 3, 4, 5], &[1, 13]),
            Err(DrawValidationError::StarOutOfRange(13))
        );
    }

    #[test]
    fn test_validate_draw_duplicates() {
        assert_eq!(
            validate_draw(&[1, 1, 3, 4, 5], &[1, 2]),
            Err(DrawValidationError::DuplicateNumber(1))
        );
        assert_eq!(
            validate_draw(&[1, 2, 3, 4, 5], &[3, 3]),
            Err(DrawValidationError::DuplicateStar(3))
        );
    }

    #[test]
    fn test_new_draw_sorts() {
        let draw = NewDraw::new(date(2024, 1, 2), [40, 3, 17, 9, 22], [11, 2], None).unwrap();
        assert_eq!(draw.numbers, [3, 9, 17, 22, 40]);
        assert_eq!(draw.stars, [2, 11]);
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(Pool::Numbers.size(), 50);
        assert_eq!(Pool::Stars.size(), 12);
        assert_eq!(Pool::Numbers.pick_count(), 5);
        assert_eq!(Pool::Stars.pick_count(), 2);
        assert_eq!(Pool::Stars.entities().collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_canonical_tuples() {
        let pairs = canonical_pairs(&[9, 1, 5, 3, 7]);
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0], [1, 3]);
        assert!(pairs.iter().all(|p| p[0] < p[1]));

        let triplets = canonical_triplets(&[9, 1, 5, 3, 7]);
        assert_eq!(triplets.len(), 10);
        assert_eq!(triplets[0], [1, 3, 5]);
        assert_eq!(triplets[9], [5, 7, 9]);
        assert!(triplets.iter().all(|t| t[0] < t[1] && t[1] < t[2]));
    }

    #[test]
    fn test_make_test_draws_are_valid() {
        for draw in make_test_draws(30) {
            assert!(validate_draw(&draw.numbers, &draw.stars).is_ok());
            assert!(draw.stars[0] < draw.stars[1]);
        }
    }
}
