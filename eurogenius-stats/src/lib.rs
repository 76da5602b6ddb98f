pub mod catalog;
pub mod config;
pub mod cooccurrence;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod gaps;
pub mod generator;
pub mod hotcold;
pub mod ingest;
pub mod provider;
pub mod schedule;
pub mod simulated;

pub use config::StatsConfig;
pub use engine::{Dashboard, Origin, Report, StatsEngine};
pub use error::{Result, StatsError};
pub use generator::{Combination, Constraints, Strategy};
pub use hotcold::Period;

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};
    use eurogenius_db::models::{Draw, NewDraw};
    use proptest::prelude::*;

    pub fn base_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Assigns ids in slice order, as a store would for an ascending import.
    pub fn stored(draws: Vec<NewDraw>) -> Vec<Draw> {
        draws
            .iter()
            .enumerate()
            .map(|(i, d)| Draw::from_new(i as i64 + 1, d))
            .collect()
    }

    pub fn new_draw_with(i: usize, numbers: [u8; 5], stars: [u8; 2]) -> NewDraw {
        NewDraw::new(base_date() + Duration::days(i as i64), numbers, stars, None).unwrap()
    }

    pub fn draw_with(i: usize, numbers: [u8; 5], stars: [u8; 2]) -> Draw {
        Draw::from_new(i as i64 + 1, &new_draw_with(i, numbers, stars))
    }

    pub fn arb_draw() -> impl Strategy<Value = ([u8; 5], [u8; 2])> {
        let numbers = proptest::sample::subsequence((1..=50u8).collect::<Vec<_>>(), 5);
        let stars = proptest::sample::subsequence((1..=12u8).collect::<Vec<_>>(), 2);
        (numbers, stars).prop_map(|(n, s)| ([n[0], n[1], n[2], n[3], n[4]], [s[0], s[1]]))
    }

    pub fn arb_history(max: usize) -> impl Strategy<Value = Vec<NewDraw>> {
        proptest::collection::vec(arb_draw(), 0..=max).prop_map(|draws| {
            draws
                .into_iter()
                .enumerate()
                .map(|(i, (numbers, stars))| new_draw_with(i, numbers, stars))
                .collect()
        })
    }

    #[test]
    fn test_round_to() {
        assert_eq!(super::round_to(6.333333, 2), 6.33);
        assert_eq!(super::round_to(1.0 / 3.0, 4), 0.3333);
        assert_eq!(super::round_to(2.0 / 3.0 * 100.0, 2), 66.67);
    }
}
