use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{Result, StatsError};

/// EuroMillions is drawn on Tuesday and Friday evenings.
pub const DRAW_DAYS: [Weekday; 2] = [Weekday::Tue, Weekday::Fri];

fn days_until(from: Weekday, to: Weekday) -> u64 {
    let ahead = (to.num_days_from_monday() + 7 - from.num_days_from_monday()) % 7;
    if ahead == 0 { 7 } else { ahead as u64 }
}

fn advance(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| StatsError::validation(format!("no draw date after {date}")))
}

/// First draw day strictly after `date`.
pub fn next_draw_after(date: NaiveDate) -> Result<NaiveDate> {
    let days = DRAW_DAYS
        .iter()
        .map(|&day| days_until(date.weekday(), day))
        .min()
        .unwrap_or(7);
    advance(date, days)
}

/// First Friday strictly after `date`; the guess used when no history exists.
pub fn next_friday_after(date: NaiveDate) -> Result<NaiveDate> {
    advance(date, days_until(date.weekday(), Weekday::Fri))
}
