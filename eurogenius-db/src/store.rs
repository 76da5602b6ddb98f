use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{AggregateSnapshot, Catalog, Draw, EntityStat, NewDraw, NumberTuple, Pool, Window};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Timeout, lock contention or connection failure. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        StoreError::Unavailable(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Read-modify-write access to the aggregate rows inside one transaction.
pub trait AggregateTx {
    /// Inserts the draw unless its date is already stored.
    fn insert_draw(&mut self, draw: &NewDraw) -> Result<Option<Draw>, StoreError>;

    /// Date of the most recent stored draw, `None` when the history is empty.
    fn latest_draw_date(&mut self) -> Result<Option<NaiveDate>, StoreError>;

    /// Full history in ascending order.
    fn all_draws(&mut self) -> Result<Vec<Draw>, StoreError>;

    fn entity_stats(&mut self, pool: Pool) -> Result<Vec<EntityStat>, StoreError>;

    fn write_entity_stats(&mut self, pool: Pool, stats: &[EntityStat]) -> Result<(), StoreError>;

    fn upsert_pair(&mut self, pair: [u8; 2], draw_id: i64) -> Result<(), StoreError>;

    fn upsert_triplet(&mut self, triplet: [u8; 3], draw_id: i64) -> Result<(), StoreError>;

    /// Zeroes every stat row and drops all pair/triplet counters.
    fn reset_aggregates(&mut self) -> Result<(), StoreError>;
}

pub type TxSteps<'a> = dyn FnMut(&mut dyn AggregateTx) -> Result<(), StoreError> + 'a;

/// Query interface over persisted draws and their precomputed aggregates.
///
/// Draws are always returned in ascending chronological order (date, then id).
/// Every call either completes within the store's configured timeout or
/// fails with [`StoreError::Unavailable`].
pub trait DrawStore: Send + Sync {
    fn query_draws(&self, window: Window) -> Result<Vec<Draw>, StoreError>;

    fn draw_count(&self) -> Result<u32, StoreError>;

    fn contains_date(&self, date: NaiveDate) -> Result<bool, StoreError>;

    fn query_catalog(&self) -> Result<Catalog, StoreError>;

    /// Stored pair counters, frequency descending then tuple ascending.
    fn query_pairs(&self, limit: usize) -> Result<Vec<NumberTuple>, StoreError>;

    fn query_triplets(&self, limit: usize) -> Result<Vec<NumberTuple>, StoreError>;

    /// The catalog with the top `pair_limit` pairs and `triplet_limit`
    /// triplets, all from the same committed state.
    fn query_snapshot(&self, pair_limit: usize, triplet_limit: usize) -> Result<AggregateSnapshot, StoreError>;

    /// Runs `steps` atomically: either every write is committed or none is.
    fn run_in_transaction(&self, steps: &mut TxSteps<'_>) -> Result<(), StoreError>;

    fn query_number_stats(&self) -> Result<Vec<EntityStat>, StoreError> {
        Ok(self.query_catalog()?.numbers)
    }

    fn query_star_stats(&self) -> Result<Vec<EntityStat>, StoreError> {
        Ok(self.query_catalog()?.stars)
    }

    /// Persists a draw without touching aggregates. `None` if the date exists.
    fn insert_draw(&self, draw: &NewDraw) -> Result<Option<Draw>, StoreError> {
        let mut inserted = None;
        self.run_in_transaction(&mut |tx: &mut dyn AggregateTx| {
            inserted = tx.insert_draw(draw)?;
            Ok(())
        })?;
        Ok(inserted)
    }
}

/// Sorts co-occurrence rows the way every store reports them and truncates.
pub fn rank_tuples(mut tuples: Vec<NumberTuple>, limit: usize) -> Vec<NumberTuple> {
    tuples.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.numbers.cmp(&b.numbers))
    });
    tuples.truncate(limit);
    tuples
}
