use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::models::{AggregateSnapshot, Catalog, Draw, EntityStat, NewDraw, NumberTuple, Pool, Window};
use crate::store::{AggregateTx, DrawStore, StoreError, TxSteps, rank_tuples};

/// Failure injected into a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Every call fails with [`StoreError::Unavailable`].
    Unavailable,
    /// The n-th tuple upsert of every transaction fails.
    FailTupleUpsert(usize),
}

#[derive(Debug, Clone)]
struct State {
    draws: Vec<Draw>,
    next_id: i64,
    numbers: Vec<EntityStat>,
    stars: Vec<EntityStat>,
    pairs: BTreeMap<[u8; 2], (u32, i64)>,
    triplets: BTreeMap<[u8; 3], (u32, i64)>,
}

impl State {
    fn new() -> Self {
        let catalog = Catalog::empty();
        Self {
            draws: Vec::new(),
            next_id: 1,
            numbers: catalog.numbers,
            stars: catalog.stars,
            pairs: BTreeMap::new(),
            triplets: BTreeMap::new(),
        }
    }

    fn catalog(&self) -> Catalog {
        Catalog {
            numbers: self.numbers.clone(),
            stars: self.stars.clone(),
            draw_count: self.draws.len() as u32,
        }
    }

    fn ranked_pairs(&self, limit: usize) -> Vec<NumberTuple> {
        rank_tuples(to_tuples(&self.pairs), limit)
    }

    fn ranked_triplets(&self, limit: usize) -> Vec<NumberTuple> {
        rank_tuples(to_tuples(&self.triplets), limit)
    }

    fn sorted_draws(&self, window: Window) -> Vec<Draw> {
        let mut draws = self.draws.clone();
        draws.sort_by(|a, b| a.draw_date.cmp(&b.draw_date).then(a.id.cmp(&b.id)));
        if let Some(n) = window.limit() {
            let skip = draws.len().saturating_sub(n as usize);
            draws = draws.split_off(skip);
        }
        draws
    }
}

fn to_tuples<const N: usize>(counters: &BTreeMap<[u8; N], (u32, i64)>) -> Vec<NumberTuple> {
    counters
        .iter()
        .map(|(numbers, &(frequency, last))| NumberTuple {
            numbers: numbers.to_vec(),
            frequency,
            last_draw_id: Some(last),
        })
        .collect()
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// In-process store with the same semantics as the SQLite one.
///
/// Transactions run against a private copy of the state that replaces the
/// shared one only on success, so readers see either all of an ingestion
/// or none of it.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<State>,
    fault: Mutex<Fault>,
    timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Reads and transactions give up with [`StoreError::Unavailable`] after
    /// waiting `timeout` for the lock.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            state: RwLock::new(State::new()),
            fault: Mutex::new(Fault::None),
            timeout,
        }
    }

    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock() = fault;
    }

    fn fault(&self) -> Fault {
        *self.fault.lock()
    }

    fn busy(&self) -> StoreError {
        StoreError::unavailable(format!(
            "memory store busy for more than {} ms",
            self.timeout.as_millis()
        ))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        if self.fault() == Fault::Unavailable {
            return Err(StoreError::unavailable("memory store marked unavailable"));
        }
        self.state.try_read_for(self.timeout).ok_or_else(|| self.busy())
    }
}

struct MemoryTx<'a> {
    state: &'a mut State,
    fail_tuple_upsert: Option<usize>,
    tuple_upserts: usize,
}

impl MemoryTx<'_> {
    fn check_fault(&mut self) -> Result<(), StoreError> {
        self.tuple_upserts += 1;
        if self.fail_tuple_upsert == Some(self.tuple_upserts) {
            return Err(StoreError::backend("injected tuple upsert failure"));
        }
        Ok(())
    }
}

fn stats_mut(state: &mut State, pool: Pool) -> &mut Vec<EntityStat> {
    match pool {
        Pool::Numbers => &mut state.numbers,
        Pool::Stars => &mut state.stars,
    }
}

impl AggregateTx for MemoryTx<'_> {
    fn insert_draw(&mut self, draw: &NewDraw) -> Result<Option<Draw>, StoreError> {
        if self.state.draws.iter().any(|d| d.draw_date == draw.draw_date) {
            return Ok(None);
        }
        let stored = Draw::from_new(self.state.next_id, draw);
        self.state.next_id += 1;
        self.state.draws.push(stored.clone());
        Ok(Some(stored))
    }

    fn latest_draw_date(&mut self) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.state.draws.iter().map(|d| d.draw_date).max())
    }

    fn all_draws(&mut self) -> Result<Vec<Draw>, StoreError> {
        Ok(self.state.sorted_draws(Window::All))
    }

    fn entity_stats(&mut self, pool: Pool) -> Result<Vec<EntityStat>, StoreError> {
        Ok(stats_mut(self.state, pool).clone())
    }

    fn write_entity_stats(&mut self, pool: Pool, stats: &[EntityStat]) -> Result<(), StoreError> {
        let rows = stats_mut(self.state, pool);
        for stat in stats {
            let row = rows
                .iter_mut()
                .find(|r| r.value == stat.value)
                .ok_or_else(|| {
                    StoreError::backend(format!("no {} stat row for {}", pool.label(), stat.value))
                })?;
            *row = stat.clone();
        }
        Ok(())
    }

    fn upsert_pair(&mut self, pair: [u8; 2], draw_id: i64) -> Result<(), StoreError> {
        self.check_fault()?;
        if pair[0] >= pair[1] {
            return Err(StoreError::backend(format!("pair {:?} is not canonical", pair)));
        }
        let entry = self.state.pairs.entry(pair).or_insert((0, draw_id));
        entry.0 += 1;
        entry.1 = draw_id;
        Ok(())
    }

    fn upsert_triplet(&mut self, triplet: [u8; 3], draw_id: i64) -> Result<(), StoreError> {
        self.check_fault()?;
        if triplet[0] >= triplet[1] || triplet[1] >= triplet[2] {
            return Err(StoreError::backend(format!("triplet {:?} is not canonical", triplet)));
        }
        let entry = self.state.triplets.entry(triplet).or_insert((0, draw_id));
        entry.0 += 1;
        entry.1 = draw_id;
        Ok(())
    }

    fn reset_aggregates(&mut self) -> Result<(), StoreError> {
        let catalog = Catalog::empty();
        self.state.numbers = catalog.numbers;
        self.state.stars = catalog.stars;
        self.state.pairs.clear();
        self.state.triplets.clear();
        Ok(())
    }
}

impl DrawStore for MemoryStore {
    fn query_draws(&self, window: Window) -> Result<Vec<Draw>, StoreError> {
        Ok(self.read()?.sorted_draws(window))
    }

    fn draw_count(&self) -> Result<u32, StoreError> {
        Ok(self.read()?.draws.len() as u32)
    }

    fn contains_date(&self, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.read()?.draws.iter().any(|d| d.draw_date == date))
    }

    fn query_catalog(&self) -> Result<Catalog, StoreError> {
        Ok(self.read()?.catalog())
    }

    fn query_pairs(&self, limit: usize) -> Result<Vec<NumberTuple>, StoreError> {
        Ok(self.read()?.ranked_pairs(limit))
    }

    fn query_triplets(&self, limit: usize) -> Result<Vec<NumberTuple>, StoreError> {
        Ok(self.read()?.ranked_triplets(limit))
    }

    fn query_snapshot(&self, pair_limit: usize, triplet_limit: usize) -> Result<AggregateSnapshot, StoreError> {
        let state = self.read()?;
        Ok(AggregateSnapshot {
            catalog: state.catalog(),
            pairs: state.ranked_pairs(pair_limit),
            triplets: state.ranked_triplets(triplet_limit),
        })
    }

    fn run_in_transaction(&self, steps: &mut TxSteps<'_>) -> Result<(), StoreError> {
        let fault = self.fault();
        if fault == Fault::Unavailable {
            return Err(StoreError::unavailable("memory store marked unavailable"));
        }
        // The write lock is held for the whole transaction: ingestions are
        // serialized and readers never see the working copy.
        let mut shared = self.state.try_write_for(self.timeout).ok_or_else(|| self.busy())?;
        let mut working = shared.clone();
        let fail_tuple_upsert = match fault {
            Fault::FailTupleUpsert(n) => Some(n),
            _ => None,
        };
        steps(&mut MemoryTx {
            state: &mut working,
            fail_tuple_upsert,
            tuple_upserts: 0,
        })?;
        *shared = working;
        Ok(())
    }
}
