use eurogenius_db::models::{
    Draw, EntityStat, NewDraw, Pool, canonical_pairs, canonical_triplets, validate_draw,
};
use eurogenius_db::store::{AggregateTx, DrawStore, StoreError};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, tx_error};
use crate::hotcold::refresh_hot_flags;

/// Bumps every gap, then resets the drawn entities (steps 2 and 3 of an ingestion).
pub fn fold_entities(stats: &mut [EntityStat], drawn: &[u8], draw_id: i64) {
    for stat in stats.iter_mut() {
        stat.current_gap += 1;
    }
    for stat in stats.iter_mut().filter(|s| drawn.contains(&s.value)) {
        let previous = stat.frequency as f64;
        stat.average_gap = (stat.average_gap * previous + stat.current_gap as f64) / (previous + 1.0);
        stat.max_gap = stat.max_gap.max(stat.current_gap);
        stat.frequency += 1;
        stat.current_gap = 0;
        stat.last_draw_id = Some(draw_id);
    }
}

fn upsert_tuples(tx: &mut dyn AggregateTx, draw: &Draw) -> std::result::Result<(), StoreError> {
    for pair in canonical_pairs(&draw.numbers) {
        tx.upsert_pair(pair, draw.id)?;
    }
    for triplet in canonical_triplets(&draw.numbers) {
        tx.upsert_triplet(triplet, draw.id)?;
    }
    Ok(())
}

/// Folds `draws` (ascending) into the aggregate rows of an open transaction.
fn apply_draws(tx: &mut dyn AggregateTx, draws: &[Draw]) -> std::result::Result<(), StoreError> {
    let mut numbers = tx.entity_stats(Pool::Numbers)?;
    let mut stars = tx.entity_stats(Pool::Stars)?;

    for draw in draws {
        fold_entities(&mut numbers, &draw.numbers, draw.id);
        fold_entities(&mut stars, &draw.stars, draw.id);
        upsert_tuples(tx, draw)?;
    }

    refresh_hot_flags(&mut numbers);
    refresh_hot_flags(&mut stars);
    tx.write_entity_stats(Pool::Numbers, &numbers)?;
    tx.write_entity_stats(Pool::Stars, &stars)?;
    Ok(())
}

/// Folds an already stored draw into every aggregate, atomically.
///
/// Not idempotent: folding the same draw twice counts it twice. Callers that
/// retry after a failure must check the draw is not already reflected, or use
/// [`record_draw`], which dedupes by date.
pub fn ingest_draw(store: &dyn DrawStore, draw: &Draw) -> Result<()> {
    validate_draw(&draw.numbers, &draw.stars)?;
    store
        .run_in_transaction(&mut |tx: &mut dyn AggregateTx| apply_draws(tx, std::slice::from_ref(draw)))
        .map_err(|e| {
            warn!(draw_id = draw.id, error = %e, "ingestion rolled back");
            tx_error(e)
        })?;
    info!(draw_id = draw.id, date = %draw.draw_date, "draw ingested");
    Ok(())
}

/// What a merge changed in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    /// Ascending by date.
    pub inserted: Vec<Draw>,
    /// Dates already stored; nothing was written for them.
    pub duplicates: Vec<NewDraw>,
    /// An inserted draw predates the stored history, so every aggregate was
    /// replayed from the full history instead of folded.
    pub replayed: bool,
}

fn merge_in_tx(
    tx: &mut dyn AggregateTx,
    draws: &[NewDraw],
    progress: &mut dyn FnMut(usize, usize),
) -> std::result::Result<MergeOutcome, StoreError> {
    let latest = tx.latest_draw_date()?;
    let mut outcome = MergeOutcome::default();
    for (i, draw) in draws.iter().enumerate() {
        match tx.insert_draw(draw)? {
            Some(stored) => outcome.inserted.push(stored),
            None => outcome.duplicates.push(draw.clone()),
        }
        progress(i + 1, draws.len());
    }
    outcome
        .inserted
        .sort_by(|a, b| a.draw_date.cmp(&b.draw_date).then(a.id.cmp(&b.id)));

    outcome.replayed = match (latest, outcome.inserted.first()) {
        (Some(latest), Some(oldest)) => oldest.draw_date < latest,
        _ => false,
    };
    if outcome.replayed {
        // gaps are positional: folding an older draw last would misplace it
        tx.reset_aggregates()?;
        let history = tx.all_draws()?;
        apply_draws(tx, &history)?;
    } else if !outcome.inserted.is_empty() {
        apply_draws(tx, &outcome.inserted)?;
    }
    Ok(outcome)
}

/// Inserts `draws` and brings every aggregate up to date in one transaction.
///
/// Dates already stored are skipped. Draws newer than the stored history are
/// folded in date order; if any is older, the whole history is replayed
/// before commit. `progress` receives `(done, total)` after each insert.
pub fn merge_draws(
    store: &dyn DrawStore,
    draws: &[NewDraw],
    mut progress: impl FnMut(usize, usize),
) -> Result<MergeOutcome> {
    for draw in draws {
        validate_draw(&draw.numbers, &draw.stars)?;
    }
    let mut merged = None;
    store
        .run_in_transaction(&mut |tx: &mut dyn AggregateTx| {
            merged = Some(merge_in_tx(tx, draws, &mut progress)?);
            Ok(())
        })
        .map_err(|e| {
            warn!(draws = draws.len(), error = %e, "merge rolled back");
            tx_error(e)
        })?;

    let outcome = merged.unwrap_or_default();
    if outcome.replayed {
        warn!("draws older than the stored history were inserted, aggregates replayed");
    }
    info!(
        inserted = outcome.inserted.len(),
        duplicates = outcome.duplicates.len(),
        "draws merged"
    );
    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "draw", rename_all = "lowercase")]
pub enum RecordOutcome {
    Inserted(Draw),
    /// Inserted before the latest stored draw; the aggregates were replayed.
    Backfilled(Draw),
    /// A draw with the same date was already stored; nothing changed.
    Duplicate(NewDraw),
}

impl RecordOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, RecordOutcome::Inserted(_) | RecordOutcome::Backfilled(_))
    }
}

/// Persists a new draw and updates the aggregates in one transaction.
pub fn record_draw(store: &dyn DrawStore, draw: &NewDraw) -> Result<RecordOutcome> {
    let mut outcome = merge_draws(store, std::slice::from_ref(draw), |_, _| {})?;
    Ok(match outcome.inserted.pop() {
        Some(stored) if outcome.replayed => RecordOutcome::Backfilled(stored),
        Some(stored) => RecordOutcome::Inserted(stored),
        None => RecordOutcome::Duplicate(draw.clone()),
    })
}

/// Recomputes every stat, pair and triplet row from the full history.
/// Returns the number of draws replayed.
pub fn rebuild_aggregates(store: &dyn DrawStore) -> Result<u32> {
    let mut replayed = 0u32;
    store
        .run_in_transaction(&mut |tx: &mut dyn AggregateTx| {
            tx.reset_aggregates()?;
            let draws = tx.all_draws()?;
            apply_draws(tx, &draws)?;
            replayed = draws.len() as u32;
            Ok(())
        })
        .map_err(tx_error)?;
    info!(draws = replayed, "aggregates rebuilt");
    Ok(replayed)
}
