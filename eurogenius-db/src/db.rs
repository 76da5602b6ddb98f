use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};

use crate::models::{AggregateSnapshot, Catalog, Draw, EntityStat, NewDraw, NumberTuple, Pool, Window};
use crate::store::{AggregateTx, DrawStore, StoreError, TxSteps};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    draw_date     TEXT NOT NULL UNIQUE,
    number_1      INTEGER NOT NULL,
    number_2      INTEGER NOT NULL,
    number_3      INTEGER NOT NULL,
    number_4      INTEGER NOT NULL,
    number_5      INTEGER NOT NULL,
    star_1        INTEGER NOT NULL,
    star_2        INTEGER NOT NULL,
    jackpot       REAL
);

CREATE TABLE IF NOT EXISTS number_stats (
    value         INTEGER PRIMARY KEY,
    frequency     INTEGER NOT NULL DEFAULT 0,
    current_gap   INTEGER NOT NULL DEFAULT 0,
    average_gap   REAL NOT NULL DEFAULT 0.0,
    max_gap       INTEGER NOT NULL DEFAULT 0,
    is_hot        INTEGER NOT NULL DEFAULT 0,
    last_draw_id  INTEGER REFERENCES draws(id)
);

CREATE TABLE IF NOT EXISTS star_stats (
    value         INTEGER PRIMARY KEY,
    frequency     INTEGER NOT NULL DEFAULT 0,
    current_gap   INTEGER NOT NULL DEFAULT 0,
    average_gap   REAL NOT NULL DEFAULT 0.0,
    max_gap       INTEGER NOT NULL DEFAULT 0,
    is_hot        INTEGER NOT NULL DEFAULT 0,
    last_draw_id  INTEGER REFERENCES draws(id)
);

CREATE TABLE IF NOT EXISTS number_pairs (
    number_1      INTEGER NOT NULL,
    number_2      INTEGER NOT NULL,
    frequency     INTEGER NOT NULL DEFAULT 1,
    last_draw_id  INTEGER REFERENCES draws(id),
    PRIMARY KEY (number_1, number_2),
    CHECK (number_1 < number_2)
);

CREATE TABLE IF NOT EXISTS number_triplets (
    number_1      INTEGER NOT NULL,
    number_2      INTEGER NOT NULL,
    number_3      INTEGER NOT NULL,
    frequency     INTEGER NOT NULL DEFAULT 1,
    last_draw_id  INTEGER REFERENCES draws(id),
    PRIMARY KEY (number_1, number_2, number_3),
    CHECK (number_1 < number_2 AND number_2 < number_3)
);
";

const DRAW_COLUMNS: &str =
    "id, draw_date, number_1, number_2, number_3, number_4, number_5, star_1, star_2, jackpot";

pub fn db_path() -> PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("eurogenius.db");
    path
}

pub(crate) fn map_sql(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            ) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

pub fn open_db(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::unavailable(format!("cannot create directory {:?}: {}", parent, e))
        })?;
    }
    Connection::open(path).map_err(map_sql)
}

/// Creates the tables and seeds one zeroed stat row per number and star.
pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA).map_err(map_sql)?;
    for pool in Pool::ALL {
        let sql = format!("INSERT OR IGNORE INTO {} (value) VALUES (?1)", stats_table(pool));
        let mut stmt = conn.prepare(&sql).map_err(map_sql)?;
        for value in pool.entities() {
            stmt.execute([value]).map_err(map_sql)?;
        }
    }
    Ok(())
}

fn stats_table(pool: Pool) -> &'static str {
    match pool {
        Pool::Numbers => "number_stats",
        Pool::Stars => "star_stats",
    }
}

fn row_to_draw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draw> {
    Ok(Draw {
        id: row.get(0)?,
        draw_date: row.get(1)?,
        numbers: [
            row.get::<_, u8>(2)?,
            row.get::<_, u8>(3)?,
            row.get::<_, u8>(4)?,
            row.get::<_, u8>(5)?,
            row.get::<_, u8>(6)?,
        ],
        stars: [row.get::<_, u8>(7)?, row.get::<_, u8>(8)?],
        jackpot: row.get(9)?,
    })
}

/// Inserts the draw unless one with the same date exists.
pub fn insert_draw(conn: &Connection, draw: &NewDraw) -> Result<Option<Draw>, StoreError> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO draws (draw_date, number_1, number_2, number_3, number_4, number_5, star_1, star_2, jackpot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draw.draw_date,
                draw.numbers[0],
                draw.numbers[1],
                draw.numbers[2],
                draw.numbers[3],
                draw.numbers[4],
                draw.stars[0],
                draw.stars[1],
                draw.jackpot,
            ],
        )
        .map_err(map_sql)?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(Draw::from_new(conn.last_insert_rowid(), draw)))
}

/// Draws in ascending order; `Window::Last(n)` keeps the `n` most recent.
pub fn fetch_draws(conn: &Connection, window: Window) -> Result<Vec<Draw>, StoreError> {
    let limit = window.limit().map(i64::from).unwrap_or(-1);
    let sql = format!(
        "SELECT {DRAW_COLUMNS} FROM draws ORDER BY draw_date DESC, id DESC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql).map_err(map_sql)?;
    let mut draws = stmt
        .query_map([limit], row_to_draw)
        .map_err(map_sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sql)?;
    draws.reverse();
    Ok(draws)
}

pub fn count_draws(conn: &Connection) -> Result<u32, StoreError> {
    conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))
        .map_err(map_sql)
}

pub fn latest_date(conn: &Connection) -> Result<Option<NaiveDate>, StoreError> {
    conn.query_row("SELECT MAX(draw_date) FROM draws", [], |row| row.get(0))
        .map_err(map_sql)
}

pub fn date_exists(conn: &Connection, date: NaiveDate) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM draws WHERE draw_date = ?1", [date], |row| {
            row.get(0)
        })
        .optional()
        .map_err(map_sql)?;
    Ok(found.is_some())
}

pub fn fetch_entity_stats(conn: &Connection, pool: Pool) -> Result<Vec<EntityStat>, StoreError> {
    let sql = format!(
        "SELECT value, frequency, current_gap, average_gap, max_gap, is_hot, last_draw_id
         FROM {} ORDER BY value ASC",
        stats_table(pool)
    );
    let mut stmt = conn.prepare(&sql).map_err(map_sql)?;
    let stats = stmt
        .query_map([], |row| {
            Ok(EntityStat {
                value: row.get(0)?,
                frequency: row.get(1)?,
                current_gap: row.get(2)?,
                average_gap: row.get(3)?,
                max_gap: row.get(4)?,
                is_hot: row.get(5)?,
                last_draw_id: row.get(6)?,
            })
        })
        .map_err(map_sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sql)?;
    if stats.len() != pool.size() {
        return Err(StoreError::backend(format!(
            "{} holds {} rows, expected {}",
            stats_table(pool),
            stats.len(),
            pool.size()
        )));
    }
    Ok(stats)
}

pub fn write_entity_stats(
    conn: &Connection,
    pool: Pool,
    stats: &[EntityStat],
) -> Result<(), StoreError> {
    let sql = format!(
        "UPDATE {} SET frequency = ?2, current_gap = ?3, average_gap = ?4, max_gap = ?5,
         is_hot = ?6, last_draw_id = ?7 WHERE value = ?1",
        stats_table(pool)
    );
    let mut stmt = conn.prepare(&sql).map_err(map_sql)?;
    for stat in stats {
        let changed = stmt
            .execute(params![
                stat.value,
                stat.frequency,
                stat.current_gap,
                stat.average_gap,
                stat.max_gap,
                stat.is_hot,
                stat.last_draw_id,
            ])
            .map_err(map_sql)?;
        if changed != 1 {
            return Err(StoreError::backend(format!(
                "no {} stat row for {}",
                pool.label(),
                stat.value
            )));
        }
    }
    Ok(())
}

pub fn upsert_pair(conn: &Connection, pair: [u8; 2], draw_id: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO number_pairs (number_1, number_2, frequency, last_draw_id)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT (number_1, number_2)
         DO UPDATE SET frequency = frequency + 1, last_draw_id = excluded.last_draw_id",
        params![pair[0], pair[1], draw_id],
    )
    .map_err(map_sql)?;
    Ok(())
}

pub fn upsert_triplet(conn: &Connection, triplet: [u8; 3], draw_id: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO number_triplets (number_1, number_2, number_3, frequency, last_draw_id)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT (number_1, number_2, number_3)
         DO UPDATE SET frequency = frequency + 1, last_draw_id = excluded.last_draw_id",
        params![triplet[0], triplet[1], triplet[2], draw_id],
    )
    .map_err(map_sql)?;
    Ok(())
}

pub fn fetch_pairs(conn: &Connection, limit: usize) -> Result<Vec<NumberTuple>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT number_1, number_2, frequency, last_draw_id FROM number_pairs
             ORDER BY frequency DESC, number_1 ASC, number_2 ASC LIMIT ?1",
        )
        .map_err(map_sql)?;
    stmt.query_map([limit as i64], |row| {
        Ok(NumberTuple {
            numbers: vec![row.get(0)?, row.get(1)?],
            frequency: row.get(2)?,
            last_draw_id: row.get(3)?,
        })
    })
    .map_err(map_sql)?
    .collect::<Result<Vec<_>, _>>()
    .map_err(map_sql)
}

pub fn fetch_triplets(conn: &Connection, limit: usize) -> Result<Vec<NumberTuple>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT number_1, number_2, number_3, frequency, last_draw_id FROM number_triplets
             ORDER BY frequency DESC, number_1 ASC, number_2 ASC, number_3 ASC LIMIT ?1",
        )
        .map_err(map_sql)?;
    stmt.query_map([limit as i64], |row| {
        Ok(NumberTuple {
            numbers: vec![row.get(0)?, row.get(1)?, row.get(2)?],
            frequency: row.get(3)?,
            last_draw_id: row.get(4)?,
        })
    })
    .map_err(map_sql)?
    .collect::<Result<Vec<_>, _>>()
    .map_err(map_sql)
}

pub fn reset_aggregates(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "DELETE FROM number_pairs;
         DELETE FROM number_triplets;
         UPDATE number_stats SET frequency = 0, current_gap = 0, average_gap = 0.0,
             max_gap = 0, is_hot = 0, last_draw_id = NULL;
         UPDATE star_stats SET frequency = 0, current_gap = 0, average_gap = 0.0,
             max_gap = 0, is_hot = 0, last_draw_id = NULL;",
    )
    .map_err(map_sql)
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl AggregateTx for SqliteTx<'_> {
    fn insert_draw(&mut self, draw: &NewDraw) -> Result<Option<Draw>, StoreError> {
        insert_draw(self.conn, draw)
    }

    fn latest_draw_date(&mut self) -> Result<Option<NaiveDate>, StoreError> {
        latest_date(self.conn)
    }

    fn all_draws(&mut self) -> Result<Vec<Draw>, StoreError> {
        fetch_draws(self.conn, Window::All)
    }

    fn entity_stats(&mut self, pool: Pool) -> Result<Vec<EntityStat>, StoreError> {
        fetch_entity_stats(self.conn, pool)
    }

    fn write_entity_stats(&mut self, pool: Pool, stats: &[EntityStat]) -> Result<(), StoreError> {
        write_entity_stats(self.conn, pool, stats)
    }

    fn upsert_pair(&mut self, pair: [u8; 2], draw_id: i64) -> Result<(), StoreError> {
        upsert_pair(self.conn, pair, draw_id)
    }

    fn upsert_triplet(&mut self, triplet: [u8; 3], draw_id: i64) -> Result<(), StoreError> {
        upsert_triplet(self.conn, triplet, draw_id)
    }

    fn reset_aggregates(&mut self) -> Result<(), StoreError> {
        reset_aggregates(self.conn)
    }
}

/// Precomputed-aggregate store backed by SQLite.
///
/// One connection is shared behind a mutex, so writers are serialized inside
/// the process; `IMMEDIATE` transactions and `busy_timeout` cover other
/// processes. Waiting for either is bounded by `timeout`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    timeout: Duration,
}

impl SqliteStore {
    pub fn open(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let conn = open_db(path)?;
        Self::from_connection(conn, timeout)
    }

    pub fn open_in_memory(timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sql)?;
        Self::from_connection(conn, timeout)
    }

    fn from_connection(conn: Connection, timeout: Duration) -> Result<Self, StoreError> {
        conn.busy_timeout(timeout).map_err(map_sql)?;
        migrate(&conn)?;
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "sqlite store ready");
        Ok(Self {
            conn: Mutex::new(conn),
            timeout,
        })
    }

    /// Parks until the connection is free. The lock is eventually fair, so a
    /// steady stream of writers cannot starve readers past `timeout`.
    fn acquire(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.try_lock_for(self.timeout).ok_or_else(|| {
            StoreError::unavailable(format!(
                "connection busy for more than {} ms",
                self.timeout.as_millis()
            ))
        })
    }
}

impl DrawStore for SqliteStore {
    fn query_draws(&self, window: Window) -> Result<Vec<Draw>, StoreError> {
        let conn = self.acquire()?;
        fetch_draws(&conn, window)
    }

    fn draw_count(&self) -> Result<u32, StoreError> {
        let conn = self.acquire()?;
        count_draws(&conn)
    }

    fn contains_date(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let conn = self.acquire()?;
        date_exists(&conn, date)
    }

    fn query_catalog(&self) -> Result<Catalog, StoreError> {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(map_sql)?;
        let catalog = Catalog {
            numbers: fetch_entity_stats(&tx, Pool::Numbers)?,
            stars: fetch_entity_stats(&tx, Pool::Stars)?,
            draw_count: count_draws(&tx)?,
        };
        tx.finish().map_err(map_sql)?;
        Ok(catalog)
    }

    fn query_snapshot(&self, pair_limit: usize, triplet_limit: usize) -> Result<AggregateSnapshot, StoreError> {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(map_sql)?;
        let snapshot = AggregateSnapshot {
            catalog: Catalog {
                numbers: fetch_entity_stats(&tx, Pool::Numbers)?,
                stars: fetch_entity_stats(&tx, Pool::Stars)?,
                draw_count: count_draws(&tx)?,
            },
            pairs: fetch_pairs(&tx, pair_limit)?,
            triplets: fetch_triplets(&tx, triplet_limit)?,
        };
        tx.finish().map_err(map_sql)?;
        Ok(snapshot)
    }

    fn query_pairs(&self, limit: usize) -> Result<Vec<NumberTuple>, StoreError> {
        let conn = self.acquire()?;
        fetch_pairs(&conn, limit)
    }

    fn query_triplets(&self, limit: usize) -> Result<Vec<NumberTuple>, StoreError> {
        let conn = self.acquire()?;
        fetch_triplets(&conn, limit)
    }

    fn run_in_transaction(&self, steps: &mut TxSteps<'_>) -> Result<(), StoreError> {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sql)?;
        steps(&mut SqliteTx { conn: &tx })?;
        tx.commit().map_err(map_sql)
    }
}
