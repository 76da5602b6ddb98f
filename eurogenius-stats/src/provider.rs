use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use eurogenius_db::models::NewDraw;
use eurogenius_db::store::DrawStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StatsError};
use crate::ingest::merge_draws;

/// A draw as an external source reports it, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDraw {
    #[serde(rename = "date")]
    pub draw_date: NaiveDate,
    pub numbers: Vec<u8>,
    pub stars: Vec<u8>,
    #[serde(default)]
    pub jackpot: Option<f64>,
}

impl RawDraw {
    /// Structural validation shared with every other ingestion path.
    pub fn to_new_draw(&self) -> Result<NewDraw> {
        let numbers: [u8; 5] = self.numbers.as_slice().try_into().map_err(|_| {
            StatsError::Ingestion(format!("expected 5 numbers, got {}", self.numbers.len()))
        })?;
        let stars: [u8; 2] = self.stars.as_slice().try_into().map_err(|_| {
            StatsError::Ingestion(format!("expected 2 stars, got {}", self.stars.len()))
        })?;
        Ok(NewDraw::new(self.draw_date, numbers, stars, self.jackpot)?)
    }
}

/// One fetched record, or why the source could not decode it.
pub type RawRecord = std::result::Result<RawDraw, String>;

/// External source of draw results. May be unavailable; callers treat a
/// failed fetch as "no new data".
pub trait DrawProvider {
    fn name(&self) -> &str;

    /// The `limit` most recent records, in any order.
    fn fetch_latest_draws(&self, limit: usize) -> Result<Vec<RawRecord>>;
}

fn keep_latest(mut records: Vec<RawRecord>, limit: usize) -> Vec<RawRecord> {
    records.sort_by(|a, b| match (a, b) {
        (Ok(x), Ok(y)) => y.draw_date.cmp(&x.draw_date),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
    });
    records.truncate(limit);
    records
}

// ── FDJ CSV export ──

pub fn parse_french_decimal(s: &str) -> std::result::Result<f64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    s.replace(',', ".")
        .parse::<f64>()
        .map_err(|_| format!("cannot parse number '{s}'"))
}

pub fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| format!("invalid date '{raw}'"))
}

fn parse_record(record: &csv::StringRecord) -> std::result::Result<RawDraw, String> {
    let get = |idx: usize| -> std::result::Result<&str, String> {
        record
            .get(idx)
            .map(str::trim)
            .ok_or_else(|| format!("missing field at index {idx}"))
    };
    let get_u8 = |idx: usize| -> std::result::Result<u8, String> {
        let s = get(idx)?;
        s.parse::<u8>()
            .map_err(|_| format!("cannot parse '{s}' (index {idx})"))
    };

    let draw_date = parse_date(get(2)?)?;
    let numbers = (5..=9).map(|i| get_u8(i)).collect::<std::result::Result<Vec<_>, _>>()?;
    let stars = (10..=11).map(|i| get_u8(i)).collect::<std::result::Result<Vec<_>, _>>()?;
    let prize = get(16).map(parse_french_decimal).unwrap_or(Ok(0.0)).unwrap_or(0.0);

    Ok(RawDraw {
        draw_date,
        numbers,
        stars,
        jackpot: (prize > 0.0).then_some(prize),
    })
}

/// Reads the semicolon-separated FDJ history export: date in column 2,
/// numbers in 5..=9, stars in 10..=11, rank-1 prize in 16.
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DrawProvider for CsvProvider {
    fn name(&self) -> &str {
        "fdj-csv"
    }

    fn fetch_latest_draws(&self, limit: usize) -> Result<Vec<RawRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| StatsError::Provider(format!("cannot open {:?}: {}", self.path, e)))?;

        let records = reader
            .records()
            .enumerate()
            .map(|(line, record)| match record {
                Ok(record) => parse_record(&record).map_err(|e| format!("line {}: {}", line + 2, e)),
                Err(e) => Err(format!("line {}: {}", line + 2, e)),
            })
            .collect();
        Ok(keep_latest(records, limit))
    }
}

/// Reads a JSON array of `{ "date", "numbers", "stars", "jackpot" }` objects,
/// the shape of the public results APIs.
pub struct JsonProvider {
    path: PathBuf,
}

impl JsonProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DrawProvider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    fn fetch_latest_draws(&self, limit: usize) -> Result<Vec<RawRecord>> {
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| StatsError::Provider(format!("cannot read {:?}: {}", self.path, e)))?;
        let draws: Vec<RawDraw> = serde_json::from_str(&json)
            .map_err(|e| StatsError::Provider(format!("invalid {:?}: {}", self.path, e)))?;
        Ok(keep_latest(draws.into_iter().map(Ok).collect(), limit))
    }
}

// ── Merge into the store ──

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub fetched: u32,
    pub inserted: u32,
    /// Dates already stored.
    pub skipped: u32,
    /// Records that failed decoding or structural validation.
    pub rejected: u32,
    /// Set when an inserted draw predates the stored history and the
    /// aggregates had to be replayed.
    pub rebuilt: bool,
}

pub fn sync(store: &dyn DrawStore, provider: &dyn DrawProvider, limit: usize) -> Result<SyncReport> {
    sync_with_progress(store, provider, limit, |_, _| {})
}

/// Fetches and validates, then merges every valid draw in one transaction:
/// a failure leaves the store exactly as it was.
/// `progress` receives `(done, total)` after each valid record.
pub fn sync_with_progress(
    store: &dyn DrawStore,
    provider: &dyn DrawProvider,
    limit: usize,
    progress: impl FnMut(usize, usize),
) -> Result<SyncReport> {
    let records = provider.fetch_latest_draws(limit).inspect_err(|e| {
        warn!(provider = provider.name(), error = %e, "provider fetch failed");
    })?;
    let mut report = SyncReport {
        fetched: records.len() as u32,
        ..SyncReport::default()
    };

    let mut valid = Vec::with_capacity(records.len());
    for record in records {
        match record.map_err(StatsError::Ingestion).and_then(|raw| raw.to_new_draw()) {
            Ok(draw) => valid.push(draw),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "record rejected");
                report.rejected += 1;
            }
        }
    }
    valid.sort_by_key(|d| d.draw_date);

    let merged = merge_draws(store, &valid, progress)?;
    report.inserted = merged.inserted.len() as u32;
    report.skipped = merged.duplicates.len() as u32;
    report.rebuilt = merged.replayed;

    info!(
        provider = provider.name(),
        fetched = report.fetched,
        inserted = report.inserted,
        skipped = report.skipped,
        rejected = report.rejected,
        "sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eurogenius_db::memory::{Fault, MemoryStore};
    use eurogenius_db::models::Window;
    use std::io::Write;

    const HEADER: &str = "annee_numero_de_tirage;jour_de_tirage;date_de_tirage;date_de_forclusion;numero_jokerplus;boule_1;boule_2;boule_3;boule_4;boule_5;etoile_1;etoile_2;a;b;c;nombre_de_gagnant_au_rang1;rapport_du_rang1";

    fn csv_file(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    fn row(date: &str, numbers: &str, stars: &str, prize: &str) -> String {
        format!("26001;MARDI;{date};x;x;{numbers};{stars};a;b;c;0;{prize}")
    }

    struct Unreachable;

    impl DrawProvider for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn fetch_latest_draws(&self, _limit: usize) -> Result<Vec<RawRecord>> {
            Err(StatsError::Provider("connection refused".into()))
        }
    }

    struct Fixed(Vec<RawDraw>);

    impl DrawProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_latest_draws(&self, limit: usize) -> Result<Vec<RawRecord>> {
            Ok(keep_latest(self.0.iter().cloned().map(Ok).collect(), limit))
        }
    }

    fn raw(day: u32, numbers: Vec<u8>, stars: Vec<u8>) -> RawDraw {
        RawDraw {
            draw_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            numbers,
            stars,
            jackpot: None,
        }
    }

    #[test]
    fn test_parse_french_decimal() {
        assert!((parse_french_decimal("109156,50").unwrap() - 109156.50).abs() < 0.001);
        assert!((parse_french_decimal("  42,5  ").unwrap() - 42.5).abs() < 0.001);
        assert_eq!(parse_french_decimal("").unwrap(), 0.0);
        assert!(parse_french_decimal("abc").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("17/02/2026").unwrap(), NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());
        assert_eq!(parse_date("2020-01-01").unwrap(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert!(parse_date("2020/01").is_err());
    }

    #[test]
    fn test_csv_provider_reads_fdj_rows() {
        let first = row("10/02/2026", "12;3;45;7;30", "9;2", "17000000,00");
        let second = row("13/02/2026", "1;2;3;4;5", "1;2", "0");
        let broken = row("14/02/2026", "1;2;x;4;5", "1;2", "0");
        let file = csv_file(&[&second, &first, &broken]);

        let records = CsvProvider::new(file.path()).fetch_latest_draws(10).unwrap();
        assert_eq!(records.len(), 3);
        let latest = records[0].as_ref().unwrap();
        assert_eq!(latest.draw_date, NaiveDate::from_ymd_opt(2026, 2, 13).unwrap());
        assert_eq!(latest.jackpot, None);
        let older = records[1].as_ref().unwrap();
        assert_eq!(older.numbers, vec![12, 3, 45, 7, 30]);
        assert_eq!(older.jackpot, Some(17_000_000.0));
        assert!(records[2].is_err());

        let limited = CsvProvider::new(file.path()).fetch_latest_draws(1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_json_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"date":"2024-03-01","numbers":[1,2,3,4,5],"stars":[1,2],"jackpot":130000000.0}},
                {{"date":"2024-03-05","numbers":[6,7,8,9,10],"stars":[3,4]}}]"#
        )
        .unwrap();
        let records = JsonProvider::new(file.path()).fetch_latest_draws(5).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().numbers, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_raw_draw_validation() {
        assert!(raw(1, vec![5, 1, 2, 3, 4], vec![2, 1]).to_new_draw().is_ok());
        let short = raw(1, vec![1, 2, 3, 4], vec![1, 2]).to_new_draw();
        assert!(matches!(short, Err(StatsError::Ingestion(_))));
        let dup = raw(1, vec![1, 2, 3, 4, 4], vec![1, 2]).to_new_draw();
        assert!(matches!(dup, Err(StatsError::Ingestion(_))));
        let star = raw(1, vec![1, 2, 3, 4, 5], vec![1, 13]).to_new_draw();
        assert!(matches!(star, Err(StatsError::Ingestion(_))));
    }

    #[test]
    fn test_sync_merges_idempotently() {
        let store = MemoryStore::new();
        let provider = Fixed(vec![
            raw(5, vec![6, 7, 8, 9, 10], vec![3, 4]),
            raw(1, vec![1, 2, 3, 4, 5], vec![1, 2]),
            raw(8, vec![1, 2, 3, 4, 60], vec![1, 2]),
        ]);

        let mut calls = 0;
        let report = sync_with_progress(&store, &provider, 10, |_, _| calls += 1).unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected, 1);
        assert!(!report.rebuilt);
        assert_eq!(calls, 2);

        let draws = store.query_draws(Window::All).unwrap();
        assert_eq!(draws[0].draw_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(store.query_catalog().unwrap().numbers[0].frequency, 1);

        let again = sync(&store, &provider, 10).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(store.query_catalog().unwrap().numbers[0].frequency, 1);
    }

    #[test]
    fn test_backfill_replays_aggregates() {
        let store = MemoryStore::new();
        sync(&store, &Fixed(vec![raw(10, vec![1, 2, 3, 4, 5], vec![1, 2])]), 10).unwrap();
        let report = sync(&store, &Fixed(vec![raw(3, vec![1, 6, 7, 8, 9], vec![1, 3])]), 10).unwrap();
        assert!(report.rebuilt);

        let catalog = store.query_catalog().unwrap();
        let one = &catalog.numbers[0];
        assert_eq!(one.frequency, 2);
        assert_eq!(one.current_gap, 0);
        assert_eq!(catalog.numbers[5].current_gap, 1);
    }

    #[test]
    fn test_failed_backfill_sync_rolls_back() {
        let store = MemoryStore::new();
        sync(&store, &Fixed(vec![raw(10, vec![1, 2, 3, 4, 5], vec![1, 2])]), 10).unwrap();
        let before = store.query_catalog().unwrap();

        let provider = Fixed(vec![
            raw(3, vec![1, 6, 7, 8, 9], vec![1, 3]),
            raw(12, vec![20, 21, 22, 23, 24], vec![5, 6]),
        ]);
        // fails while replaying the second of three draws
        store.set_fault(Fault::FailTupleUpsert(30));
        assert!(matches!(sync(&store, &provider, 10), Err(StatsError::TransactionFailure(_))));

        store.set_fault(Fault::None);
        assert_eq!(store.draw_count().unwrap(), 1);
        assert_eq!(store.query_catalog().unwrap(), before);

        let report = sync(&store, &provider, 10).unwrap();
        assert_eq!(report.inserted, 2);
        assert!(report.rebuilt);
        let synced = store.query_catalog().unwrap();
        crate::ingest::rebuild_aggregates(&store).unwrap();
        assert_eq!(store.query_catalog().unwrap(), synced);
    }

    #[test]
    fn test_provider_failure_leaves_store_untouched() {
        let store = MemoryStore::new();
        let err = sync(&store, &Unreachable, 10).unwrap_err();
        assert!(matches!(err, StatsError::Provider(_)));
        assert_eq!(store.draw_count().unwrap(), 0);
    }

    #[test]
    fn test_unavailable_store_surfaces() {
        let store = MemoryStore::new();
        store.set_fault(Fault::Unavailable);
        let provider = Fixed(vec![raw(1, vec![1, 2, 3, 4, 5], vec![1, 2])]);
        assert!(matches!(sync(&store, &provider, 10), Err(StatsError::StoreUnavailable(_))));
    }
}
