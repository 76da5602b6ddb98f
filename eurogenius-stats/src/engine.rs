use std::sync::Arc;

use chrono::NaiveDate;
use eurogenius_db::models::{Draw, NewDraw, Window};
use eurogenius_db::store::{DrawStore, StoreError};
use serde::Serialize;
use tracing::warn;

use crate::catalog::{CatalogView, catalog_view};
use crate::config::StatsConfig;
use crate::cooccurrence::{self, TupleFrequency};
use crate::error::Result;
use crate::frequency::{FrequencyTable, PositionalCount, frequency_table, positional_distribution};
use crate::gaps::{GapAnalysis, gap_analysis};
use crate::generator::{self, Combination, Constraints, Profile, RandomSource, Strategy};
use crate::hotcold::{Period, WindowedHotCold, windowed_hot_cold};
use crate::ingest::{self, RecordOutcome};
use crate::provider::{self, DrawProvider, SyncReport};
use crate::schedule;
use crate::simulated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Computed from the stored history.
    Store,
    /// The store was unreachable; theoretical uniform values.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report<T> {
    pub origin: Origin,
    pub data: T,
}

impl<T> Report<T> {
    pub fn stored(data: T) -> Self {
        Self {
            origin: Origin::Store,
            data,
        }
    }

    pub fn simulated(data: T) -> Self {
        Self {
            origin: Origin::Simulated,
            data,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.origin == Origin::Simulated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub catalog: CatalogView,
    pub top_pairs: Vec<TupleFrequency>,
    pub top_triplets: Vec<TupleFrequency>,
}

/// Entry point for every statistic and generator, over any [`DrawStore`].
///
/// Reads fall back to [`simulated`] results when the store reports
/// [`StoreError::Unavailable`]; writes never do.
#[derive(Clone)]
pub struct StatsEngine {
    store: Arc<dyn DrawStore>,
    config: StatsConfig,
}

impl StatsEngine {
    pub fn new(store: Arc<dyn DrawStore>, config: StatsConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &dyn DrawStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    fn read<T>(
        &self,
        operation: &str,
        query: impl FnOnce(&dyn DrawStore) -> std::result::Result<T, StoreError>,
        fallback: impl FnOnce() -> T,
    ) -> Result<Report<T>> {
        match query(self.store()) {
            Ok(data) => Ok(Report::stored(data)),
            Err(e) if e.is_unavailable() => {
                warn!(operation, error = %e, "store unavailable, serving simulated result");
                Ok(Report::simulated(fallback()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn fallback_size(&self, window: Window) -> u32 {
        window.limit().unwrap_or(0)
    }

    /// Raw draws, ascending. No simulated fallback.
    pub fn draws(&self, window: Window) -> Result<Vec<Draw>> {
        Ok(self.store.query_draws(window)?)
    }

    pub fn draw_count(&self) -> Result<u32> {
        Ok(self.store.draw_count()?)
    }

    pub fn frequencies(&self, window: Window) -> Result<Report<FrequencyTable>> {
        let size = self.fallback_size(window);
        self.read(
            "frequencies",
            |store| Ok(frequency_table(&store.query_draws(window)?)),
            || simulated::frequency_table(size),
        )
    }

    pub fn positions(&self, window: Window) -> Result<Report<Vec<PositionalCount>>> {
        self.read(
            "positions",
            |store| Ok(positional_distribution(&store.query_draws(window)?)),
            || positional_distribution(&[]),
        )
    }

    pub fn gaps(&self, window: Window) -> Result<Report<GapAnalysis>> {
        let size = self.fallback_size(window);
        self.read(
            "gaps",
            |store| Ok(gap_analysis(&store.query_draws(window)?)),
            || simulated::gap_analysis(size),
        )
    }

    /// Over the whole history the stored counters are read together with the
    /// draw count they are relative to; a bounded window is rescanned.
    pub fn top_pairs(&self, window: Window, limit: usize) -> Result<Report<Vec<TupleFrequency>>> {
        self.read(
            "pairs",
            |store| match window {
                Window::All => {
                    let snapshot = store.query_snapshot(limit, 0)?;
                    Ok(cooccurrence::from_stored(&snapshot.pairs, snapshot.catalog.draw_count))
                }
                Window::Last(_) => Ok(cooccurrence::top_pairs(&store.query_draws(window)?, limit)),
            },
            Vec::new,
        )
    }

    pub fn top_triplets(&self, window: Window, limit: usize) -> Result<Report<Vec<TupleFrequency>>> {
        self.read(
            "triplets",
            |store| match window {
                Window::All => {
                    let snapshot = store.query_snapshot(0, limit)?;
                    Ok(cooccurrence::from_stored(&snapshot.triplets, snapshot.catalog.draw_count))
                }
                Window::Last(_) => Ok(cooccurrence::top_triplets(&store.query_draws(window)?, limit)),
            },
            Vec::new,
        )
    }

    /// Windowed hot/cold sets, computed on demand.
    pub fn hot_cold(&self, period: Period) -> Result<Report<WindowedHotCold>> {
        let window = Window::Last(period.window(&self.config));
        self.read(
            "hot_cold",
            |store| Ok(windowed_hot_cold(&store.query_draws(window)?, period, &self.config)),
            || simulated::hot_cold(period, &self.config),
        )
    }

    /// Stored per-entity rows with their mean-relative classes.
    pub fn catalog(&self) -> Result<Report<CatalogView>> {
        self.read(
            "catalog",
            |store| Ok(catalog_view(&store.query_catalog()?)),
            || catalog_view(&simulated::uniform_catalog()),
        )
    }

    pub fn dashboard(&self) -> Result<Report<Dashboard>> {
        let k = self.config.dashboard_top_k;
        self.read(
            "dashboard",
            |store| {
                let snapshot = store.query_snapshot(k, k)?;
                let total = snapshot.catalog.draw_count;
                Ok(Dashboard {
                    top_pairs: cooccurrence::from_stored(&snapshot.pairs, total),
                    top_triplets: cooccurrence::from_stored(&snapshot.triplets, total),
                    catalog: catalog_view(&snapshot.catalog),
                })
            },
            || Dashboard {
                catalog: catalog_view(&simulated::uniform_catalog()),
                top_pairs: Vec::new(),
                top_triplets: Vec::new(),
            },
        )
    }

    /// `count` combinations, confidence decreasing along the batch.
    /// Invalid requests fail before the store is touched.
    pub fn generate(
        &self,
        strategy: Strategy,
        constraints: &Constraints,
        count: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<Report<Vec<Combination>>> {
        constraints.validate()?;
        let max_batch = self.config.max_batch;
        match self.store.query_catalog() {
            Ok(catalog) => {
                let profile = Profile::from_catalog(&catalog);
                let batch = generator::generate_batch(&profile, strategy, constraints, count, max_batch, rng)?;
                Ok(Report::stored(batch))
            }
            Err(e) if e.is_unavailable() => {
                warn!(operation = "generate", error = %e, "store unavailable, serving simulated result");
                let batch = simulated::generate(strategy, constraints, count, max_batch, rng)?;
                Ok(Report::simulated(batch))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Next scheduled draw after the latest stored one. Without history, or
    /// when the store is unreachable, the next Friday after `today`.
    pub fn next_draw_date(&self, today: NaiveDate) -> Result<Report<NaiveDate>> {
        let latest = match self.store.query_draws(Window::Last(1)) {
            Ok(mut draws) => draws.pop().map(|d| d.draw_date),
            Err(e) if e.is_unavailable() => {
                warn!(operation = "next_draw_date", error = %e, "store unavailable, serving simulated result");
                return Ok(Report::simulated(schedule::next_friday_after(today)?));
            }
            Err(e) => return Err(e.into()),
        };
        let next = match latest {
            Some(date) => schedule::next_draw_after(date)?,
            None => schedule::next_friday_after(today)?,
        };
        Ok(Report::stored(next))
    }

    pub fn record_draw(&self, draw: &NewDraw) -> Result<RecordOutcome> {
        ingest::record_draw(self.store(), draw)
    }

    pub fn ingest_draw(&self, draw: &Draw) -> Result<()> {
        ingest::ingest_draw(self.store(), draw)
    }

    pub fn rebuild(&self) -> Result<u32> {
        ingest::rebuild_aggregates(self.store())
    }

    pub fn sync(
        &self,
        provider: &dyn DrawProvider,
        limit: usize,
        progress: impl FnMut(usize, usize),
    ) -> Result<SyncReport> {
        provider::sync_with_progress(self.store(), provider, limit, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use crate::generator::RngSource;
    use crate::hotcold::Heat;
    use crate::test_support::new_draw_with;
    use eurogenius_db::db::SqliteStore;
    use eurogenius_db::memory::{Fault, MemoryStore};
    use eurogenius_db::models::make_test_draws;
    use std::time::Duration;

    fn engine_with(store: Arc<dyn DrawStore>, draws: &[NewDraw]) -> StatsEngine {
        let engine = StatsEngine::new(store, StatsConfig::default());
        for draw in draws {
            engine.record_draw(draw).unwrap();
        }
        engine
    }

    fn memory_engine(n: usize) -> (Arc<MemoryStore>, StatsEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone(), &make_test_draws(n));
        (store, engine)
    }

    #[test]
    fn test_stored_and_scanned_views_agree() {
        let (_, engine) = memory_engine(25);
        let stored = engine.top_pairs(Window::All, 15).unwrap();
        let scanned = engine.top_pairs(Window::Last(1000), 15).unwrap();
        assert_eq!(stored.origin, Origin::Store);
        assert_eq!(stored.data, scanned.data);

        let stored = engine.top_triplets(Window::All, 5).unwrap();
        let scanned = engine.top_triplets(Window::Last(25), 5).unwrap();
        assert_eq!(stored.data, scanned.data);
    }

    #[test]
    fn test_sqlite_and_memory_backends_agree() {
        let draws = make_test_draws(30);
        let memory = engine_with(Arc::new(MemoryStore::new()), &draws);
        let sqlite = engine_with(
            Arc::new(SqliteStore::open_in_memory(Duration::from_secs(1)).unwrap()),
            &draws,
        );
        assert_eq!(memory.catalog().unwrap(), sqlite.catalog().unwrap());
        assert_eq!(memory.dashboard().unwrap(), sqlite.dashboard().unwrap());
        assert_eq!(
            memory.gaps(Window::Last(12)).unwrap(),
            sqlite.gaps(Window::Last(12)).unwrap()
        );
    }

    #[test]
    fn test_unavailable_store_degrades_reads() {
        let (store, engine) = memory_engine(5);
        store.set_fault(Fault::Unavailable);

        let freq = engine.frequencies(Window::Last(20)).unwrap();
        assert!(freq.is_simulated());
        assert_eq!(freq.data.numbers[0].frequency, 0.1);

        assert!(engine.gaps(Window::All).unwrap().is_simulated());
        assert!(engine.top_pairs(Window::All, 10).unwrap().data.is_empty());
        assert!(engine.hot_cold(Period::Medium).unwrap().is_simulated());
        assert!(engine.dashboard().unwrap().is_simulated());
        assert!(engine.catalog().unwrap().data.numbers.classes.hot.is_empty());

        let batch = engine
            .generate(Strategy::Hot, &Constraints::default(), 3, &mut RngSource::seeded(1))
            .unwrap();
        assert!(batch.is_simulated());
        assert_eq!(batch.data.len(), 3);

        // writes and raw listings never fall back
        assert!(matches!(engine.draws(Window::All), Err(StatsError::StoreUnavailable(_))));
        let err = engine.record_draw(&new_draw_with(40, [1, 2, 3, 4, 5], [1, 2])).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(engine.rebuild(), Err(StatsError::StoreUnavailable(_))));
    }

    #[test]
    fn test_validation_is_never_degraded() {
        let (store, engine) = memory_engine(5);
        store.set_fault(Fault::Unavailable);
        let constraints = Constraints {
            include_numbers: vec![5, 5],
            ..Constraints::default()
        };
        let err = engine
            .generate(Strategy::Balanced, &constraints, 1, &mut RngSource::seeded(1))
            .unwrap_err();
        assert!(matches!(err, StatsError::Validation(_)));
        let err = engine
            .generate(Strategy::Balanced, &Constraints::default(), 11, &mut RngSource::seeded(1))
            .unwrap_err();
        assert!(matches!(err, StatsError::Validation(_)));
    }

    fn dated(date: &str) -> NewDraw {
        NewDraw::new(date.parse().unwrap(), [1, 2, 3, 4, 5], [1, 2], None).unwrap()
    }

    #[test]
    fn test_next_draw_date() {
        let today: NaiveDate = "2024-03-06".parse().unwrap();
        let engine = engine_with(Arc::new(MemoryStore::new()), &[]);
        // no history: next Friday
        let next = engine.next_draw_date(today).unwrap();
        assert_eq!(next, Report::stored("2024-03-08".parse().unwrap()));

        engine.record_draw(&dated("2024-03-05")).unwrap();
        assert_eq!(engine.next_draw_date(today).unwrap().data, "2024-03-08".parse().unwrap());

        engine.record_draw(&dated("2024-03-08")).unwrap();
        assert_eq!(engine.next_draw_date(today).unwrap().data, "2024-03-12".parse().unwrap());
    }

    #[test]
    fn test_next_draw_date_degrades() {
        let (store, engine) = memory_engine(3);
        store.set_fault(Fault::Unavailable);
        let next = engine.next_draw_date("2024-03-08".parse().unwrap()).unwrap();
        assert!(next.is_simulated());
        assert_eq!(next.data, "2024-03-15".parse().unwrap());
    }

    #[test]
    fn test_backdated_record_on_both_backends() {
        let mut history = make_test_draws(12);
        let in_order = engine_with(Arc::new(MemoryStore::new()), &history);
        let late = history.remove(0);
        history.push(late);
        let memory = engine_with(Arc::new(MemoryStore::new()), &history);
        let sqlite = engine_with(
            Arc::new(SqliteStore::open_in_memory(Duration::from_secs(1)).unwrap()),
            &history,
        );
        let expected = in_order.catalog().unwrap();
        assert_eq!(memory.catalog().unwrap(), expected);
        assert_eq!(sqlite.catalog().unwrap(), expected);
        assert_eq!(sqlite.dashboard().unwrap(), in_order.dashboard().unwrap());
    }

    #[test]
    fn test_dashboard_is_one_snapshot() {
        let (_, engine) = memory_engine(20);
        let store = engine.store();
        let dashboard = engine.dashboard().unwrap().data;
        let snapshot = store.query_snapshot(10, 10).unwrap();
        assert_eq!(dashboard.catalog.draw_count, snapshot.catalog.draw_count);
        let counts: Vec<u32> = dashboard.top_pairs.iter().map(|p| p.count).collect();
        let stored: Vec<u32> = snapshot.pairs.iter().map(|p| p.frequency).collect();
        assert_eq!(counts, stored);
    }

    #[test]
    fn test_hot_generation_uses_stored_flags() {
        // 1..=5 drawn in every one of 20 draws except the last
        let mut draws: Vec<NewDraw> = (0..19).map(|i| new_draw_with(i, [1, 2, 3, 4, 5], [1, 2])).collect();
        draws.push(new_draw_with(19, [6, 7, 8, 9, 10], [3, 4]));
        let engine = engine_with(Arc::new(MemoryStore::new()), &draws);

        let constraints = Constraints {
            include_numbers: vec![40, 41],
            ..Constraints::default()
        };
        let report = engine
            .generate(Strategy::Hot, &constraints, 1, &mut RngSource::seeded(9))
            .unwrap();
        let combo = &report.data[0];
        assert_eq!(report.origin, Origin::Store);
        assert!(combo.numbers.contains(&40) && combo.numbers.contains(&41));
        let hot = combo.numbers.iter().filter(|n| (1..=5).contains(*n)).count();
        assert_eq!(hot, 3);
        assert_eq!(combo.stars, [1, 2]);

        let catalog = engine.catalog().unwrap().data;
        assert_eq!(catalog.numbers.by_frequency[0].heat, Heat::Hot);
        assert_eq!(catalog.numbers.by_gap[0].value, 11);
    }

    #[test]
    fn test_hot_cold_windows() {
        let (_, engine) = memory_engine(60);
        let recent = engine.hot_cold(Period::Recent).unwrap().data;
        assert_eq!(recent.window_size, 20);
        let all = engine.hot_cold(Period::All).unwrap().data;
        assert_eq!(all.window_size, 60);
        assert_eq!(all.numbers.threshold, 2);
    }

    #[test]
    fn test_dashboard_limits() {
        let (_, engine) = memory_engine(30);
        let dashboard = engine.dashboard().unwrap().data;
        assert_eq!(dashboard.top_pairs.len(), 10);
        assert_eq!(dashboard.top_triplets.len(), 10);
        assert_eq!(dashboard.catalog.draw_count, 30);
        assert_eq!(dashboard.top_pairs[0].count, 3);
        assert_eq!(dashboard.top_pairs[0].percentage, 10.0);
    }

    #[test]
    fn test_reads_never_see_partial_ingestion() {
        let store = Arc::new(MemoryStore::new());
        let engine = StatsEngine::new(store, StatsConfig::default());
        let draws = make_test_draws(40);

        std::thread::scope(|scope| {
            let writer = engine.clone();
            scope.spawn(move || {
                for draw in &draws {
                    writer.record_draw(draw).unwrap();
                }
            });
            for _ in 0..200 {
                let catalog = engine.store().query_catalog().unwrap();
                let numbers: u32 = catalog.numbers.iter().map(|s| s.frequency).sum();
                let stars: u32 = catalog.stars.iter().map(|s| s.frequency).sum();
                assert_eq!(numbers, 5 * catalog.draw_count);
                assert_eq!(stars, 2 * catalog.draw_count);
            }
        });
        assert_eq!(engine.draw_count().unwrap(), 40);
    }
}
