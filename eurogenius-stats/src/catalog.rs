use eurogenius_db::models::{Catalog, EntityStat, Pool};
use serde::Serialize;

use crate::frequency::ratio;
use crate::hotcold::{Heat, MeanRelativeClasses, mean_frequency, mean_relative_classes, mean_relative_heat};
use crate::round_to;

/// One stored stat row, annotated for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub value: u8,
    pub frequency: u32,
    pub percentage: f64,
    pub current_gap: u32,
    pub average_gap: f64,
    pub max_gap: u32,
    /// `current_gap / average_gap`, absent while the average is 0.
    pub gap_ratio: Option<f64>,
    pub heat: Heat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolView {
    /// Frequency descending, then value.
    pub by_frequency: Vec<EntityView>,
    /// Current gap descending, then value.
    pub by_gap: Vec<EntityView>,
    pub classes: MeanRelativeClasses,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogView {
    pub draw_count: u32,
    pub numbers: PoolView,
    pub stars: PoolView,
}

fn entity_view(stat: &EntityStat, mean: f64, draw_count: u32) -> EntityView {
    EntityView {
        value: stat.value,
        frequency: stat.frequency,
        percentage: round_to(ratio(stat.frequency, draw_count) * 100.0, 2),
        current_gap: stat.current_gap,
        average_gap: round_to(stat.average_gap, 2),
        max_gap: stat.max_gap,
        gap_ratio: (stat.average_gap > 0.0)
            .then(|| round_to(stat.current_gap as f64 / stat.average_gap, 2)),
        heat: mean_relative_heat(stat, mean),
    }
}

fn pool_view(stats: &[EntityStat], draw_count: u32) -> PoolView {
    let mean = mean_frequency(stats);
    let views: Vec<EntityView> = stats.iter().map(|s| entity_view(s, mean, draw_count)).collect();

    let mut by_frequency = views.clone();
    by_frequency.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.value.cmp(&b.value)));
    let mut by_gap = views;
    by_gap.sort_by(|a, b| b.current_gap.cmp(&a.current_gap).then(a.value.cmp(&b.value)));

    PoolView {
        by_frequency,
        by_gap,
        classes: mean_relative_classes(stats, draw_count),
    }
}

pub fn catalog_view(catalog: &Catalog) -> CatalogView {
    CatalogView {
        draw_count: catalog.draw_count,
        numbers: pool_view(catalog.stats(Pool::Numbers), catalog.draw_count),
        stars: pool_view(catalog.stats(Pool::Stars), catalog.draw_count),
    }
}
