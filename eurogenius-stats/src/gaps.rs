use eurogenius_db::models::{Draw, Pool};
use serde::Serialize;

use crate::round_to;

/// Gap history of one entity, rebuilt from the draw sequence on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapRecord {
    pub value: u8,
    /// Index in the ascending window of the latest appearance.
    pub last_appearance_index: Option<usize>,
    pub current_gap: u32,
    pub max_gap: u32,
    /// Mean of the gaps between consecutive appearances, 2 decimals; 0 if
    /// the entity never recurred.
    pub average_gap: f64,
    pub appearances: u32,
    /// `current_gap / average_gap`, 2 decimals; absent when the average is 0.
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapAnalysis {
    pub window_size: u32,
    pub numbers: Vec<GapRecord>,
    pub stars: Vec<GapRecord>,
}

#[derive(Default)]
struct Walk {
    last: Option<usize>,
    current_gap: u32,
    max_gap: u32,
    gaps: Vec<u32>,
}

/// Walks `draws` (ascending) once and reports one record per entity of `pool`.
pub fn gap_records(draws: &[Draw], pool: Pool) -> Vec<GapRecord> {
    let mut walks: Vec<Walk> = (0..pool.size()).map(|_| Walk::default()).collect();

    for (index, draw) in draws.iter().enumerate() {
        let drawn = pool.entities_from(draw);
        for (i, walk) in walks.iter_mut().enumerate() {
            let value = (i + 1) as u8;
            if drawn.contains(&value) {
                if let Some(last) = walk.last {
                    let gap = (index - last) as u32;
                    walk.gaps.push(gap);
                    walk.max_gap = walk.max_gap.max(gap);
                }
                walk.last = Some(index);
                walk.current_gap = 0;
            } else if let Some(last) = walk.last {
                walk.current_gap = (index - last) as u32;
            }
        }
    }

    walks
        .into_iter()
        .zip(pool.entities())
        .map(|(walk, value)| {
            let appearances = if walk.last.is_some() {
                walk.gaps.len() as u32 + 1
            } else {
                0
            };
            let current_gap = if walk.last.is_some() {
                walk.current_gap
            } else {
                draws.len() as u32
            };
            let average = if walk.gaps.is_empty() {
                0.0
            } else {
                walk.gaps.iter().map(|&g| g as f64).sum::<f64>() / walk.gaps.len() as f64
            };
            GapRecord {
                value,
                last_appearance_index: walk.last,
                current_gap,
                max_gap: walk.max_gap,
                average_gap: round_to(average, 2),
                appearances,
                ratio: (average > 0.0).then(|| round_to(current_gap as f64 / average, 2)),
            }
        })
        .collect()
}

pub fn gap_analysis(draws: &[Draw]) -> GapAnalysis {
    GapAnalysis {
        window_size: draws.len() as u32,
        numbers: gap_records(draws, Pool::Numbers),
        stars: gap_records(draws, Pool::Stars),
    }
}
