use eurogenius_db::models::Pool;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Entities forced into, or kept out of, a generated combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub include_numbers: Vec<u8>,
    pub exclude_numbers: Vec<u8>,
    pub include_stars: Vec<u8>,
    pub exclude_stars: Vec<u8>,
}

impl Constraints {
    pub fn include(&self, pool: Pool) -> &[u8] {
        match pool {
            Pool::Numbers => &self.include_numbers,
            Pool::Stars => &self.include_stars,
        }
    }

    pub fn exclude(&self, pool: Pool) -> &[u8] {
        match pool {
            Pool::Numbers => &self.exclude_numbers,
            Pool::Stars => &self.exclude_stars,
        }
    }

    pub fn is_empty(&self) -> bool {
        Pool::ALL
            .iter()
            .all(|&p| self.include(p).is_empty() && self.exclude(p).is_empty())
    }

    /// Checks both pools. Runs before any entity is picked.
    pub fn validate(&self) -> Result<()> {
        for pool in Pool::ALL {
            check_pool(pool, self.include(pool), self.exclude(pool))?;
        }
        Ok(())
    }
}

fn check_set(pool: Pool, set: &[u8], kind: &str) -> Result<()> {
    for (i, &value) in set.iter().enumerate() {
        if !pool.contains(value) {
            return Err(StatsError::validation(format!(
                "{} {} out of range (1-{})",
                pool.label(),
                value,
                pool.size()
            )));
        }
        if set[..i].contains(&value) {
            return Err(StatsError::validation(format!(
                "{kind} {pool} must not contain duplicates: {value}"
            )));
        }
    }
    Ok(())
}

fn check_pool(pool: Pool, include: &[u8], exclude: &[u8]) -> Result<()> {
    check_set(pool, include, "included")?;
    check_set(pool, exclude, "excluded")?;

    if include.len() > pool.pick_count() {
        return Err(StatsError::validation(format!(
            "at most {} {pool} can be included, got {}",
            pool.pick_count(),
            include.len()
        )));
    }
    if let Some(value) = include.iter().find(|v| exclude.contains(v)) {
        return Err(StatsError::validation(format!(
            "{} {} cannot be both included and excluded",
            pool.label(),
            value
        )));
    }

    // includes and excludes are disjoint here
    let remaining = pool.size().saturating_sub(exclude.len() + include.len());
    let needed = pool.pick_count() - include.len();
    if remaining < needed {
        return Err(StatsError::validation(format!(
            "only {remaining} {pool} left after exclusions, {needed} needed"
        )));
    }
    Ok(())
}
