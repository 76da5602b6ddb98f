use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Engine tuning. Serialized as JSON next to the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Draws in the `recent` hot/cold period.
    pub recent_window: u32,
    /// Draws in the `medium` hot/cold period.
    pub medium_window: u32,
    /// Upper bound of the `all` hot/cold period.
    pub all_window_cap: u32,
    /// A number is hot in a window of `w` draws when seen `max(1, w / divisor)` times.
    pub number_hot_divisor: u32,
    pub star_hot_divisor: u32,
    pub default_top_k: usize,
    pub dashboard_top_k: usize,
    pub max_batch: usize,
    pub store_timeout_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            recent_window: 20,
            medium_window: 50,
            all_window_cap: 1000,
            number_hot_divisor: 25,
            star_hot_divisor: 12,
            default_top_k: 20,
            dashboard_top_k: 10,
            max_batch: 10,
            store_timeout_ms: 2000,
        }
    }
}

impl StatsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| StatsError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config: StatsConfig = serde_json::from_str(&json)
            .map_err(|e| StatsError::Config(format!("invalid {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StatsError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| StatsError::Config(format!("cannot write {:?}: {}", path, e)))
    }

    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("recent_window", self.recent_window),
            ("medium_window", self.medium_window),
            ("all_window_cap", self.all_window_cap),
            ("number_hot_divisor", self.number_hot_divisor),
            ("star_hot_divisor", self.star_hot_divisor),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(StatsError::Config(format!("{name} must be positive")));
            }
        }
        if self.max_batch == 0 {
            return Err(StatsError::Config("max_batch must be positive".into()));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StatsConfig::default();
        assert_eq!(config.recent_window, 20);
        assert_eq!(config.medium_window, 50);
        assert_eq!(config.all_window_cap, 1000);
        assert!(config.validate().is_ok());
        assert_eq!(config.store_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, r#"{ "recent_window": 30 }"#).unwrap();
        let config = StatsConfig::load(&path).unwrap();
        assert_eq!(config.recent_window, 30);
        assert_eq!(config.medium_window, 50);
    }

    #[test]
    fn test_save_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let config = StatsConfig {
            star_hot_divisor: 6,
            ..StatsConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(StatsConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = StatsConfig {
            number_hot_divisor: 0,
            ..StatsConfig::default()
        };
        assert!(matches!(config.validate(), Err(StatsError::Config(_))));
    }
}
