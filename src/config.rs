//! Coordination store configuration
//!
//! Optional overrides live in `<store>/config.yaml`; everything has a
//! working default so a fresh store needs no config file at all.

use crate::error::{CoordError, CoordResult};
use crate::storage::Store;
use serde::{Deserialize, Serialize};

/// Default lock time-to-live in hours
pub const DEFAULT_LOCK_TTL_HOURS: i64 = 24;

/// Default overlap threshold for the planner, matching the original
/// 30% conflict boundary
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Default ceiling on concurrently running agents
pub const DEFAULT_MAX_AGENTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordConfig {
    /// Locks older than this are purged lazily on the next claim or check
    pub lock_ttl_hours: i64,
    /// Overlap thresholds the planner evaluates when none are given
    pub thresholds: Vec<f64>,
    /// Ceiling applied to the safe-group size before recommending agents
    pub max_agents: usize,
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            lock_ttl_hours: DEFAULT_LOCK_TTL_HOURS,
            thresholds: vec![DEFAULT_THRESHOLD],
            max_agents: DEFAULT_MAX_AGENTS,
        }
    }
}

impl CoordConfig {
    /// Load config from the store, using defaults when no file exists.
    /// A malformed file is a store error, not a silent fallback.
    pub fn load(store: &Store) -> CoordResult<Self> {
        let path = store.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| CoordError::Store(format!("Failed to read {:?}: {}", path, e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| CoordError::Store(format!("Failed to parse {:?}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ensure_dir;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::for_project(temp_dir.path());
        let config = CoordConfig::load(&store).unwrap();
        assert_eq!(config.lock_ttl_hours, 24);
        assert_eq!(config.thresholds, vec![0.3]);
        assert_eq!(config.max_agents, 5);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::for_project(temp_dir.path());
        ensure_dir(store.root()).unwrap();
        std::fs::write(store.config_path(), "lock_ttl_hours: 48\n").unwrap();

        let config = CoordConfig::load(&store).unwrap();
        assert_eq!(config.lock_ttl_hours, 48);
        // Untouched fields keep their defaults
        assert_eq!(config.max_agents, 5);
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::for_project(temp_dir.path());
        ensure_dir(store.root()).unwrap();
        std::fs::write(store.config_path(), "thresholds: {bad").unwrap();

        assert!(CoordConfig::load(&store).is_err());
    }
}
