// agent-memory/crates/agent-memory/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_STORAGE_LOCATION: &str = "data/agent_memory.db";
pub const DEFAULT_MAX_CONTEXT_ENTRIES: usize = 10;

pub const ENV_STORAGE_LOCATION: &str = "AGENT_MEMORY_DB_PATH";
pub const ENV_MAX_CONTEXT_ENTRIES: &str = "AGENT_MEMORY_MAX_CONTEXT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Backing SQLite file.
    pub storage_location: PathBuf,
    /// Default `limit` for recency queries.
    pub max_context_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            storage_location: PathBuf::from(DEFAULT_STORAGE_LOCATION),
            max_context_entries: DEFAULT_MAX_CONTEXT_ENTRIES,
        }
    }
}

impl MemoryConfig {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_location = lookup(ENV_STORAGE_LOCATION)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_LOCATION));

        let max_context_entries = match lookup(ENV_MAX_CONTEXT_ENTRIES) {
            Some(raw) => raw.trim().parse().with_context(|| {
                format!("{} must be a non-negative integer, got '{}'", ENV_MAX_CONTEXT_ENTRIES, raw)
            })?,
            None => DEFAULT_MAX_CONTEXT_ENTRIES,
        };

        Ok(Self {
            storage_location,
            max_context_entries,
        })
    }

    pub fn with_storage_location(mut self, path: impl AsRef<Path>) -> Self {
        self.storage_location = path.as_ref().to_path_buf();
        self
    }

    pub fn with_max_context_entries(mut self, max: usize) -> Self {
        self.max_context_entries = max;
        self
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Storage Location: {}", self.storage_location.display());
        info!("- Max Context Entries: {}", self.max_context_entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ===== Defaults =====

    #[test]
    fn test_default_values() {
        let config = MemoryConfig::default();
        assert_eq!(config.storage_location, PathBuf::from("data/agent_memory.db"));
        assert_eq!(config.max_context_entries, 10);
    }

    #[test]
    fn test_lookup_without_keys_uses_defaults() {
        let config = MemoryConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, MemoryConfig::default());
    }

    // ===== Overrides =====

    #[test]
    fn test_lookup_overrides() {
        let config = MemoryConfig::from_lookup(lookup_from(&[
            (ENV_STORAGE_LOCATION, "/var/lib/robot/memory.db"),
            (ENV_MAX_CONTEXT_ENTRIES, " 25 "),
        ]))
        .unwrap();

        assert_eq!(config.storage_location, PathBuf::from("/var/lib/robot/memory.db"));
        assert_eq!(config.max_context_entries, 25);
    }

    #[test]
    fn test_blank_path_falls_back_to_default() {
        let config =
            MemoryConfig::from_lookup(lookup_from(&[(ENV_STORAGE_LOCATION, "  ")])).unwrap();
        assert_eq!(config.storage_location, PathBuf::from(DEFAULT_STORAGE_LOCATION));
    }

    #[test]
    fn test_zero_max_context_is_allowed() {
        let config =
            MemoryConfig::from_lookup(lookup_from(&[(ENV_MAX_CONTEXT_ENTRIES, "0")])).unwrap();
        assert_eq!(config.max_context_entries, 0);
    }

    #[test]
    fn test_invalid_max_context_is_error() {
        for bad in ["ten", "-1", "1.5"] {
            let err = MemoryConfig::from_lookup(lookup_from(&[(ENV_MAX_CONTEXT_ENTRIES, bad)]))
                .unwrap_err();
            assert!(err.to_string().contains(ENV_MAX_CONTEXT_ENTRIES));
        }
    }

    // ===== Builders =====

    #[test]
    fn test_builders() {
        let config = MemoryConfig::default()
            .with_storage_location("/tmp/other.db")
            .with_max_context_entries(3);
        assert_eq!(config.storage_location, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.max_context_entries, 3);
    }
}
