//! Configuration management for holdfast nodes
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (HOLDFAST_* prefix, `__` between section and key)
//! 2. holdfast.local.toml (gitignored, local overrides)
//! 3. holdfast.toml (git-tracked, project config)
//! 4. ~/.config/holdfast/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// Main holdfast configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldfastConfig {
    pub node: NodeConfig,
    pub dht: DhtConfig,
    pub bundle: BundleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Agent identity used when the builder is not given one.
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "holdfast-node".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhtConfig {
    /// Peers that should hold each record. Zero means `closer_peer_count`.
    pub redundancy_factor: usize,
    pub closer_peer_count: usize,
    /// Peers asked in parallel per hop of an iterative query.
    pub alpha: usize,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            redundancy_factor: 0,
            closer_peer_count: 10,
            alpha: 3,
        }
    }
}

impl DhtConfig {
    /// Redundancy actually applied when deciding whether to forward a hold.
    pub fn effective_redundancy(&self) -> usize {
        if self.redundancy_factor == 0 {
            self.closer_peer_count
        } else {
            self.redundancy_factor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub default_timeout_ms: u64,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5000,
        }
    }
}

impl HoldfastConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Reads a single TOML file with no layering.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for networks that run every node in one process.
    pub fn development() -> Self {
        Self {
            dht: DhtConfig {
                redundancy_factor: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dht.closer_peer_count == 0 {
            return Err(ConfigError::ValidationError(
                "dht.closer_peer_count must be at least 1".to_string(),
            ));
        }
        if self.dht.alpha == 0 {
            return Err(ConfigError::ValidationError(
                "dht.alpha must be at least 1".to_string(),
            ));
        }
        if self.bundle.default_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "bundle.default_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = HoldfastConfig::default();
        assert_eq!(config.dht.redundancy_factor, 0);
        assert_eq!(config.dht.closer_peer_count, 10);
        assert_eq!(config.dht.effective_redundancy(), 10);
        assert_eq!(config.dht.alpha, 3);
        assert_eq!(config.bundle.default_timeout_ms, 5000);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_development_config() {
        let config = HoldfastConfig::development();
        assert_eq!(config.dht.effective_redundancy(), 1);
        assert_eq!(config.dht.closer_peer_count, 10);
    }

    #[test]
    fn test_validation_rejects_zero_alpha() {
        let mut config = HoldfastConfig::default();
        config.dht.alpha = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[dht\nalpha = ").expect("Failed to write config");

        assert!(matches!(
            HoldfastConfig::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
        assert!(matches!(
            HoldfastConfig::from_file(temp_dir.path().join("missing.toml")),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn test_unknown_sections_are_ignored() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("holdfast.toml");
        std::fs::write(&path, "[logging]\nlevel = \"trace\"\n[dht]\nalpha = 2\n")
            .expect("Failed to write config");

        let config = HoldfastConfig::from_file(&path).expect("load");
        assert_eq!(config.dht.alpha, 2);
    }
}
