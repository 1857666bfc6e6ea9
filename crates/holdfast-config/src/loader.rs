//! Configuration loader with multi-source merging

use crate::HoldfastConfig;
use crate::paths;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "HOLDFAST".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "HOLDFAST")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/holdfast/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<HoldfastConfig> {
        let mut builder = config::Config::builder();

        let defaults = HoldfastConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        if self.user_config {
            if let Ok(user_config_file) = paths::user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        for file in paths::project_config_files(&self.project_dir) {
            if file.exists() {
                builder = builder.add_source(
                    config::File::from(file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // HOLDFAST_DHT__REDUNDANCY_FACTOR=1; keys keep their underscores.
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let holdfast_config: HoldfastConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        holdfast_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(holdfast_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> HoldfastConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("HOLDFAST_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.dht.closer_peer_count, 10);
        assert_eq!(config.bundle.default_timeout_ms, 5000);
        assert_eq!(config.node.name, "holdfast-node");
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[node]
name = "alice"

[dht]
redundancy_factor = 3
alpha = 5

[bundle]
default_timeout_ms = 250
"#;
        fs::write(project_dir.join("holdfast.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.node.name, "alice");
        assert_eq!(config.dht.effective_redundancy(), 3);
        assert_eq!(config.dht.alpha, 5);
        assert_eq!(config.dht.closer_peer_count, 10);
        assert_eq!(config.bundle.default_timeout_ms, 250);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("holdfast.toml"),
            "[dht]\nalpha = 4\ncloser_peer_count = 6\n",
        )
        .expect("Failed to write project config");
        fs::write(project_dir.join("holdfast.local.toml"), "[dht]\nalpha = 7\n")
            .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");
        assert_eq!(config.dht.alpha, 7);
    }

    #[test]
    fn test_invalid_values_fail_to_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("holdfast.toml"), "[dht]\nalpha = 0\n")
            .expect("Failed to write config");

        assert!(loader(temp_dir.path()).load().is_err());
        assert_eq!(loader(temp_dir.path()).load_or_default().dht.alpha, 3);
    }
}
