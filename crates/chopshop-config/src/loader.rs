use std::path::{Path, PathBuf};

use chopshop_common::{Error, Result};
use tracing::info;

use crate::model::MigrateConfig;

pub const DB_PATH_ENV: &str = "DB_PATH";
pub const MIGRATIONS_DIR_ENV: &str = "MIGRATIONS_DIR";

/// Load a `.env` file from the working directory into the process
/// environment. Returns the file's path, or `None` when there is no `.env`.
///
/// Call this before parsing arguments so that clap `env` fallbacks and
/// `RUST_LOG` see its values. Nothing is logged here since the subscriber
/// is usually not installed yet.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(Error::Config(format!("unreadable .env file: {e}"))),
    }
}

/// Builds a [`MigrateConfig`] from defaults, an optional config file and the
/// environment, in that order of precedence (later wins).
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Resolve the config against the real process environment.
    pub fn load(&self) -> Result<MigrateConfig> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Resolve the config using `lookup` for environment variables.
    pub fn load_with<F>(&self, lookup: F) -> Result<MigrateConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.file {
            Some(path) => {
                let config = read_config_file(path)?;
                info!("loaded config from {}", path.display());
                config
            }
            None => MigrateConfig::default(),
        };

        if let Some(db_path) = non_empty(lookup(DB_PATH_ENV)) {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(dir) = non_empty(lookup(MIGRATIONS_DIR_ENV)) {
            config.migrations_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MigrateConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}
