use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = "production.db";
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Where the runner reads migrations from and which database it writes to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrateConfig {
    pub db_path: PathBuf,
    pub migrations_dir: PathBuf,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
        }
    }
}
