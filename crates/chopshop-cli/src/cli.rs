use std::path::PathBuf;

use chopshop_config::MigrateConfig;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chopshop-migrate")]
#[command(version, about = "Apply SQL migrations to the Chopshop SQLite database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file (TOML or YAML) with `db_path` / `migrations_dir`
    #[arg(long, global = true, env = "CHOPSHOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file, overrides DB_PATH
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Directory containing NNN_description.sql files, overrides MIGRATIONS_DIR
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply every migration that has not been applied yet (default)
    Up,
    /// List migration files and whether each one has been applied
    Status,
}

impl Cli {
    pub fn action(&self) -> Command {
        self.command.unwrap_or(Command::Up)
    }

    /// Command-line paths take precedence over the file and environment.
    pub fn apply_overrides(&self, config: &mut MigrateConfig) {
        if let Some(db_path) = &self.db_path {
            config.db_path = db_path.clone();
        }
        if let Some(dir) = &self.migrations_dir {
            config.migrations_dir = dir.clone();
        }
    }
}
