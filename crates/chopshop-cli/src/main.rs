mod banner;
mod cli;

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chopshop_config::{ConfigLoader, MigrateConfig, load_dotenv};
use chopshop_db::{MigrationRunner, MigrationStore};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let dotenv = load_dotenv();
    let args = Cli::parse();
    init_tracing(args.verbose);
    match dotenv {
        Ok(Some(path)) => debug!("loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("ignoring {e}"),
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("✗ Migration failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_ansi(std::io::stdout().is_terminal())
        .without_time()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn resolve_config(args: &Cli) -> Result<MigrateConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().context("failed to load configuration")?;
    args.apply_overrides(&mut config);
    debug!("resolved config: {config:?}");
    Ok(config)
}

fn run(args: &Cli) -> Result<()> {
    let config = resolve_config(args)?;
    banner::print_header(&config);

    let mut store = MigrationStore::open(&config.db_path)?;
    let outcome = execute(&mut store, &config, args.action());

    // Close on both paths; a migration error takes precedence over a close error.
    let closed = store.close();
    outcome?;
    closed?;
    Ok(())
}

fn execute(store: &mut MigrationStore, config: &MigrateConfig, command: Command) -> Result<()> {
    let mut runner = MigrationRunner::new(store, &config.migrations_dir);
    match command {
        Command::Up => {
            let summary = runner.run_all()?;
            banner::print_summary(&summary);
        }
        Command::Status => {
            let statuses = runner.status()?;
            banner::print_status(&statuses);
        }
    }
    Ok(())
}
