use std::path::{Path, PathBuf};

use chopshop_config::MigrateConfig;
use chopshop_db::{MigrationState, MigrationStatus, RunSummary};

/// Print the run header naming the database and migrations directory.
pub fn print_header(config: &MigrateConfig) {
    println!("=== Database Migration Runner ===");
    println!();
    println!("Database: {}", display_path(&config.db_path));
    println!(
        "Migrations directory: {}",
        display_path(&config.migrations_dir)
    );
    println!();
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Migration Summary ===");
    println!("Applied: {}", summary.applied);
    println!("Skipped: {}", summary.skipped);
    if summary.invalid > 0 {
        println!("Invalid: {}", summary.invalid);
    }
    println!("Total: {}", summary.total);
}

pub fn print_status(statuses: &[MigrationStatus]) {
    if statuses.is_empty() {
        println!("No migration files found.");
        return;
    }

    let name_w = statuses.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for status in statuses {
        let state = match &status.state {
            MigrationState::Applied { applied_at } => format!("applied {applied_at}"),
            MigrationState::Pending => "pending".to_string(),
            MigrationState::InvalidName => "invalid name (expected NNN_description.sql)".to_string(),
        };
        println!("{:<name_w$}  {state}", status.name);
    }

    let pending = statuses
        .iter()
        .filter(|s| s.state == MigrationState::Pending)
        .count();
    println!();
    println!("Pending: {pending}");
}

fn display_path(path: &Path) -> String {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    shorten_home(path, home.as_deref())
}

/// Replace a leading home directory with `~`. A root or empty home is left alone.
fn shorten_home(path: &Path, home: Option<&Path>) -> String {
    let rest = home
        .filter(|h| h.parent().is_some())
        .and_then(|h| path.strip_prefix(h).ok());
    match rest {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => Path::new("~").join(rest).display().to_string(),
        None => path.display().to_string(),
    }
}
