use std::collections::BTreeMap;
use std::path::PathBuf;

use chopshop_common::Result;
use tracing::{info, warn};

use crate::migrations::discover;
use crate::store::{ApplyOutcome, MigrationStore};

/// Counts from a [`MigrationRunner::run_all`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Files applied during this run.
    pub applied: usize,
    /// Files whose version was already recorded.
    pub skipped: usize,
    /// Files ignored because their name has no `NNN_` prefix.
    pub invalid: usize,
    /// Number of `.sql` files found.
    pub total: usize,
    pub applied_versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Applied { applied_at: String },
    Pending,
    InvalidName,
}

/// One line of the `status` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub name: String,
    pub version: Option<String>,
    pub state: MigrationState,
}

/// Applies every outstanding migration in a directory, in filename order.
pub struct MigrationRunner<'a> {
    store: &'a mut MigrationStore,
    dir: PathBuf,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(store: &'a mut MigrationStore, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    /// Apply all pending migrations.
    ///
    /// Stops at the first file that fails; files committed before it stay
    /// applied and a later run resumes after them.
    pub fn run_all(&mut self) -> Result<RunSummary> {
        if !self.dir.is_dir() {
            info!(
                "no migrations directory found at {}, nothing to do",
                self.dir.display()
            );
            return Ok(RunSummary::default());
        }

        let files = discover(&self.dir)?;
        if files.is_empty() {
            info!("no migration files found in {}", self.dir.display());
            return Ok(RunSummary::default());
        }

        info!("found {} migration file(s)", files.len());

        let mut summary = RunSummary {
            total: files.len(),
            ..RunSummary::default()
        };

        for file in &files {
            // Only files that will actually run are read from disk.
            let Some(version) = &file.version else {
                warn!(
                    "skipping {}: invalid filename format (expected NNN_description.sql)",
                    file.name
                );
                summary.invalid += 1;
                continue;
            };
            if self.store.list_applied()?.contains(version) {
                info!("migration {version} already applied: {}", file.name);
                summary.skipped += 1;
                continue;
            }

            let sql = file.read_sql()?;
            match self.store.apply(&file.name, &sql)? {
                ApplyOutcome::Applied => {
                    summary.applied += 1;
                    summary.applied_versions.push(version.clone());
                }
                ApplyOutcome::AlreadyApplied => summary.skipped += 1,
                ApplyOutcome::InvalidName => summary.invalid += 1,
            }
        }

        Ok(summary)
    }

    /// Report which discovered files are applied, pending or unusable.
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let applied: BTreeMap<String, String> = self
            .store
            .records()?
            .into_iter()
            .map(|r| (r.version, r.applied_at))
            .collect();

        let statuses = discover(&self.dir)?
            .into_iter()
            .map(|file| {
                let state = match &file.version {
                    None => MigrationState::InvalidName,
                    Some(version) => match applied.get(version) {
                        Some(applied_at) => MigrationState::Applied {
                            applied_at: applied_at.clone(),
                        },
                        None => MigrationState::Pending,
                    },
                };
                MigrationStatus {
                    name: file.name,
                    version: file.version,
                    state,
                }
            })
            .collect();

        Ok(statuses)
    }
}
