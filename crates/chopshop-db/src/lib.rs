pub mod migrations;
pub mod runner;
pub mod store;

pub use migrations::{MigrationFile, discover, parse_version};
pub use runner::{MigrationRunner, MigrationState, MigrationStatus, RunSummary};
pub use store::{ApplyOutcome, MigrationRecord, MigrationStore, TRACKING_TABLE};
