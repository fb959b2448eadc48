use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chopshop_common::{Error, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, error, info, warn};

use crate::migrations::parse_version;

/// Name of the table that records applied migrations.
pub const TRACKING_TABLE: &str = "schema_migrations";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A migration that has been committed to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub version: String,
    pub name: String,
    /// RFC 3339 UTC timestamp taken when the migration transaction committed.
    pub applied_at: String,
}

/// What [`MigrationStore::apply`] did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The SQL ran and the version was recorded.
    Applied,
    /// The version was already recorded; the SQL was not executed.
    AlreadyApplied,
    /// The filename has no `NNN_` prefix; nothing was executed or recorded.
    InvalidName,
}

impl ApplyOutcome {
    pub fn succeeded(self) -> bool {
        !matches!(self, ApplyOutcome::InvalidName)
    }
}

/// Owns the database connection for a migration run and tracks which
/// versions have been applied.
pub struct MigrationStore {
    conn: Connection,
}

impl MigrationStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;
        debug!("foreign keys enabled, busy timeout {BUSY_TIMEOUT:?}");

        let store = Self { conn };
        store.ensure_tracking_table()?;
        Ok(store)
    }

    /// Create the tracking table if it does not exist yet.
    pub fn ensure_tracking_table(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    version TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    applied_at TEXT NOT NULL
                );",
            )
            .map_err(|e| Error::Database(format!("failed to create tracking table: {e}")))
    }

    /// Read-only access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Versions of every migration recorded so far.
    pub fn list_applied(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        let mut versions = BTreeSet::new();
        for row in rows {
            versions.insert(
                row.map_err(|e| Error::Database(format!("failed to read migration row: {e}")))?,
            );
        }
        Ok(versions)
    }

    /// All recorded migrations, ordered by version.
    pub fn records(&self) -> Result<Vec<MigrationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT version, name, applied_at FROM schema_migrations ORDER BY version")
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    version: row.get(0)?,
                    name: row.get(1)?,
                    applied_at: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(format!("failed to query migrations: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::Database(format!("failed to read migration row: {e}")))?,
            );
        }
        Ok(records)
    }

    /// Apply one migration file.
    ///
    /// The SQL text runs as a single batch inside a transaction together with
    /// the insert of its tracking row. If anything fails the transaction is
    /// rolled back and [`Error::Migration`] is returned, so a failed file never
    /// leaves a record behind.
    pub fn apply(&mut self, filename: &str, sql: &str) -> Result<ApplyOutcome> {
        let Some(version) = parse_version(filename) else {
            warn!("skipping {filename}: invalid filename format (expected NNN_description.sql)");
            return Ok(ApplyOutcome::InvalidName);
        };

        if self.list_applied()?.contains(version) {
            info!("migration {version} already applied: {filename}");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        info!("applying migration {version}: {filename}");
        debug!("migration {version} is {} bytes of SQL", sql.len());

        if let Err(e) = self.execute_in_transaction(version, filename, sql) {
            error!("failed to apply migration {version}: {e}");
            return Err(Error::Migration {
                version: version.to_string(),
                message: e.to_string(),
            });
        }

        info!("applied migration {version}");
        Ok(ApplyOutcome::Applied)
    }

    fn execute_in_transaction(
        &mut self,
        version: &str,
        filename: &str,
        sql: &str,
    ) -> rusqlite::Result<()> {
        // Dropping `tx` without committing rolls it back.
        let tx = self.conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![version, filename, now_timestamp()],
        )?;
        tx.commit()
    }

    /// Close the connection, reporting any error from SQLite.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::Database(format!("failed to close database: {e}")))
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(store: &MigrationStore, name: &str) -> bool {
        store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .unwrap()
            > 0
    }

    fn count_rows(store: &MigrationStore, table: &str) -> i64 {
        store
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn opening_creates_tracking_table() {
        let store = MigrationStore::in_memory().unwrap();
        assert!(table_exists(&store, TRACKING_TABLE));
        assert!(store.list_applied().unwrap().is_empty());

        // Idempotent.
        store.ensure_tracking_table().unwrap();
        assert!(store.list_applied().unwrap().is_empty());
    }

    #[test]
    fn apply_runs_sql_and_records_version() {
        let mut store = MigrationStore::in_memory().unwrap();
        let outcome = store
            .apply(
                "001_create_jobs.sql",
                "CREATE TABLE jobs (id INTEGER PRIMARY KEY, status TEXT NOT NULL);
                 CREATE INDEX idx_jobs_status ON jobs(status);",
            )
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(outcome.succeeded());
        assert!(table_exists(&store, "jobs"));

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "001");
        assert_eq!(records[0].name, "001_create_jobs.sql");
    }

    #[test]
    fn applied_at_is_utc_rfc3339() {
        let mut store = MigrationStore::in_memory().unwrap();
        store.apply("001_a.sql", "CREATE TABLE a (x);").unwrap();

        let record = &store.records().unwrap()[0];
        assert!(record.applied_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.applied_at).is_ok());
    }

    #[test]
    fn reapplying_a_version_does_not_rerun_sql() {
        let mut store = MigrationStore::in_memory().unwrap();
        let sql = "CREATE TABLE IF NOT EXISTS plans (name TEXT);
                   INSERT INTO plans (name) VALUES ('pro');";

        assert_eq!(
            store.apply("001_plans.sql", sql).unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(
            store.apply("001_plans.sql", sql).unwrap(),
            ApplyOutcome::AlreadyApplied
        );

        assert_eq!(count_rows(&store, "plans"), 1);
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[test]
    fn version_match_ignores_rest_of_filename() {
        let mut store = MigrationStore::in_memory().unwrap();
        store.apply("001_first.sql", "CREATE TABLE a (x);").unwrap();

        let outcome = store
            .apply("001_renamed.sql", "CREATE TABLE b (x);")
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::AlreadyApplied);
        assert!(!table_exists(&store, "b"));
    }

    #[test]
    fn invalid_name_is_neither_executed_nor_recorded() {
        let mut store = MigrationStore::in_memory().unwrap();
        let outcome = store
            .apply("noprefix.sql", "CREATE TABLE should_not_exist (x);")
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::InvalidName);
        assert!(!outcome.succeeded());
        assert!(!table_exists(&store, "should_not_exist"));
        assert!(store.list_applied().unwrap().is_empty());
    }

    #[test]
    fn failing_sql_rolls_back_whole_file() {
        let mut store = MigrationStore::in_memory().unwrap();
        let err = store
            .apply(
                "002_broken.sql",
                "CREATE TABLE half_done (x);
                 INSERT INTO half_done VALUES (1);
                 CREATE TABLEE oops (y);",
            )
            .unwrap_err();

        assert_eq!(err.migration_version(), Some("002"));
        assert!(!table_exists(&store, "half_done"));
        assert!(store.list_applied().unwrap().is_empty());
    }

    #[test]
    fn constraint_violation_is_a_migration_error() {
        let mut store = MigrationStore::in_memory().unwrap();
        store
            .apply(
                "001_users.sql",
                "CREATE TABLE users (email TEXT UNIQUE);
                 INSERT INTO users VALUES ('a@example.com');",
            )
            .unwrap();

        let err = store
            .apply(
                "002_dupe.sql",
                "INSERT INTO users VALUES ('b@example.com');
                 INSERT INTO users VALUES ('a@example.com');",
            )
            .unwrap_err();

        assert!(matches!(err, Error::Migration { ref version, .. } if version == "002"));
        assert_eq!(count_rows(&store, "users"), 1);
        assert_eq!(
            store.list_applied().unwrap().into_iter().collect::<Vec<_>>(),
            ["001"]
        );
    }

    #[test]
    fn store_is_usable_after_a_failed_migration() {
        let mut store = MigrationStore::in_memory().unwrap();
        store.apply("001_bad.sql", "NOT SQL AT ALL;").unwrap_err();

        let outcome = store.apply("001_bad.sql", "CREATE TABLE fixed (x);").unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(table_exists(&store, "fixed"));
    }

    #[test]
    fn records_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app.db");

        let mut store = MigrationStore::open(&db_path).unwrap();
        store.apply("001_a.sql", "CREATE TABLE a (x);").unwrap();
        store.close().unwrap();

        let store = MigrationStore::open(&db_path).unwrap();
        let applied: Vec<_> = store.list_applied().unwrap().into_iter().collect();
        assert_eq!(applied, ["001"]);
        assert!(table_exists(&store, "a"));
    }
}
