//! Migration file discovery.
//!
//! Migrations live in a flat directory as `NNN_description.sql`. The numeric
//! prefix is the version that gets recorded once the file is applied, and
//! files are applied in lexicographic filename order, so prefixes must be
//! zero-padded to sort numerically.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chopshop_common::{Error, Result};
use regex::Regex;
use tracing::{debug, warn};

static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)_").expect("version pattern is valid"));

/// Extract the version token from a migration filename.
///
/// `"003_add_index.sql"` yields `Some("003")`. Names without a numeric
/// prefix followed by `_` yield `None`.
pub fn parse_version(filename: &str) -> Option<&str> {
    VERSION_PREFIX
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A `.sql` file found in the migrations directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
    pub version: Option<String>,
}

impl MigrationFile {
    fn new(name: String, path: PathBuf) -> Self {
        let version = parse_version(&name).map(str::to_owned);
        Self {
            name,
            path,
            version,
        }
    }

    pub fn read_sql(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {e}", self.path.display()),
            ))
        })
    }
}

/// List the `.sql` files in `dir`, sorted by filename.
///
/// A missing directory yields an empty list. Subdirectories and files with
/// other extensions are ignored.
pub fn discover(dir: &Path) -> Result<Vec<MigrationFile>> {
    if !dir.is_dir() {
        debug!("migrations directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().map(str::to_owned) else {
            warn!(
                "skipping {}: filename is not valid UTF-8",
                file_name.to_string_lossy()
            );
            continue;
        };
        if name.ends_with(".sql") {
            files.push(MigrationFile::new(name, entry.path()));
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
