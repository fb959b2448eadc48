use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// A migration file failed to execute. Its transaction has already been
    /// rolled back when this is returned.
    #[error("migration {version} failed: {message}")]
    Migration { version: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Version of the migration that caused this error, if any.
    pub fn migration_version(&self) -> Option<&str> {
        match self {
            Error::Migration { version, .. } => Some(version),
            _ => None,
        }
    }
}
