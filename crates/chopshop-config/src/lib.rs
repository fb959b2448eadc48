pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, DB_PATH_ENV, MIGRATIONS_DIR_ENV, load_dotenv};
pub use model::MigrateConfig;
