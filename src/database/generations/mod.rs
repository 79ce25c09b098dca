//! Generation storage
//!
//! The ipsnap database holds, for each dataset kind, a stage, current and
//! backup table plus a release ledger shared by all kinds:
//! - `GenerationStore`: loads stage and rotates roles atomically
//! - `ReleaseLedger`: release date per populated table
//! - `IpsnapDatabase`: opens the database file and hands out stores

mod error;
mod ledger;
mod store;

pub use error::GenerationError;
pub use ledger::{LedgerEntry, ReleaseLedger};
pub use store::{GenerationCounts, GenerationStore, GenerationSummary, LoadStats};

use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{info, warn};

/// File name of the database inside the data directory
pub const DATABASE_FILE: &str = "ipsnap-data.sqlite3";

/// The ipsnap database
///
/// Production data lives here, so unlike a cache the schema is never reset:
/// an incompatible database is reported and left alone.
pub struct IpsnapDatabase {
    db: DatabaseConn,
}

impl IpsnapDatabase {
    /// Open the database at the specified path, creating it if needed
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_timeout(path, crate::database::core::DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the database with a custom busy timeout
    pub fn open_with_timeout(path: &str, busy_timeout: Duration) -> Result<Self> {
        let db = DatabaseConn::open_with_timeout(Some(path), busy_timeout)?;
        Self::prepare(db)
    }

    /// Open the database from a data directory
    ///
    /// Uses the standard file path `{data_dir}/ipsnap-data.sqlite3`.
    pub fn open_in_dir(data_dir: &str) -> Result<Self> {
        Self::open(&format!("{}/{}", data_dir, DATABASE_FILE))
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        Self::prepare(db)
    }

    fn prepare(db: DatabaseConn) -> Result<Self> {
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {}
            SchemaStatus::NotInitialized => {
                info!("Initializing ipsnap database schema");
                schema.initialize()?;
            }
            SchemaStatus::NeedsMigration { from, to } => {
                info!("Migrating ipsnap database schema from v{} to v{}", from, to);
                schema.initialize()?;
            }
            SchemaStatus::Corrupted => {
                warn!("ipsnap database is missing shared tables, recreating them");
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                return Err(anyhow!(
                    "Database schema v{} is newer than supported v{}",
                    database_version,
                    required_version
                ));
            }
        }

        Ok(Self { db })
    }

    /// Get the generation store
    pub fn generations(&self) -> GenerationStore<'_> {
        GenerationStore::new(&self.db.conn)
    }

    /// Get the release ledger
    pub fn ledger(&self) -> ReleaseLedger<'_> {
        ReleaseLedger::new(&self.db.conn)
    }

    /// Get the underlying database connection
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Get metadata value from the database
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        SchemaManager::new(&self.db.conn).get_meta(key)
    }

    /// Set metadata value in the database
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        SchemaManager::new(&self.db.conn).set_meta(key, value)
    }
}

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::SCHEMA_VERSION;
    use crate::datasets::DatasetKind;

    #[test]
    fn test_open_in_memory() {
        let db = IpsnapDatabase::open_in_memory().unwrap();
        assert!(!db
            .generations()
            .is_initialized(DatasetKind::LocationV4)
            .unwrap());
    }

    #[test]
    fn test_open_in_dir_persists() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        {
            let db = IpsnapDatabase::open_in_dir(data_dir).unwrap();
            db.generations()
                .create_generations(DatasetKind::ProxyV4)
                .unwrap();
            db.set_meta("last_update", "2024-01-15").unwrap();
        }

        let db = IpsnapDatabase::open_in_dir(data_dir).unwrap();
        assert!(db.generations().is_initialized(DatasetKind::ProxyV4).unwrap());
        assert_eq!(
            db.get_meta("last_update").unwrap(),
            Some("2024-01-15".to_string())
        );
    }

    #[test]
    fn test_refuses_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_FILE);
        let path = path.to_str().unwrap();

        {
            let db = IpsnapDatabase::open(path).unwrap();
            db.set_meta("schema_version", &(SCHEMA_VERSION + 1).to_string())
                .unwrap();
        }

        assert!(IpsnapDatabase::open(path).is_err());
    }
}
