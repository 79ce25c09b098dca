//! Database schema management
//!
//! This module provides the schema definitions for the ipsnap database: the
//! meta table, the release ledger shared by all dataset kinds, and the DDL
//! generator for the per-kind range tables.

use super::connection::quote_ident;
use crate::datasets::kind::{
    DatasetKind, BEGIN_COLUMN, BEGIN_KEY_COLUMN, END_COLUMN, END_KEY_COLUMN,
};
use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the release ledger table
pub const RELEASE_TABLE: &str = "release_dates";

/// Schema definitions for all tables in the database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and global metadata)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS ipsnap_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// SQL for creating the release ledger
    ///
    /// One row per populated physical table; the key is the table name, so
    /// renaming a table means renaming its ledger row.
    pub const RELEASE_DATES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS release_dates (
            table_name TEXT PRIMARY KEY,
            release_date TEXT NOT NULL
        );
    "#;

    /// SQL for creating one range table of a dataset kind
    pub fn range_table(kind: DatasetKind, table: &str) -> String {
        let schema = kind.schema();
        let address_type = schema.address_sql_type();

        let mut columns = vec![
            format!("{} {} NOT NULL", BEGIN_COLUMN, address_type),
            format!("{} {} NOT NULL", END_COLUMN, address_type),
        ];
        columns.extend(
            schema
                .columns
                .iter()
                .map(|c| format!("{} {} NOT NULL", c.name, c.ty.sql_type())),
        );
        columns.push(format!("{} BLOB NOT NULL", BEGIN_KEY_COLUMN));
        columns.push(format!("{} BLOB NOT NULL", END_KEY_COLUMN));
        columns.push(format!("PRIMARY KEY ({}, {})", BEGIN_COLUMN, END_COLUMN));

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_ident(table),
            columns.join(",\n    ")
        )
    }

    /// SQL for creating the indexes of one range table
    pub fn range_indexes(kind: DatasetKind, table: &str) -> Vec<String> {
        let mut indexes = vec![format!(
            "CREATE UNIQUE INDEX {} ON {} ({}, {})",
            quote_ident(&format!("idx_{}_keys", table)),
            quote_ident(table),
            BEGIN_KEY_COLUMN,
            END_KEY_COLUMN
        )];

        if kind.schema().has_column("country_code") {
            indexes.push(format!(
                "CREATE INDEX {} ON {} (country_code)",
                quote_ident(&format!("idx_{}_country_code", table)),
                quote_ident(table)
            ));
        }

        indexes
    }
}

/// Schema manager for the database
///
/// Handles initialization and version checking of the shared tables. Range
/// tables are created per dataset kind by the generation store.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the shared tables and record the schema version
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        self.conn
            .execute(SchemaDefinitions::RELEASE_DATES_TABLE, [])
            .map_err(|e| anyhow!("Failed to create release_dates table: {}", e))?;

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let meta_exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='ipsnap_meta'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if meta_exists == 0 {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else if current_version < SCHEMA_VERSION {
            Ok(SchemaStatus::NeedsMigration {
                from: current_version,
                to: SCHEMA_VERSION,
            })
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    /// Get the current schema version from the database
    fn get_schema_version(&self) -> Result<u32> {
        let version: String = self
            .conn
            .query_row(
                "SELECT value FROM ipsnap_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap_or_else(|_| "0".to_string());

        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    fn verify_integrity(&self) -> Result<bool> {
        for table in ["ipsnap_meta", RELEASE_TABLE] {
            let exists: i32 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap_or(0);

            if exists == 0 {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO ipsnap_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM ipsnap_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Schema needs migration from an older version
    NeedsMigration { from: u32, to: u32 },

    /// Database is from a newer version (incompatible)
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Schema is corrupted (missing tables)
    Corrupted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_not_initialized() {
        let conn = Connection::open_in_memory().unwrap();
        let manager = SchemaManager::new(&conn);

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }

    #[test]
    fn test_schema_initialize() {
        let conn = Connection::open_in_memory().unwrap();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        assert_eq!(manager.get_schema_version().unwrap(), SCHEMA_VERSION);

        // Running it twice is harmless
        manager.initialize().unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_schema_newer_version_is_incompatible() {
        let conn = Connection::open_in_memory().unwrap();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        manager
            .set_meta("schema_version", &(SCHEMA_VERSION + 1).to_string())
            .unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Incompatible {
                database_version: SCHEMA_VERSION + 1,
                required_version: SCHEMA_VERSION,
            }
        );
    }

    #[test]
    fn test_meta_operations() {
        let conn = Connection::open_in_memory().unwrap();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();

        manager.set_meta("test_key", "test_value").unwrap();
        let value = manager.get_meta("test_key").unwrap();
        assert_eq!(value, Some("test_value".to_string()));

        let missing = manager.get_meta("nonexistent").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_range_table_ddl() {
        let conn = Connection::open_in_memory().unwrap();

        for kind in DatasetKind::ALL {
            let table = kind.table_name(crate::datasets::Role::Stage);
            conn.execute(&SchemaDefinitions::range_table(kind, &table), [])
                .unwrap();
            for index in SchemaDefinitions::range_indexes(kind, &table) {
                conn.execute(&index, []).unwrap();
            }
        }

        let ddl = SchemaDefinitions::range_table(DatasetKind::LocationV6, "DB5LITEIPV6_stage");
        assert!(ddl.contains("ip_from TEXT NOT NULL"));
        assert!(ddl.contains("latitude REAL NOT NULL"));

        let ddl = SchemaDefinitions::range_table(DatasetKind::AsnV4, "DBASNLITE_stage");
        assert!(ddl.contains("ip_from INTEGER NOT NULL"));
        assert_eq!(
            SchemaDefinitions::range_indexes(DatasetKind::AsnV4, "DBASNLITE_stage").len(),
            1
        );
    }
}
