//! Database connection management
//!
//! This module provides the core database connection wrapper used throughout ipsnap.

use anyhow::{anyhow, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;

/// Default time a writer waits for a competing write transaction
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling. It is the explicit store handle passed
/// to generation stores and import pipelines.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database with a custom busy timeout
    pub fn open_with_timeout(path: Option<&str>, busy_timeout: Duration) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure(busy_timeout)?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self, busy_timeout: Duration) -> Result<()> {
        // WAL lets readers keep querying `current` while a rotation commits
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        // 100MB page cache for bulk loads
        self.conn
            .execute("PRAGMA cache_size=100000", [])
            .map_err(|e| anyhow!("Failed to set cache size: {}", e))?;

        self.conn
            .execute("PRAGMA temp_store=MEMORY", [])
            .map_err(|e| anyhow!("Failed to set temp store: {}", e))?;

        self.conn
            .busy_timeout(busy_timeout)
            .map_err(|e| anyhow!("Failed to set busy timeout: {}", e))?;

        Ok(())
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL: {}", e))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists(&self.conn, table_name)
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        table_count(&self.conn, table_name)
            .map_err(|e| anyhow!("Failed to get table count: {}", e))
    }
}

/// Begin an immediate transaction on a borrowed connection
///
/// `BEGIN IMMEDIATE` takes the write lock up front, so two units of work
/// against the same dataset never interleave.
pub fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check if a table exists
pub fn table_exists(conn: &Connection, table_name: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Count the rows of a table
pub fn table_count(conn: &Connection, table_name: &str) -> rusqlite::Result<u64> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
    let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_table_exists() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
    }

    #[test]
    fn test_table_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE \"DB5LITE_stage\" (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("INSERT INTO \"DB5LITE_stage\" (id) VALUES (1), (2), (3)")
            .unwrap();

        assert_eq!(db.table_count("DB5LITE_stage").unwrap(), 3);
    }

    #[test]
    fn test_begin_write_rolls_back_on_drop() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER)").unwrap();
        {
            let tx = begin_write(&db.conn).unwrap();
            tx.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        }
        assert_eq!(db.table_count("t").unwrap(), 0);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("PX11LITE_current"), "\"PX11LITE_current\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
