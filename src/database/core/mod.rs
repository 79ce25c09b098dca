//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout ipsnap:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema initialization and version checking
//! - `SchemaDefinitions`: Shared tables and range table DDL

mod connection;
mod schema;

pub use connection::{
    begin_write, quote_ident, table_count, table_exists, DatabaseConn, DEFAULT_BUSY_TIMEOUT,
};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, RELEASE_TABLE, SCHEMA_VERSION};
