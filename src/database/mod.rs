//! Database module
//!
//! This module provides all storage functionality for ipsnap, organized into:
//!
//! - **core**: SQLite connection wrapper and schema management
//! - **generations**: stage/current/backup tables per dataset kind and the
//!   release ledger
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/            # Foundation
//! │   ├── connection   # SQLite DatabaseConn wrapper
//! │   └── schema       # Shared tables and range table DDL
//! │
//! └── generations/     # Production storage
//!     ├── store        # Stage loads, activation, restore
//!     ├── ledger       # Release date per table
//!     └── error        # GenerationError
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ipsnap::database::IpsnapDatabase;
//! use ipsnap::datasets::DatasetKind;
//!
//! let db = IpsnapDatabase::open_in_dir("~/.ipsnap")?;
//! let store = db.generations();
//!
//! store.create_generations(DatasetKind::LocationV4)?;
//! store.load_stage(DatasetKind::LocationV4, &rows, release_date)?;
//! store.activate(DatasetKind::LocationV4)?;
//! ```

pub mod core;
pub mod generations;

pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};

pub use generations::{
    ensure_data_dir, GenerationCounts, GenerationError, GenerationStore, GenerationSummary,
    IpsnapDatabase, LedgerEntry, LoadStats, ReleaseLedger, DATABASE_FILE,
};
