#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! ipsnap - versioned imports of IP geolocation, proxy and ASN snapshots
//!
//! ipsnap loads the six IP2Location LITE reference datasets into SQLite and
//! keeps three generations of each: `stage` (being imported), `current`
//! (production) and `backup` (previous production). Imports never touch
//! production; activation promotes a fully loaded stage in one transaction,
//! and a single restore undoes the last activation.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Storage, import pipeline, orchestrator | `rusqlite`, `csv` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `ipsnap` binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`datasets`]**: dataset kinds, column layouts, range key codec
//! - **[`database`]**: SQLite connection, schema, generation store, release ledger
//! - **[`pipeline`]**: CSV parsing, stage load and normalization
//! - **[`orchestrator`]**: multi-kind setup, update, restore and status
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ipsnap::database::IpsnapDatabase;
//! use ipsnap::datasets::DatasetKind;
//! use ipsnap::pipeline::ImportPipeline;
//!
//! let db = IpsnapDatabase::open_in_dir("/var/lib/ipsnap")?;
//! db.generations().create_generations(DatasetKind::LocationV4)?;
//!
//! let report = ImportPipeline::new(db.connection())
//!     .run(DatasetKind::LocationV4, path, modified)?;
//! if report.is_clean() {
//!     db.generations().activate(DatasetKind::LocationV4)?;
//! }
//! ```

pub mod config;
pub mod database;
pub mod datasets;
pub mod orchestrator;
pub mod pipeline;
pub mod utils;

pub use config::IpsnapConfig;

pub use database::{
    DatabaseConn, GenerationCounts, GenerationError, GenerationStore, IpsnapDatabase,
    ReleaseLedger,
};

pub use datasets::{AttributeValue, DatasetKind, DatasetSchema, KeyWidth, RangeRow, Role};

pub use pipeline::{ImportError, ImportPipeline, ImportReport, ParseError};

pub use orchestrator::{DirectorySource, KindOutcome, Orchestrator, SnapshotSource};

pub use utils::OutputFormat;
