//! Import pipeline
//!
//! Turns one snapshot file into a populated stage table:
//!
//! 1. clear stage
//! 2. parse the file for the kind's column layout
//! 3. load the rows into stage with the release date taken from the file's
//!    modification time
//! 4. drop IPv4-mapped ranges (128-bit location and proxy kinds)
//! 5. shorten verbose country and region names (location and proxy kinds)
//!
//! The pipeline never activates. It reports warnings and leaves the decision
//! to the caller.

pub mod normalize;
pub mod parser;

pub use normalize::{delete_mapped_v4, shorten_country_names, NameRule, MAPPED_V4_BOUNDARY, NAME_RULES};
pub use parser::{parse_snapshot, ParseError, ParseWarning, ParsedSnapshot};

use crate::database::{GenerationError, GenerationStore};
use crate::datasets::{DatasetKind, Role};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// Number of individual warnings logged per import before summarizing
const LOGGED_WARNINGS: usize = 10;

/// Errors that abort an import
#[derive(Debug)]
pub enum ImportError {
    /// The snapshot file could not be opened
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The snapshot is malformed; stage is left empty
    Parse {
        kind: DatasetKind,
        source: ParseError,
    },
    /// The generation store refused or failed
    Store(GenerationError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ImportError::Parse { kind, source } => write!(f, "{}: {}", kind, source),
            ImportError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io { source, .. } => Some(source),
            ImportError::Parse { source, .. } => Some(source),
            ImportError::Store(e) => Some(e),
        }
    }
}

impl From<GenerationError> for ImportError {
    fn from(e: GenerationError) -> Self {
        ImportError::Store(e)
    }
}

/// Result of importing one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct ImportReport {
    pub kind: DatasetKind,
    /// Rows in stage after all filters
    pub rows_loaded: u64,
    /// Non-fatal data-quality problems; non-zero blocks activation
    pub warnings: u64,
    pub release_date: NaiveDate,
    pub mapped_v4_removed: u64,
    pub names_shortened: u64,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.warnings == 0
    }
}

/// Calendar date (UTC) of a file timestamp
pub fn release_date_of(timestamp: SystemTime) -> NaiveDate {
    DateTime::<Utc>::from(timestamp).date_naive()
}

/// Loads snapshot files into the stage table of a dataset kind
pub struct ImportPipeline<'a> {
    store: GenerationStore<'a>,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            store: GenerationStore::new(conn),
        }
    }

    /// Import a snapshot file
    ///
    /// `file_timestamp` is the file's modification time; its UTC calendar date
    /// becomes the release date of stage.
    pub fn run(
        &self,
        kind: DatasetKind,
        csv_path: &Path,
        file_timestamp: SystemTime,
    ) -> Result<ImportReport, ImportError> {
        info!("{}: importing {}", kind, csv_path.display());
        self.store.clear_stage(kind)?;

        let file = std::fs::File::open(csv_path).map_err(|source| ImportError::Io {
            path: csv_path.to_path_buf(),
            source,
        })?;
        self.import(kind, std::io::BufReader::new(file), release_date_of(file_timestamp))
    }

    /// Import a snapshot from any reader with an explicit release date
    pub fn run_reader<R: Read>(
        &self,
        kind: DatasetKind,
        reader: R,
        release_date: NaiveDate,
    ) -> Result<ImportReport, ImportError> {
        self.store.clear_stage(kind)?;
        self.import(kind, reader, release_date)
    }

    fn import<R: Read>(
        &self,
        kind: DatasetKind,
        reader: R,
        release_date: NaiveDate,
    ) -> Result<ImportReport, ImportError> {
        let schema = kind.schema();

        let snapshot =
            parse_snapshot(schema, reader).map_err(|source| ImportError::Parse { kind, source })?;

        for warning in snapshot.warnings.iter().take(LOGGED_WARNINGS) {
            warn!(
                "{}: line {} column {}: {}",
                kind, warning.line, warning.column, warning.message
            );
        }
        if snapshot.warnings.len() > LOGGED_WARNINGS {
            warn!(
                "{}: {} more warnings not shown",
                kind,
                snapshot.warnings.len() - LOGGED_WARNINGS
            );
        }

        let stats = self.store.load_stage(kind, &snapshot.rows, release_date)?;
        if stats.duplicates > 0 {
            warn!("{}: {} duplicate ranges skipped", kind, stats.duplicates);
        }

        let mapped_v4_removed = if schema.mapped_v4_filter {
            delete_mapped_v4(&self.store, kind)?
        } else {
            0
        };

        let names_shortened = if schema.country_name_shortening {
            shorten_country_names(&self.store, kind)?
        } else {
            0
        };

        let rows_loaded = self.store.row_counts(kind)?.get(Role::Stage);
        if rows_loaded == 0 {
            // The ledger only dates populated generations
            self.store.clear_stage(kind)?;
        }

        let report = ImportReport {
            kind,
            rows_loaded,
            warnings: snapshot.warnings.len() as u64 + stats.duplicates,
            release_date,
            mapped_v4_removed,
            names_shortened,
        };

        info!(
            "{}: staged {} rows released {} ({} warnings, {} mapped ranges removed, {} names shortened)",
            kind,
            report.rows_loaded,
            report.release_date,
            report.warnings,
            report.mapped_v4_removed,
            report.names_shortened
        );
        Ok(report)
    }
}
