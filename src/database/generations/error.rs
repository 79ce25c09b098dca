//! Errors raised by the generation store

use crate::datasets::DatasetKind;

/// Errors that can occur while managing the generations of a dataset
///
/// Every variant names the dataset kind it belongs to; a failure never
/// concerns more than one kind.
#[derive(Debug)]
pub enum GenerationError {
    /// Setup was run against a kind whose tables already exist
    AlreadyExists {
        kind: DatasetKind,
        tables: Vec<String>,
    },
    /// Some role tables of a kind are missing (setup has not been run)
    NotInitialized {
        kind: DatasetKind,
        missing: Vec<String>,
    },
    /// Activation was requested with nothing staged
    EmptyStage { kind: DatasetKind },
    /// Restore was requested with nothing in backup
    EmptyBackup { kind: DatasetKind },
    /// A row handed to the store cannot be persisted
    InvalidRow {
        kind: DatasetKind,
        index: usize,
        reason: String,
    },
    /// A range boundary does not fit the key width of the kind
    BoundaryOutOfRange { kind: DatasetKind, boundary: u128 },
    /// The backing store failed inside a unit of work; everything it changed
    /// was rolled back
    TransactionAborted {
        kind: DatasetKind,
        operation: &'static str,
        source: rusqlite::Error,
    },
    /// A read outside any unit of work failed
    Database {
        kind: DatasetKind,
        source: rusqlite::Error,
    },
}

impl GenerationError {
    pub(crate) fn aborted(
        kind: DatasetKind,
        operation: &'static str,
    ) -> impl FnOnce(rusqlite::Error) -> GenerationError {
        move |source| GenerationError::TransactionAborted {
            kind,
            operation,
            source,
        }
    }

    pub(crate) fn database(kind: DatasetKind) -> impl FnOnce(rusqlite::Error) -> GenerationError {
        move |source| GenerationError::Database { kind, source }
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::AlreadyExists { kind, tables } => write!(
                f,
                "{}: tables already exist ({}), refusing to overwrite",
                kind,
                tables.join(", ")
            ),
            GenerationError::NotInitialized { kind, missing } => write!(
                f,
                "{}: tables missing ({}), run setup first",
                kind,
                missing.join(", ")
            ),
            GenerationError::EmptyStage { kind } => {
                write!(f, "{}: no rows in stage table, aborting activation", kind)
            }
            GenerationError::EmptyBackup { kind } => {
                write!(f, "{}: no rows in backup table, aborting restore", kind)
            }
            GenerationError::InvalidRow {
                kind,
                index,
                reason,
            } => write!(f, "{}: row {} cannot be stored: {}", kind, index, reason),
            GenerationError::BoundaryOutOfRange { kind, boundary } => write!(
                f,
                "{}: boundary {} does not fit {} keys",
                kind,
                boundary,
                kind.schema().width
            ),
            GenerationError::TransactionAborted {
                kind,
                operation,
                source,
            } => write!(f, "{}: {} aborted and rolled back: {}", kind, operation, source),
            GenerationError::Database { kind, source } => {
                write!(f, "{}: database error: {}", kind, source)
            }
        }
    }
}

impl std::error::Error for GenerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerationError::TransactionAborted { source, .. }
            | GenerationError::Database { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenerationError::EmptyStage {
            kind: DatasetKind::LocationV4,
        };
        assert!(err.to_string().contains("location-v4"));
        assert!(err.to_string().contains("stage"));

        let err = GenerationError::AlreadyExists {
            kind: DatasetKind::ProxyV6,
            tables: vec!["PX11LITEIPV6_stage".to_string()],
        };
        assert!(err.to_string().contains("PX11LITEIPV6_stage"));

        let err = GenerationError::BoundaryOutOfRange {
            kind: DatasetKind::AsnV4,
            boundary: 1 << 40,
        };
        assert!(err.to_string().contains("1099511627776"));
    }

    #[test]
    fn test_error_source() {
        use std::error::Error;

        let err = GenerationError::aborted(DatasetKind::AsnV4, "activate")(
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("activate aborted"));

        let err = GenerationError::EmptyBackup {
            kind: DatasetKind::AsnV4,
        };
        assert!(err.source().is_none());
    }
}
