//! Orchestrator result types

use crate::database::GenerationSummary;
use crate::datasets::{DatasetKind, Role};
use serde::Serialize;

/// Outcome of one operation on one dataset kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct KindOutcome {
    pub kind: DatasetKind,
    pub ok: bool,
    /// Rows affected, 0 on failure
    pub rows: u64,
    pub message: String,
}

impl KindOutcome {
    pub fn success(kind: DatasetKind, rows: u64, message: impl Into<String>) -> Self {
        Self {
            kind,
            ok: true,
            rows,
            message: message.into(),
        }
    }

    pub fn failure(kind: DatasetKind, error: impl std::fmt::Display) -> Self {
        Self {
            kind,
            ok: false,
            rows: 0,
            message: error.to_string(),
        }
    }
}

/// Result of an update run
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub imports: Vec<KindOutcome>,
    /// Set when an import reported warnings; nothing was activated
    pub activation_blocked: bool,
    pub activations: Vec<KindOutcome>,
}

impl UpdateSummary {
    /// Whether every import and activation succeeded
    pub fn is_success(&self) -> bool {
        !self.activation_blocked
            && self.imports.iter().all(|o| o.ok)
            && self.activations.iter().all(|o| o.ok)
    }
}

/// Row counts and release dates of one dataset kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct KindStatus {
    pub kind: DatasetKind,
    pub initialized: bool,
    pub stage: u64,
    pub current: u64,
    pub backup: u64,
    pub stage_release: String,
    pub current_release: String,
    pub backup_release: String,
}

impl KindStatus {
    pub fn uninitialized(kind: DatasetKind) -> Self {
        Self {
            kind,
            initialized: false,
            stage: 0,
            current: 0,
            backup: 0,
            stage_release: "-".to_string(),
            current_release: "-".to_string(),
            backup_release: "-".to_string(),
        }
    }
}

impl From<GenerationSummary> for KindStatus {
    fn from(summary: GenerationSummary) -> Self {
        let release = |role| {
            summary
                .release_date(role)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        Self {
            kind: summary.kind,
            initialized: true,
            stage: summary.counts.stage,
            current: summary.counts.current,
            backup: summary.counts.backup,
            stage_release: release(Role::Stage),
            current_release: release(Role::Current),
            backup_release: release(Role::Backup),
        }
    }
}

/// Row counts of one dataset kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct KindRowCounts {
    pub kind: DatasetKind,
    pub stage: u64,
    pub current: u64,
    pub backup: u64,
}
