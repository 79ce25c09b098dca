//! Orchestrator
//!
//! Drives the import pipeline and the generation store across dataset kinds.
//! Kinds are processed one after another; a failure in one kind is reported
//! for that kind and never stops the others. The one batch-wide rule is that
//! an update activates nothing if any import reported warnings.

pub mod source;
pub mod types;

pub use source::{DirectorySource, SnapshotFile, SnapshotSource};
pub use types::{KindOutcome, KindRowCounts, KindStatus, UpdateSummary};

use crate::database::IpsnapDatabase;
use crate::datasets::DatasetKind;
use crate::pipeline::{ImportPipeline, ImportReport};
use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

/// Metadata key recording the time of the last successful activation
pub const LAST_ACTIVATION_KEY: &str = "last_activation";

pub struct Orchestrator<'a> {
    db: &'a IpsnapDatabase,
}

impl<'a> Orchestrator<'a> {
    pub fn new(db: &'a IpsnapDatabase) -> Self {
        Self { db }
    }

    /// Create the generation tables of each kind
    pub fn setup(&self, kinds: &[DatasetKind]) -> Vec<KindOutcome> {
        let store = self.db.generations();
        kinds
            .iter()
            .map(|&kind| match store.create_generations(kind) {
                Ok(()) => KindOutcome::success(kind, 0, "created"),
                Err(e) => {
                    error!("{}", e);
                    KindOutcome::failure(kind, e)
                }
            })
            .collect()
    }

    /// Import the snapshot of one kind into stage
    pub fn import(&self, source: &dyn SnapshotSource, kind: DatasetKind) -> Result<ImportReport> {
        let file = source.locate(kind)?;
        Ok(ImportPipeline::new(self.db.connection()).run(kind, &file.path, file.modified)?)
    }

    /// Import every kind, then activate them all unless an import warned
    ///
    /// Kinds whose import failed outright are not activated; the others are.
    pub fn update(&self, source: &dyn SnapshotSource, kinds: &[DatasetKind]) -> UpdateSummary {
        let mut imports = Vec::with_capacity(kinds.len());
        let mut staged = Vec::with_capacity(kinds.len());
        let mut activation_blocked = false;

        for &kind in kinds {
            match self.import(source, kind) {
                Ok(report) => {
                    if !report.is_clean() {
                        warn!(
                            "{}: import reported {} warnings, activation will be skipped",
                            kind, report.warnings
                        );
                        activation_blocked = true;
                    }
                    imports.push(KindOutcome::success(
                        kind,
                        report.rows_loaded,
                        format!(
                            "released {}, {} warnings",
                            report.release_date, report.warnings
                        ),
                    ));
                    staged.push(kind);
                }
                Err(e) => {
                    error!("{}: import failed: {}", kind, e);
                    imports.push(KindOutcome::failure(kind, e));
                }
            }
        }

        let activations = if activation_blocked {
            warn!("Warnings found during import, no dataset activated");
            Vec::new()
        } else {
            staged.into_iter().map(|kind| self.activate(kind)).collect()
        };

        UpdateSummary {
            imports,
            activation_blocked,
            activations,
        }
    }

    /// Promote the stage of one kind into production
    pub fn activate(&self, kind: DatasetKind) -> KindOutcome {
        match self.db.generations().activate(kind) {
            Ok(rows) => {
                self.record_activation();
                KindOutcome::success(kind, rows, "activated")
            }
            Err(e) => {
                error!("{}", e);
                KindOutcome::failure(kind, e)
            }
        }
    }

    /// Swap backup and current of each kind
    pub fn restore(&self, kinds: &[DatasetKind]) -> Vec<KindOutcome> {
        let store = self.db.generations();
        kinds
            .iter()
            .map(|&kind| match store.restore_backup(kind) {
                Ok(rows) => KindOutcome::success(kind, rows, "restored"),
                Err(e) => {
                    error!("{}", e);
                    KindOutcome::failure(kind, e)
                }
            })
            .collect()
    }

    /// Row counts of each initialized kind
    pub fn row_counts(&self, kinds: &[DatasetKind]) -> Result<Vec<KindRowCounts>> {
        let store = self.db.generations();
        let mut counts = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if !store.is_initialized(kind)? {
                info!("{}: not set up, skipping", kind);
                continue;
            }
            let c = store.row_counts(kind)?;
            counts.push(KindRowCounts {
                kind,
                stage: c.stage,
                current: c.current,
                backup: c.backup,
            });
        }
        Ok(counts)
    }

    /// Row counts and release dates of each kind
    pub fn status(&self, kinds: &[DatasetKind]) -> Result<Vec<KindStatus>> {
        let store = self.db.generations();
        kinds
            .iter()
            .map(|&kind| {
                if store.is_initialized(kind)? {
                    Ok(KindStatus::from(store.summary(kind)?))
                } else {
                    Ok(KindStatus::uninitialized(kind))
                }
            })
            .collect()
    }

    /// Time of the last successful activation, if any
    pub fn last_activation(&self) -> Result<Option<String>> {
        self.db.get_meta(LAST_ACTIVATION_KEY)
    }

    fn record_activation(&self) {
        if let Err(e) = self
            .db
            .set_meta(LAST_ACTIVATION_KEY, &Utc::now().to_rfc3339())
        {
            warn!("Failed to record activation time: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    /// Snapshot files written to a temporary directory on demand
    struct FixtureSource {
        dir: tempfile::TempDir,
        files: HashMap<DatasetKind, PathBuf>,
    }

    impl FixtureSource {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                files: HashMap::new(),
            }
        }

        fn with(mut self, kind: DatasetKind, content: &str) -> Self {
            let path = self.dir.path().join(kind.schema().csv_file);
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(content.as_bytes()).unwrap();
            self.files.insert(kind, path);
            self
        }
    }

    impl SnapshotSource for FixtureSource {
        fn locate(&self, kind: DatasetKind) -> Result<SnapshotFile> {
            let path = self
                .files
                .get(&kind)
                .cloned()
                .ok_or_else(|| anyhow!("{}: no fixture", kind))?;
            Ok(SnapshotFile {
                path,
                modified: UNIX_EPOCH + Duration::from_secs(1_705_320_000),
            })
        }
    }

    const ASN_V4: &str = "\"0\",\"255\",\"0.0.0.0/24\",\"-\",\"-\"\r\n\"256\",\"511\",\"0.0.1.0/24\",\"-\",\"-\"\r\n";
    const ASN_V6: &str = "\"0\",\"255\",\"::/120\",\"-\",\"-\"\r\n";

    fn db_with(kinds: &[DatasetKind]) -> IpsnapDatabase {
        let db = IpsnapDatabase::open_in_memory().unwrap();
        let outcomes = Orchestrator::new(&db).setup(kinds);
        assert!(outcomes.iter().all(|o| o.ok));
        db
    }

    #[test]
    fn test_setup_reports_existing() {
        let db = db_with(&[DatasetKind::AsnV4]);
        let outcomes = Orchestrator::new(&db).setup(&[DatasetKind::AsnV4, DatasetKind::AsnV6]);
        assert!(!outcomes[0].ok);
        assert!(outcomes[0].message.contains("already exist"));
        assert!(outcomes[1].ok);
    }

    #[test]
    fn test_update_activates_clean_imports() {
        let kinds = [DatasetKind::AsnV4, DatasetKind::AsnV6];
        let db = db_with(&kinds);
        let orchestrator = Orchestrator::new(&db);
        let source = FixtureSource::new()
            .with(DatasetKind::AsnV4, ASN_V4)
            .with(DatasetKind::AsnV6, ASN_V6);

        let summary = orchestrator.update(&source, &kinds);
        assert!(summary.is_success());
        assert_eq!(summary.activations.len(), 2);
        assert_eq!(summary.activations[0].rows, 2);

        let counts = orchestrator.row_counts(&kinds).unwrap();
        assert_eq!(counts[0].current, 2);
        assert_eq!(counts[1].current, 1);
        assert!(orchestrator.last_activation().unwrap().is_some());

        let status = orchestrator.status(&kinds).unwrap();
        assert_eq!(status[0].current_release, "2024-01-15");
        assert_eq!(status[0].stage_release, "-");
    }

    #[test]
    fn test_update_blocked_by_warnings() {
        let kinds = [DatasetKind::AsnV4, DatasetKind::AsnV6];
        let db = db_with(&kinds);
        let orchestrator = Orchestrator::new(&db);
        let duplicated = format!("{}{}", ASN_V6, ASN_V6);
        let source = FixtureSource::new()
            .with(DatasetKind::AsnV4, ASN_V4)
            .with(DatasetKind::AsnV6, &duplicated);

        let summary = orchestrator.update(&source, &kinds);
        assert!(summary.activation_blocked);
        assert!(summary.activations.is_empty());

        let counts = orchestrator.row_counts(&kinds).unwrap();
        assert_eq!(counts[0].stage, 2);
        assert_eq!(counts[0].current, 0);
    }

    #[test]
    fn test_failed_import_is_local_to_kind() {
        let kinds = [DatasetKind::AsnV4, DatasetKind::AsnV6];
        let db = db_with(&kinds);
        let orchestrator = Orchestrator::new(&db);
        let source = FixtureSource::new().with(DatasetKind::AsnV4, ASN_V4);

        let summary = orchestrator.update(&source, &kinds);
        assert!(!summary.activation_blocked);
        assert!(!summary.imports[1].ok);
        assert_eq!(summary.activations.len(), 1);
        assert_eq!(summary.activations[0].kind, DatasetKind::AsnV4);
        assert!(summary.activations[0].ok);
    }

    #[test]
    fn test_restore_and_status() {
        let kinds = [DatasetKind::AsnV4];
        let db = db_with(&kinds);
        let orchestrator = Orchestrator::new(&db);
        let source = FixtureSource::new().with(DatasetKind::AsnV4, ASN_V4);

        orchestrator.update(&source, &kinds);
        let outcomes = orchestrator.restore(&kinds);
        assert!(!outcomes[0].ok);
        assert!(outcomes[0].message.contains("backup"));

        orchestrator.update(&source, &kinds);
        let outcomes = orchestrator.restore(&kinds);
        assert!(outcomes[0].ok);
        assert_eq!(outcomes[0].rows, 2);

        let status = orchestrator
            .status(&[DatasetKind::AsnV4, DatasetKind::LocationV4])
            .unwrap();
        assert!(status[0].initialized);
        assert!(!status[1].initialized);
    }
}
