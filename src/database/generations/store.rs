//! Generation store
//!
//! Each dataset kind owns three physical tables, one per role. Activation and
//! restore rebind roles by renaming tables inside a single `BEGIN IMMEDIATE`
//! transaction, and move the matching ledger rows in the same transaction.
//! SQLite DDL is transactional, so a failure at any step rolls back both the
//! renames and the ledger.

use super::error::GenerationError;
use super::ledger::{LedgerEntry, ReleaseLedger};
use crate::database::core::{
    begin_write, quote_ident, table_count, table_exists, SchemaDefinitions,
};
use crate::datasets::kind::{BEGIN_KEY_COLUMN, END_KEY_COLUMN};
use crate::datasets::row::address_value;
use crate::datasets::{codec, DatasetKind, RangeRow, Role};
use chrono::NaiveDate;
use rusqlite::{Connection, ToSql, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Row counts of the three generations of a dataset kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct GenerationCounts {
    pub stage: u64,
    pub current: u64,
    pub backup: u64,
}

impl GenerationCounts {
    pub fn get(&self, role: Role) -> u64 {
        match role {
            Role::Stage => self.stage,
            Role::Current => self.current,
            Role::Backup => self.backup,
        }
    }
}

/// Outcome of a stage load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Rows written to stage
    pub inserted: u64,
    /// Rows skipped because their range was already present
    pub duplicates: u64,
}

/// Counts plus ledger entries of one dataset kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub kind: DatasetKind,
    pub counts: GenerationCounts,
    pub ledger: Vec<LedgerEntry>,
}

impl GenerationSummary {
    pub fn release_date(&self, role: Role) -> Option<NaiveDate> {
        self.ledger
            .iter()
            .find(|e| e.role == role)
            .map(|e| e.release_date)
    }
}

/// Owner of the stage/current/backup tables of every dataset kind
pub struct GenerationStore<'a> {
    conn: &'a Connection,
}

impl<'a> GenerationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether all three role tables of a kind exist
    pub fn is_initialized(&self, kind: DatasetKind) -> Result<bool, GenerationError> {
        Ok(self.missing_tables(kind)?.is_empty())
    }

    fn missing_tables(&self, kind: DatasetKind) -> Result<Vec<String>, GenerationError> {
        let mut missing = Vec::new();
        for role in Role::ALL {
            let table = kind.table_name(role);
            if !table_exists(self.conn, &table).map_err(GenerationError::database(kind))? {
                missing.push(table);
            }
        }
        Ok(missing)
    }

    fn ensure_initialized(&self, kind: DatasetKind) -> Result<(), GenerationError> {
        let missing = self.missing_tables(kind)?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::NotInitialized { kind, missing })
        }
    }

    /// Create the three role tables of a kind
    ///
    /// Refuses with `AlreadyExists` if any of them is present; existing data is
    /// never dropped.
    pub fn create_generations(&self, kind: DatasetKind) -> Result<(), GenerationError> {
        let aborted = || GenerationError::aborted(kind, "setup");

        let tx = begin_write(self.conn).map_err(aborted())?;

        let mut existing = Vec::new();
        for table in Role::ALL
            .iter()
            .map(|r| kind.table_name(*r))
            .chain(std::iter::once(kind.temp_table_name()))
        {
            if table_exists(&tx, &table).map_err(aborted())? {
                existing.push(table);
            }
        }
        if !existing.is_empty() {
            return Err(GenerationError::AlreadyExists {
                kind,
                tables: existing,
            });
        }

        for role in Role::ALL {
            let table = kind.table_name(role);
            tx.execute(&SchemaDefinitions::range_table(kind, &table), [])
                .map_err(aborted())?;
            for index in SchemaDefinitions::range_indexes(kind, &table) {
                tx.execute(&index, []).map_err(aborted())?;
            }
        }

        let stale = ReleaseLedger::new(&tx).clear_kind(kind).map_err(aborted())?;
        if stale > 0 {
            warn!("{}: removed {} stale ledger rows", kind, stale);
        }

        tx.commit().map_err(aborted())?;
        info!("{}: created stage, current and backup tables", kind);
        Ok(())
    }

    /// Empty the stage table and drop its ledger entry
    pub fn clear_stage(&self, kind: DatasetKind) -> Result<u64, GenerationError> {
        self.ensure_initialized(kind)?;
        let aborted = || GenerationError::aborted(kind, "clear stage");

        let tx = begin_write(self.conn).map_err(aborted())?;
        let stage = kind.table_name(Role::Stage);
        let removed = tx
            .execute(&format!("DELETE FROM {}", quote_ident(&stage)), [])
            .map_err(aborted())?;
        ReleaseLedger::new(&tx).remove(&stage).map_err(aborted())?;
        tx.commit().map_err(aborted())?;

        debug!("{}: cleared {} rows from stage", kind, removed);
        Ok(removed as u64)
    }

    /// Replace the contents of stage with `rows`
    ///
    /// Binary keys are recomputed from each row's endpoints. Rows whose
    /// `(begin, end)` pair is already present are skipped and counted as
    /// duplicates. The stage ledger entry is set to `release_date`.
    pub fn load_stage(
        &self,
        kind: DatasetKind,
        rows: &[RangeRow],
        release_date: NaiveDate,
    ) -> Result<LoadStats, GenerationError> {
        self.ensure_initialized(kind)?;
        let aborted = || GenerationError::aborted(kind, "load stage");
        let schema = kind.schema();
        let stage = kind.table_name(Role::Stage);

        let tx = begin_write(self.conn).map_err(aborted())?;
        tx.execute(&format!("DELETE FROM {}", quote_ident(&stage)), [])
            .map_err(aborted())?;

        let mut columns = schema.input_columns();
        columns.push(BEGIN_KEY_COLUMN);
        columns.push(END_KEY_COLUMN);
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            quote_ident(&stage),
            columns.join(", "),
            placeholders
        );

        let mut stats = LoadStats::default();
        {
            let mut stmt = tx.prepare(&insert).map_err(aborted())?;

            for (index, row) in rows.iter().enumerate() {
                if row.attributes.len() != schema.columns.len() {
                    return Err(GenerationError::InvalidRow {
                        kind,
                        index,
                        reason: format!(
                            "expected {} attributes, got {}",
                            schema.columns.len(),
                            row.attributes.len()
                        ),
                    });
                }
                if row.begin > row.end {
                    return Err(GenerationError::InvalidRow {
                        kind,
                        index,
                        reason: format!("begin {} is after end {}", row.begin, row.end),
                    });
                }
                let (begin_key, end_key) =
                    row.keys(schema.width)
                        .ok_or_else(|| GenerationError::InvalidRow {
                            kind,
                            index,
                            reason: format!("range does not fit {} keys", schema.width),
                        })?;

                let begin = address_value(row.begin, schema.width);
                let end = address_value(row.end, schema.width);
                let mut params: Vec<&dyn ToSql> = Vec::with_capacity(columns.len());
                params.push(&begin);
                params.push(&end);
                for value in &row.attributes {
                    params.push(value);
                }
                params.push(&begin_key);
                params.push(&end_key);

                match stmt.execute(params.as_slice()).map_err(aborted())? {
                    0 => stats.duplicates += 1,
                    _ => stats.inserted += 1,
                }
            }
        }

        ReleaseLedger::new(&tx)
            .upsert(&stage, release_date)
            .map_err(aborted())?;
        tx.commit().map_err(aborted())?;

        info!(
            "{}: loaded {} rows into stage ({} duplicates skipped), release date {}",
            kind, stats.inserted, stats.duplicates, release_date
        );
        Ok(stats)
    }

    /// Run a unit of work against the stage table
    ///
    /// The closure receives an open write transaction and the stage table
    /// name; the transaction commits only if the closure succeeds.
    pub fn modify_stage<T, F>(
        &self,
        kind: DatasetKind,
        operation: &'static str,
        f: F,
    ) -> Result<T, GenerationError>
    where
        F: FnOnce(&Transaction<'_>, &str) -> rusqlite::Result<T>,
    {
        self.ensure_initialized(kind)?;
        let aborted = || GenerationError::aborted(kind, operation);

        let tx = begin_write(self.conn).map_err(aborted())?;
        let value = f(&tx, &kind.table_name(Role::Stage)).map_err(aborted())?;
        tx.commit().map_err(aborted())?;
        Ok(value)
    }

    /// Remove staged ranges whose end address is at or below `boundary`
    pub fn delete_stage_ranges_up_to(
        &self,
        kind: DatasetKind,
        boundary: u128,
    ) -> Result<u64, GenerationError> {
        let width = kind.schema().width;
        let key = codec::encode(boundary, width)
            .ok_or(GenerationError::BoundaryOutOfRange { kind, boundary })?;

        let removed = self.modify_stage(kind, "range filter", |tx, stage| {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {} <= ?1",
                    quote_ident(stage),
                    END_KEY_COLUMN
                ),
                [&key],
            )
        })?;

        debug!(
            "{}: removed {} staged ranges ending at or below {}",
            kind, removed, boundary
        );
        Ok(removed as u64)
    }

    /// Promote stage to current, current to backup, and discard backup
    ///
    /// The discarded table becomes the new, empty stage. Fails with
    /// `EmptyStage` if nothing is staged. Returns the number of rows now in
    /// current.
    pub fn activate(&self, kind: DatasetKind) -> Result<u64, GenerationError> {
        self.ensure_initialized(kind)?;
        let aborted = || GenerationError::aborted(kind, "activate");

        let tx = begin_write(self.conn).map_err(aborted())?;

        let staged = table_count(&tx, &kind.table_name(Role::Stage)).map_err(aborted())?;
        if staged == 0 {
            return Err(GenerationError::EmptyStage { kind });
        }

        rotate_forward(&tx, kind).map_err(aborted())?;
        tx.commit().map_err(aborted())?;

        info!("{}: activated {} rows", kind, staged);
        Ok(staged)
    }

    /// Swap backup and current, leaving stage untouched
    ///
    /// Undoes one activation. Calling it again swaps them back. Fails with
    /// `EmptyBackup` if backup holds no rows.
    pub fn restore_backup(&self, kind: DatasetKind) -> Result<u64, GenerationError> {
        self.ensure_initialized(kind)?;
        let aborted = || GenerationError::aborted(kind, "restore");

        let tx = begin_write(self.conn).map_err(aborted())?;

        let backed_up = table_count(&tx, &kind.table_name(Role::Backup)).map_err(aborted())?;
        if backed_up == 0 {
            return Err(GenerationError::EmptyBackup { kind });
        }

        swap_current_and_backup(&tx, kind).map_err(aborted())?;
        tx.commit().map_err(aborted())?;

        info!("{}: restored {} rows from backup", kind, backed_up);
        Ok(backed_up)
    }

    /// Point-in-time row counts of the three roles
    pub fn row_counts(&self, kind: DatasetKind) -> Result<GenerationCounts, GenerationError> {
        self.ensure_initialized(kind)?;
        let count = |role| {
            table_count(self.conn, &kind.table_name(role)).map_err(GenerationError::database(kind))
        };

        Ok(GenerationCounts {
            stage: count(Role::Stage)?,
            current: count(Role::Current)?,
            backup: count(Role::Backup)?,
        })
    }

    /// Release date recorded for a role
    pub fn release_date(
        &self,
        kind: DatasetKind,
        role: Role,
    ) -> Result<Option<NaiveDate>, GenerationError> {
        ReleaseLedger::new(self.conn)
            .get(&kind.table_name(role))
            .map_err(GenerationError::database(kind))
    }

    /// Ledger entries of a kind, in role order
    pub fn ledger(&self, kind: DatasetKind) -> Result<Vec<LedgerEntry>, GenerationError> {
        ReleaseLedger::new(self.conn)
            .entries(kind)
            .map_err(GenerationError::database(kind))
    }

    /// Counts and ledger entries of a kind
    pub fn summary(&self, kind: DatasetKind) -> Result<GenerationSummary, GenerationError> {
        Ok(GenerationSummary {
            kind,
            counts: self.row_counts(kind)?,
            ledger: self.ledger(kind)?,
        })
    }
}

/// Rename a table and move its ledger row along with it
fn rebind(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(from),
            quote_ident(to)
        ),
        [],
    )?;
    ReleaseLedger::new(conn).rename(from, to)?;
    Ok(())
}

fn rotate_forward(conn: &Connection, kind: DatasetKind) -> rusqlite::Result<()> {
    let stage = kind.table_name(Role::Stage);
    let current = kind.table_name(Role::Current);
    let backup = kind.table_name(Role::Backup);
    let temp = kind.temp_table_name();

    rebind(conn, &backup, &temp)?;
    rebind(conn, &current, &backup)?;
    rebind(conn, &stage, &current)?;
    rebind(conn, &temp, &stage)?;

    conn.execute(&format!("DELETE FROM {}", quote_ident(&stage)), [])?;
    ReleaseLedger::new(conn).remove(&stage)?;
    Ok(())
}

fn swap_current_and_backup(conn: &Connection, kind: DatasetKind) -> rusqlite::Result<()> {
    let current = kind.table_name(Role::Current);
    let backup = kind.table_name(Role::Backup);
    let temp = kind.temp_table_name();

    rebind(conn, &backup, &temp)?;
    rebind(conn, &current, &backup)?;
    rebind(conn, &temp, &current)?;
    Ok(())
}
