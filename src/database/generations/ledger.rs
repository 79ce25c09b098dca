//! Release ledger
//!
//! The ledger records, per populated physical table, the release date of the
//! snapshot it holds. Rows are keyed by table name, so every table rename in a
//! rotation is paired with a ledger rename in the same transaction.

use crate::database::core::RELEASE_TABLE;
use crate::datasets::{DatasetKind, Role};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A ledger row resolved to the role it currently describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: DatasetKind,
    pub role: Role,
    pub table_name: String,
    pub release_date: NaiveDate,
}

/// Access to the `release_dates` table
///
/// Works on a plain connection or, through deref, on an open transaction.
pub struct ReleaseLedger<'a> {
    conn: &'a Connection,
}

impl<'a> ReleaseLedger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Release date recorded for a table
    pub fn get(&self, table_name: &str) -> rusqlite::Result<Option<NaiveDate>> {
        let value: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT release_date FROM {} WHERE table_name = ?1",
                    RELEASE_TABLE
                ),
                [table_name],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|s| {
                NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()
    }

    /// Insert or update the release date of a table
    pub fn upsert(&self, table_name: &str, release_date: NaiveDate) -> rusqlite::Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (table_name, release_date) VALUES (?1, ?2)
                 ON CONFLICT(table_name) DO UPDATE SET release_date = excluded.release_date",
                RELEASE_TABLE
            ),
            params![table_name, release_date.format(DATE_FORMAT).to_string()],
        )?;
        Ok(())
    }

    /// Move a ledger row to follow a renamed table
    pub fn rename(&self, from: &str, to: &str) -> rusqlite::Result<usize> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET table_name = ?1 WHERE table_name = ?2",
                RELEASE_TABLE
            ),
            [to, from],
        )
    }

    /// Remove the ledger row of a table
    pub fn remove(&self, table_name: &str) -> rusqlite::Result<usize> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE table_name = ?1", RELEASE_TABLE),
            [table_name],
        )
    }

    /// Remove every ledger row belonging to a dataset kind
    pub fn clear_kind(&self, kind: DatasetKind) -> rusqlite::Result<usize> {
        let mut removed = self.remove(&kind.temp_table_name())?;
        for role in Role::ALL {
            removed += self.remove(&kind.table_name(role))?;
        }
        Ok(removed)
    }

    /// All ledger entries of a dataset kind, in role order
    pub fn entries(&self, kind: DatasetKind) -> rusqlite::Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        for role in Role::ALL {
            let table_name = kind.table_name(role);
            if let Some(release_date) = self.get(&table_name)? {
                entries.push(LedgerEntry {
                    kind,
                    role,
                    table_name,
                    release_date,
                });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::SchemaManager;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        SchemaManager::new(&conn).initialize().unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = setup();
        let ledger = ReleaseLedger::new(&conn);

        assert_eq!(ledger.get("DB5LITE_stage").unwrap(), None);

        ledger.upsert("DB5LITE_stage", date(2024, 1, 15)).unwrap();
        assert_eq!(
            ledger.get("DB5LITE_stage").unwrap(),
            Some(date(2024, 1, 15))
        );

        ledger.upsert("DB5LITE_stage", date(2024, 2, 1)).unwrap();
        assert_eq!(ledger.get("DB5LITE_stage").unwrap(), Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_rename_and_remove() {
        let conn = setup();
        let ledger = ReleaseLedger::new(&conn);

        ledger.upsert("DB5LITE_stage", date(2024, 1, 15)).unwrap();
        assert_eq!(ledger.rename("DB5LITE_stage", "DB5LITE_current").unwrap(), 1);
        assert_eq!(ledger.get("DB5LITE_stage").unwrap(), None);
        assert_eq!(
            ledger.get("DB5LITE_current").unwrap(),
            Some(date(2024, 1, 15))
        );

        // Renaming a missing row is a no-op
        assert_eq!(ledger.rename("DB5LITE_backup", "DB5LITE_temp").unwrap(), 0);

        assert_eq!(ledger.remove("DB5LITE_current").unwrap(), 1);
        assert_eq!(ledger.get("DB5LITE_current").unwrap(), None);
    }

    #[test]
    fn test_entries_by_role() {
        let conn = setup();
        let ledger = ReleaseLedger::new(&conn);
        let kind = DatasetKind::ProxyV4;

        ledger
            .upsert(&kind.table_name(Role::Backup), date(2023, 12, 1))
            .unwrap();
        ledger
            .upsert(&kind.table_name(Role::Current), date(2024, 1, 1))
            .unwrap();
        ledger.upsert("DB5LITE_current", date(2024, 1, 1)).unwrap();

        let entries = ledger.entries(kind).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::Current);
        assert_eq!(entries[1].role, Role::Backup);
        assert_eq!(entries[1].release_date, date(2023, 12, 1));

        assert_eq!(ledger.clear_kind(kind).unwrap(), 2);
        assert!(ledger.entries(kind).unwrap().is_empty());
        assert!(ledger.get("DB5LITE_current").unwrap().is_some());
    }
}
