//! Post-load normalization of the stage table

use crate::database::core::quote_ident;
use crate::database::{GenerationError, GenerationStore};
use crate::datasets::DatasetKind;
use rusqlite::Connection;
use tracing::debug;

/// Ranges ending at or below this value are IPv4-mapped addresses inside a
/// 128-bit dataset and duplicate the 32-bit dataset
pub const MAPPED_V4_BOUNDARY: u128 = 1 << 48;

/// A rewrite applied to one text column of stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    /// Replace a whole value
    Exact {
        column: &'static str,
        from: &'static str,
        to: &'static str,
    },
    /// Replace any value starting with `prefix`
    Prefix {
        column: &'static str,
        prefix: &'static str,
        to: &'static str,
    },
    /// Cut values at the first occurrence of `separator`
    TruncateAt {
        column: &'static str,
        separator: &'static str,
    },
}

/// Canonical names, applied in order
pub const NAME_RULES: &[NameRule] = &[
    NameRule::Exact {
        column: "country_name",
        from: "United States of America",
        to: "United States",
    },
    NameRule::Prefix {
        column: "country_name",
        prefix: "United Kingdom of Great Britain",
        to: "United Kingdom",
    },
    NameRule::Exact {
        column: "country_name",
        from: "Russian Federation",
        to: "Russia",
    },
    NameRule::Prefix {
        column: "country_name",
        prefix: "Korea (Republic",
        to: "South Korea",
    },
    NameRule::Prefix {
        column: "country_name",
        prefix: "Korea (Democratic",
        to: "North Korea",
    },
    NameRule::TruncateAt {
        column: "country_name",
        separator: " (",
    },
    NameRule::TruncateAt {
        column: "country_name",
        separator: ",",
    },
    NameRule::Exact {
        column: "region",
        from: "District of Columbia",
        to: "D.C.",
    },
];

impl NameRule {
    pub fn column(&self) -> &'static str {
        match self {
            NameRule::Exact { column, .. }
            | NameRule::Prefix { column, .. }
            | NameRule::TruncateAt { column, .. } => column,
        }
    }

    /// Apply the rule to a table, returning the number of rows changed
    pub fn apply(&self, conn: &Connection, table: &str) -> rusqlite::Result<usize> {
        let table = quote_ident(table);
        let replace = |column: &str, to: &str, pattern: String| {
            conn.execute(
                &format!(
                    "UPDATE {} SET {} = ?1 WHERE {} LIKE ?2 ESCAPE '\\'",
                    table, column, column
                ),
                [to, pattern.as_str()],
            )
        };

        match *self {
            NameRule::Exact { column, from, to } => replace(column, to, escape_like(from)),
            NameRule::Prefix { column, prefix, to } => {
                replace(column, to, format!("{}%", escape_like(prefix)))
            }
            NameRule::TruncateAt { column, separator } => conn.execute(
                &format!(
                    "UPDATE {} SET {c} = substr({c}, 1, instr({c}, ?1) - 1) WHERE instr({c}, ?1) > 0",
                    table,
                    c = column
                ),
                [separator],
            ),
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Rewrite verbose country and region names in stage
///
/// Returns the number of values changed across all rules.
pub fn shorten_country_names(
    store: &GenerationStore<'_>,
    kind: DatasetKind,
) -> Result<u64, GenerationError> {
    let schema = kind.schema();
    let rules: Vec<&NameRule> = NAME_RULES
        .iter()
        .filter(|r| schema.has_column(r.column()))
        .collect();

    let per_rule = store.modify_stage(kind, "country name shortening", |tx, stage| {
        let mut counts = Vec::with_capacity(rules.len());
        for rule in &rules {
            counts.push((*rule, rule.apply(tx, stage)?));
        }
        Ok(counts)
    })?;

    let mut total = 0;
    for (rule, changed) in per_rule {
        debug!("{}: {:?} updated {} rows", kind, rule, changed);
        total += changed as u64;
    }
    Ok(total)
}

/// Drop IPv4-mapped ranges from stage
pub fn delete_mapped_v4(
    store: &GenerationStore<'_>,
    kind: DatasetKind,
) -> Result<u64, GenerationError> {
    store.delete_stage_ranges_up_to(kind, MAPPED_V4_BOUNDARY)
}
