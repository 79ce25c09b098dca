//! Range rows as loaded from a snapshot

use super::codec::{self, KeyWidth};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::{Deserialize, Serialize};

/// A single attribute value of a range row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Real(f64),
    Integer(i64),
}

impl ToSql for AttributeValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            AttributeValue::Text(s) => ToSqlOutput::from(s.as_str()),
            AttributeValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            AttributeValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
        })
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::Real(r) => write!(f, "{}", r),
            AttributeValue::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// One address range with its kind-specific attributes
///
/// Attributes are in the order of the dataset schema's columns. Binary keys
/// are never carried on the row; they are derived from `begin`/`end` when the
/// row is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRow {
    pub begin: u128,
    pub end: u128,
    pub attributes: Vec<AttributeValue>,
}

impl RangeRow {
    pub fn new(begin: u128, end: u128, attributes: Vec<AttributeValue>) -> Self {
        Self {
            begin,
            end,
            attributes,
        }
    }

    /// Binary key pair `(begin_key, end_key)` for the given width
    ///
    /// Returns `None` if either endpoint does not fit in the width.
    pub fn keys(&self, width: KeyWidth) -> Option<(Vec<u8>, Vec<u8>)> {
        Some((
            codec::encode(self.begin, width)?,
            codec::encode(self.end, width)?,
        ))
    }
}

/// SQL value for an address endpoint
///
/// 32-bit endpoints are stored as integers, 128-bit endpoints as decimal
/// text since they exceed SQLite's signed 64-bit integers.
pub fn address_value(value: u128, width: KeyWidth) -> Value {
    match width {
        KeyWidth::V4 => Value::Integer(value as i64),
        KeyWidth::V6 => Value::Text(value.to_string()),
    }
}
