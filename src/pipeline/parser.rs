//! Snapshot CSV parser
//!
//! Snapshots are comma separated, double-quoted, one range per line, with a
//! line terminator fixed per dataset kind. Structural problems (wrong field
//! count, bad addresses, wrong terminator) fail the whole file. Value problems
//! in attribute columns are repaired and counted as warnings, the way a bulk
//! loader would coerce them.

use crate::datasets::{AttributeValue, ColumnType, DatasetSchema, LineTerminator, RangeRow};
use csv::{ByteRecord, ReaderBuilder, Terminator};
use serde::Serialize;
use std::io::Read;

/// A malformed snapshot line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number, 0 if the failure is not tied to a line
    pub line: u64,
    pub reason: String,
}

impl ParseError {
    fn new(line: u64, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "line {}: {}", self.line, self.reason)
        }
    }
}

impl std::error::Error for ParseError {}

/// A repaired value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub line: u64,
    pub column: &'static str,
    pub message: String,
}

/// Rows parsed from one snapshot file
#[derive(Debug, Default)]
pub struct ParsedSnapshot {
    pub rows: Vec<RangeRow>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a snapshot for the given schema
pub fn parse_snapshot<R: Read>(
    schema: &DatasetSchema,
    reader: R,
) -> Result<ParsedSnapshot, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote(b'"')
        .terminator(Terminator::Any(b'\n'))
        .from_reader(LastByte::new(reader));

    let mut snapshot = ParsedSnapshot::default();
    let mut record = ByteRecord::new();
    // Line of a CRLF-kind record that ended without `\r`; only a final
    // record with no terminator at all may do so
    let mut bare_lf_line: Option<u64> = None;

    loop {
        let has_record = reader.read_byte_record(&mut record).map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            ParseError::new(line, format!("unreadable record: {}", e))
        })?;
        if !has_record {
            break;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if let Some(previous) = bare_lf_line {
            return Err(ParseError::new(
                previous,
                format!("expected {} line terminator", schema.terminator),
            ));
        }

        let mut fields: Vec<&[u8]> = record.iter().collect();
        if let Some(last) = fields.last_mut() {
            let has_cr = last.last() == Some(&b'\r');
            match schema.terminator {
                LineTerminator::Crlf if has_cr => {
                    let field: &[u8] = *last;
                    *last = &field[..field.len() - 1];
                }
                LineTerminator::Crlf => bare_lf_line = Some(line),
                LineTerminator::Lf if has_cr => {
                    return Err(ParseError::new(
                        line,
                        format!("expected {} line terminator, found CRLF", schema.terminator),
                    ));
                }
                LineTerminator::Lf => {}
            }
        }

        if fields.len() != schema.field_count() {
            return Err(ParseError::new(
                line,
                format!(
                    "expected {} fields, found {}",
                    schema.field_count(),
                    fields.len()
                ),
            ));
        }

        let row = parse_row(schema, line, &fields, &mut snapshot.warnings)?;
        snapshot.rows.push(row);
    }

    if let Some(last) = bare_lf_line {
        if reader.get_ref().last == Some(b'\n') {
            return Err(ParseError::new(
                last,
                format!("expected {} line terminator", schema.terminator),
            ));
        }
    }

    Ok(snapshot)
}

/// Reader that remembers the last byte it handed out
struct LastByte<R> {
    inner: R,
    last: Option<u8>,
}

impl<R> LastByte<R> {
    fn new(inner: R) -> Self {
        Self { inner, last: None }
    }
}

impl<R: Read> Read for LastByte<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(byte) = buf[..n].last() {
            self.last = Some(*byte);
        }
        Ok(n)
    }
}

fn parse_row(
    schema: &DatasetSchema,
    line: u64,
    fields: &[&[u8]],
    warnings: &mut Vec<ParseWarning>,
) -> Result<RangeRow, ParseError> {
    let begin = parse_address(schema, line, "begin", fields[0])?;
    let end = parse_address(schema, line, "end", fields[1])?;
    if begin > end {
        return Err(ParseError::new(
            line,
            format!("range begin {} is after end {}", begin, end),
        ));
    }

    let mut attributes = Vec::with_capacity(schema.columns.len());
    for (column, raw) in schema.columns.iter().zip(&fields[2..]) {
        let mut warn = |message: String| {
            warnings.push(ParseWarning {
                line,
                column: column.name,
                message,
            })
        };

        let text = String::from_utf8_lossy(raw);
        if let std::borrow::Cow::Owned(_) = text {
            warn("invalid UTF-8 replaced".to_string());
        }

        let value = match column.ty {
            ColumnType::Text { max_len } => {
                let length = text.chars().count();
                if length > max_len {
                    warn(format!("truncated from {} to {} characters", length, max_len));
                    AttributeValue::Text(text.chars().take(max_len).collect())
                } else {
                    AttributeValue::Text(text.into_owned())
                }
            }
            ColumnType::Real => match text.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => AttributeValue::Real(v),
                _ => {
                    warn(format!("'{}' is not a number, stored as 0", text));
                    AttributeValue::Real(0.0)
                }
            },
            ColumnType::Integer => match text.trim().parse::<i64>() {
                Ok(v) => AttributeValue::Integer(v),
                Err(_) => {
                    warn(format!("'{}' is not an integer, stored as 0", text));
                    AttributeValue::Integer(0)
                }
            },
        };
        attributes.push(value);
    }

    Ok(RangeRow::new(begin, end, attributes))
}

fn parse_address(
    schema: &DatasetSchema,
    line: u64,
    name: &str,
    raw: &[u8],
) -> Result<u128, ParseError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| ParseError::new(line, format!("{} address is not UTF-8", name)))?
        .trim();

    let value: u128 = text
        .parse()
        .map_err(|_| ParseError::new(line, format!("{} address '{}' is not numeric", name, text)))?;

    if !schema.width.fits(value) {
        return Err(ParseError::new(
            line,
            format!(
                "{} address {} exceeds {} range",
                name, value, schema.width
            ),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::DatasetKind;

    fn parse(kind: DatasetKind, input: &str) -> Result<ParsedSnapshot, ParseError> {
        parse_snapshot(kind.schema(), input.as_bytes())
    }

    const LOCATION_LINE: &str = "\"16777216\",\"16777471\",\"US\",\"United States of America\",\"California\",\"Los Angeles\",\"34.052230\",\"-118.243680\"";

    #[test]
    fn test_parse_location_crlf() {
        let second = "\"16777472\",\"16778239\",\"CN\",\"China\",\"Fujian\",\"Fuzhou\",\"26.061390\",\"119.306110\"";
        let input = format!("{}\r\n{}\r\n", LOCATION_LINE, second);
        let snapshot = parse(DatasetKind::LocationV4, &input).unwrap();

        assert_eq!(snapshot.rows.len(), 2);
        assert!(snapshot.warnings.is_empty());

        let row = &snapshot.rows[0];
        assert_eq!(row.begin, 16_777_216);
        assert_eq!(row.end, 16_777_471);
        assert_eq!(row.attributes[0], AttributeValue::Text("US".to_string()));
        assert_eq!(row.attributes[5], AttributeValue::Real(-118.24368));
    }

    #[test]
    fn test_final_line_without_terminator() {
        let snapshot = parse(DatasetKind::LocationV4, LOCATION_LINE).unwrap();
        assert_eq!(snapshot.rows.len(), 1);
    }

    #[test]
    fn test_crlf_kind_rejects_lf() {
        let input = format!("{}\n{}\r\n", LOCATION_LINE, LOCATION_LINE);
        let err = parse(DatasetKind::LocationV4, &input).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("CRLF"));
    }

    #[test]
    fn test_crlf_kind_rejects_lf_on_final_line() {
        let asn = "\"0\",\"255\",\"0.0.0.0/24\",\"-\",\"-\"";

        let err = parse(DatasetKind::AsnV4, &format!("{}\r\n{}\n", asn, asn)).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("CRLF"));

        let err = parse(DatasetKind::AsnV4, &format!("{}\n", asn)).unwrap_err();
        assert_eq!(err.line, 1);

        let snapshot = parse(DatasetKind::AsnV4, &format!("{}\r\n{}", asn, asn)).unwrap();
        assert_eq!(snapshot.rows.len(), 2);
    }

    #[test]
    fn test_lf_kind_rejects_crlf() {
        let line = "\"1\",\"2\",\"VPN\",\"US\",\"United States of America\",\"Texas\",\"Dallas\",\"Example ISP\",\"example.com\",\"DCH\",\"64512\",\"Example AS\",\"5\",\"-\",\"-\"";
        assert_eq!(
            parse(DatasetKind::ProxyV4, &format!("{}\n", line))
                .unwrap()
                .rows
                .len(),
            1
        );
        let err = parse(DatasetKind::ProxyV4, &format!("{}\r\n", line)).unwrap_err();
        assert!(err.reason.contains("LF"));
    }

    #[test]
    fn test_wrong_field_count() {
        let err = parse(DatasetKind::AsnV4, "\"1\",\"2\",\"0.0.0.1/32\"\r\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("expected 5 fields, found 3"));
    }

    #[test]
    fn test_bad_addresses() {
        let err = parse(DatasetKind::AsnV4, "\"x\",\"2\",\"-\",\"-\",\"-\"\r\n").unwrap_err();
        assert!(err.reason.contains("not numeric"));

        let err = parse(DatasetKind::AsnV4, "\"0\",\"4294967296\",\"-\",\"-\",\"-\"\r\n")
            .unwrap_err();
        assert!(err.reason.contains("exceeds"));

        let err = parse(DatasetKind::AsnV4, "\"9\",\"2\",\"-\",\"-\",\"-\"\r\n").unwrap_err();
        assert!(err.reason.contains("after end"));

        let input = "\"0\",\"340282366920938463463374607431768211455\",\"::/0\",\"-\",\"-\"\r\n";
        let snapshot = parse(DatasetKind::AsnV6, input).unwrap();
        assert_eq!(snapshot.rows[0].end, u128::MAX);
    }

    #[test]
    fn test_value_repairs_are_warnings() {
        let long_city = "x".repeat(100);
        let input = format!(
            "\"0\",\"255\",\"US\",\"United States of America\",\"Texas\",\"{}\",\"n/a\",\"1.5\"\r\n",
            long_city
        );
        let snapshot = parse(DatasetKind::LocationV4, &input).unwrap();

        assert_eq!(snapshot.warnings.len(), 2);
        assert_eq!(snapshot.warnings[0].column, "city");
        assert_eq!(snapshot.warnings[1].column, "latitude");

        let row = &snapshot.rows[0];
        assert_eq!(row.attributes[3], AttributeValue::Text("x".repeat(80)));
        assert_eq!(row.attributes[4], AttributeValue::Real(0.0));
    }

    #[test]
    fn test_quoted_commas_stay_in_field() {
        let input = "\"0\",\"255\",\"CD\",\"Congo, Democratic Republic of the\",\"Kinshasa\",\"Kinshasa\",\"-4.3\",\"15.3\"\r\n";
        let snapshot = parse(DatasetKind::LocationV4, input).unwrap();
        assert_eq!(
            snapshot.rows[0].attributes[1],
            AttributeValue::Text("Congo, Democratic Republic of the".to_string())
        );
    }
}
