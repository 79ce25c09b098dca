pub mod restore;
pub mod setup;
pub mod status;
pub mod update;

use ipsnap::utils::format_rows;
use ipsnap::{DatasetKind, KindOutcome, OutputFormat};
use serde::Serialize;
use tabled::Tabled;

/// Parse a dataset kind from its name (`location-v4`) or package (`DB5LITE`)
pub(crate) fn parse_kind(s: &str) -> Result<DatasetKind, String> {
    DatasetKind::from_str(s).ok_or_else(|| {
        let names: Vec<&str> = DatasetKind::ALL.iter().map(|k| k.name()).collect();
        format!("unknown dataset '{}', expected one of: {}", s, names.join(", "))
    })
}

/// The selected kinds, or every kind when none was given
pub(crate) fn kinds_or_all(kinds: &[DatasetKind]) -> Vec<DatasetKind> {
    if kinds.is_empty() {
        DatasetKind::ALL.to_vec()
    } else {
        kinds.to_vec()
    }
}

pub(crate) fn print_rows<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) -> bool {
    match format_rows(rows, format) {
        Ok(out) => {
            println!("{}", out);
            true
        }
        Err(e) => {
            eprintln!("Error formatting output: {}", e);
            false
        }
    }
}

/// Print per-kind outcomes; false if any kind failed
pub(crate) fn print_outcomes(outcomes: &[KindOutcome], format: OutputFormat) -> bool {
    print_rows(outcomes, format) && outcomes.iter().all(|o| o.ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("proxy-v6"), Ok(DatasetKind::ProxyV6));
        assert_eq!(parse_kind("DBASNLITE"), Ok(DatasetKind::AsnV4));
        assert!(parse_kind("geo").unwrap_err().contains("location-v4"));
    }

    #[test]
    fn test_kinds_or_all() {
        assert_eq!(kinds_or_all(&[]).len(), 6);
        assert_eq!(
            kinds_or_all(&[DatasetKind::AsnV6]),
            vec![DatasetKind::AsnV6]
        );
    }
}
