//! Dataset kinds and their static schemas
//!
//! Every supported snapshot has a fixed column layout, address width and set
//! of post-load normalization passes. Column widths follow the publisher's
//! documented field sizes; longer values are truncated by the loader.

use super::codec::KeyWidth;
use serde::{Deserialize, Serialize};

/// Column holding the first address of a range
pub const BEGIN_COLUMN: &str = "ip_from";
/// Column holding the last address of a range
pub const END_COLUMN: &str = "ip_to";
/// Binary key of [`BEGIN_COLUMN`]
pub const BEGIN_KEY_COLUMN: &str = "ip_from_key";
/// Binary key of [`END_COLUMN`]
pub const END_KEY_COLUMN: &str = "ip_to_key";

/// One of the six supported reference datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    LocationV4,
    LocationV6,
    ProxyV4,
    ProxyV6,
    AsnV4,
    AsnV6,
}

/// Role a physical table currently plays for its dataset kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Being prepared by an import
    Stage,
    /// Production data read by consumers
    Current,
    /// Previous production data, kept for rollback
    Backup,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Stage, Role::Current, Role::Backup];

    pub fn suffix(&self) -> &'static str {
        match self {
            Role::Stage => "stage",
            Role::Current => "current",
            Role::Backup => "backup",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Storage class of an attribute column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Text with a maximum length in characters
    Text { max_len: usize },
    /// Floating point (coordinates)
    Real,
    /// Signed integer
    Integer,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text { .. } => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Integer => "INTEGER",
        }
    }
}

/// An attribute column in a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn text(name: &'static str, max_len: usize) -> ColumnSpec {
    ColumnSpec {
        name,
        ty: ColumnType::Text { max_len },
    }
}

const fn real(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        ty: ColumnType::Real,
    }
}

const fn integer(name: &'static str) -> ColumnSpec {
    ColumnSpec {
        name,
        ty: ColumnType::Integer,
    }
}

/// Line terminator used by a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    /// `\r\n`
    Crlf,
    /// `\n`
    Lf,
}

impl std::fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineTerminator::Crlf => write!(f, "CRLF"),
            LineTerminator::Lf => write!(f, "LF"),
        }
    }
}

/// Static description of a dataset kind
#[derive(Debug, Clone, Copy)]
pub struct DatasetSchema {
    /// Publisher package code, also the physical table prefix
    pub package: &'static str,
    /// File name of the CSV inside the published archive
    pub csv_file: &'static str,
    pub width: KeyWidth,
    /// Attribute columns in CSV order, after the two address columns
    pub columns: &'static [ColumnSpec],
    pub terminator: LineTerminator,
    /// Drop IPv4-mapped ranges after loading
    pub mapped_v4_filter: bool,
    /// Rewrite verbose country and region names after loading
    pub country_name_shortening: bool,
}

const LOCATION_COLUMNS: &[ColumnSpec] = &[
    text("country_code", 2),
    text("country_name", 128),
    text("region", 128),
    text("city", 80),
    real("latitude"),
    real("longitude"),
];

const PROXY_COLUMNS: &[ColumnSpec] = &[
    text("proxy_type", 3),
    text("country_code", 2),
    text("country_name", 64),
    text("region", 128),
    text("city", 128),
    text("isp", 256),
    text("domain", 128),
    text("usage_type", 11),
    text("asn", 10),
    text("as_name", 256),
    integer("last_seen"),
    text("threat", 128),
    text("provider", 256),
];

const ASN_COLUMNS: &[ColumnSpec] = &[text("cidr", 43), text("asn", 10), text("as_name", 256)];

const LOCATION_V4: DatasetSchema = DatasetSchema {
    package: "DB5LITE",
    csv_file: "IP2LOCATION-LITE-DB5.CSV",
    width: KeyWidth::V4,
    columns: LOCATION_COLUMNS,
    terminator: LineTerminator::Crlf,
    mapped_v4_filter: false,
    country_name_shortening: true,
};

const LOCATION_V6: DatasetSchema = DatasetSchema {
    package: "DB5LITEIPV6",
    csv_file: "IP2LOCATION-LITE-DB5.IPV6.CSV",
    width: KeyWidth::V6,
    columns: LOCATION_COLUMNS,
    terminator: LineTerminator::Crlf,
    mapped_v4_filter: true,
    country_name_shortening: true,
};

const PROXY_V4: DatasetSchema = DatasetSchema {
    package: "PX11LITE",
    csv_file: "IP2PROXY-LITE-PX11.CSV",
    width: KeyWidth::V4,
    columns: PROXY_COLUMNS,
    terminator: LineTerminator::Lf,
    mapped_v4_filter: false,
    country_name_shortening: true,
};

const PROXY_V6: DatasetSchema = DatasetSchema {
    package: "PX11LITEIPV6",
    csv_file: "IP2PROXY-LITE-PX11.IPV6.CSV",
    width: KeyWidth::V6,
    columns: PROXY_COLUMNS,
    terminator: LineTerminator::Lf,
    mapped_v4_filter: true,
    country_name_shortening: true,
};

const ASN_V4: DatasetSchema = DatasetSchema {
    package: "DBASNLITE",
    csv_file: "IP2LOCATION-LITE-ASN.CSV",
    width: KeyWidth::V4,
    columns: ASN_COLUMNS,
    terminator: LineTerminator::Crlf,
    mapped_v4_filter: false,
    country_name_shortening: false,
};

const ASN_V6: DatasetSchema = DatasetSchema {
    package: "DBASNLITEIPV6",
    csv_file: "IP2LOCATION-LITE-ASN.IPV6.CSV",
    width: KeyWidth::V6,
    columns: ASN_COLUMNS,
    terminator: LineTerminator::Crlf,
    mapped_v4_filter: false,
    country_name_shortening: false,
};

impl DatasetKind {
    pub const ALL: [DatasetKind; 6] = [
        DatasetKind::LocationV4,
        DatasetKind::LocationV6,
        DatasetKind::ProxyV4,
        DatasetKind::ProxyV6,
        DatasetKind::AsnV4,
        DatasetKind::AsnV6,
    ];

    pub fn schema(&self) -> &'static DatasetSchema {
        match self {
            DatasetKind::LocationV4 => &LOCATION_V4,
            DatasetKind::LocationV6 => &LOCATION_V6,
            DatasetKind::ProxyV4 => &PROXY_V4,
            DatasetKind::ProxyV6 => &PROXY_V6,
            DatasetKind::AsnV4 => &ASN_V4,
            DatasetKind::AsnV6 => &ASN_V6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::LocationV4 => "location-v4",
            DatasetKind::LocationV6 => "location-v6",
            DatasetKind::ProxyV4 => "proxy-v4",
            DatasetKind::ProxyV6 => "proxy-v6",
            DatasetKind::AsnV4 => "asn-v4",
            DatasetKind::AsnV6 => "asn-v6",
        }
    }

    /// Parse a kind from its name or its package code (case-insensitive)
    pub fn from_str(s: &str) -> Option<DatasetKind> {
        let s = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s || kind.package().to_lowercase() == s)
    }

    pub fn package(&self) -> &'static str {
        self.schema().package
    }

    /// Physical table name for a role, e.g. `DB5LITE_current`
    pub fn table_name(&self, role: Role) -> String {
        format!("{}_{}", self.package(), role.suffix())
    }

    /// Scratch table name used while a rotation is in flight
    pub fn temp_table_name(&self) -> String {
        format!("{}_temp", self.package())
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl DatasetSchema {
    /// Number of fields expected on each CSV line
    pub fn field_count(&self) -> usize {
        2 + self.columns.len()
    }

    /// All input columns in CSV order
    pub fn input_columns(&self) -> Vec<&'static str> {
        let mut names = vec![BEGIN_COLUMN, END_COLUMN];
        names.extend(self.columns.iter().map(|c| c.name));
        names
    }

    /// Whether the dataset carries a column with the given name
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// SQL type used for the address columns
    ///
    /// 32-bit addresses fit SQLite integers; 128-bit addresses are kept as
    /// decimal text and only compared through their binary keys.
    pub fn address_sql_type(&self) -> &'static str {
        match self.width {
            KeyWidth::V4 => "INTEGER",
            KeyWidth::V6 => "TEXT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            DatasetKind::from_str("location-v4"),
            Some(DatasetKind::LocationV4)
        );
        assert_eq!(
            DatasetKind::from_str("PX11LITEIPV6"),
            Some(DatasetKind::ProxyV6)
        );
        assert_eq!(DatasetKind::from_str("ASN-V6"), Some(DatasetKind::AsnV6));
        assert_eq!(DatasetKind::from_str("city-v4"), None);
    }

    #[test]
    fn test_table_names() {
        assert_eq!(
            DatasetKind::LocationV4.table_name(Role::Stage),
            "DB5LITE_stage"
        );
        assert_eq!(
            DatasetKind::AsnV6.table_name(Role::Backup),
            "DBASNLITEIPV6_backup"
        );
        assert_eq!(DatasetKind::ProxyV4.temp_table_name(), "PX11LITE_temp");
    }

    #[test]
    fn test_field_counts() {
        assert_eq!(DatasetKind::LocationV4.schema().field_count(), 8);
        assert_eq!(DatasetKind::ProxyV6.schema().field_count(), 15);
        assert_eq!(DatasetKind::AsnV4.schema().field_count(), 5);
    }

    #[test]
    fn test_normalization_flags() {
        for kind in DatasetKind::ALL {
            let schema = kind.schema();
            if schema.mapped_v4_filter {
                assert_eq!(schema.width, KeyWidth::V6, "{kind} filters but is not 128-bit");
            }
            if schema.country_name_shortening {
                assert!(schema.has_column("country_name"));
                assert!(schema.has_column("region"));
            }
        }
        assert!(DatasetKind::LocationV6.schema().mapped_v4_filter);
        assert!(DatasetKind::ProxyV6.schema().mapped_v4_filter);
        assert!(!DatasetKind::AsnV4.schema().country_name_shortening);
    }

    #[test]
    fn test_terminators() {
        assert_eq!(
            DatasetKind::ProxyV4.schema().terminator,
            LineTerminator::Lf
        );
        assert_eq!(
            DatasetKind::AsnV6.schema().terminator,
            LineTerminator::Crlf
        );
    }

    #[test]
    fn test_input_columns_start_with_range() {
        let columns = DatasetKind::AsnV4.schema().input_columns();
        assert_eq!(columns, vec!["ip_from", "ip_to", "cidr", "asn", "as_name"]);
    }
}
