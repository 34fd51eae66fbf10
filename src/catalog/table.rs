//! Physical warehouse tables.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)decimal\s*\(\s*(\d+)\s*,\s*(\d+)\s*\)$").expect("valid regex")
});

/// Value type of a physical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal { precision: u8, scale: u8 },
    Double,
    String,
    Boolean,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Whether values of this column are whole-number counts.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, ColumnType::Decimal { .. } | ColumnType::Double)
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let ty = match normalized.as_str() {
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "int" | "integer" => ColumnType::Int,
            "bigint" | "long" => ColumnType::BigInt,
            "decimal" => ColumnType::Decimal {
                precision: 10,
                scale: 0,
            },
            "double" | "float" => ColumnType::Double,
            "string" | "varchar" | "text" => ColumnType::String,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "timestamp" => ColumnType::Timestamp,
            _ => {
                let caps = DECIMAL_RE
                    .captures(&normalized)
                    .ok_or_else(|| format!("unknown column type '{}'", s))?;
                let precision = caps[1]
                    .parse()
                    .map_err(|_| format!("invalid decimal precision in '{}'", s))?;
                let scale = caps[2]
                    .parse()
                    .map_err(|_| format!("invalid decimal scale in '{}'", s))?;
                ColumnType::Decimal { precision, scale }
            }
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::TinyInt => f.write_str("tinyint"),
            ColumnType::SmallInt => f.write_str("smallint"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
            ColumnType::Double => f.write_str("double"),
            ColumnType::String => f.write_str("string"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Timestamp => f.write_str("timestamp"),
        }
    }
}

/// A physical table in the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicalTable {
    pub name: String,
    pub columns: BTreeMap<String, ColumnType>,
    /// Column the table is physically partitioned by.
    pub partition_key: Option<String>,
    pub description: Option<String>,
}

impl PhysicalTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            partition_key: None,
            description: None,
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.insert(name.into(), ty);
        self
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }
}
