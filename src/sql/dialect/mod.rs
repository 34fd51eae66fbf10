//! SQL Dialect definitions and formatting rules.
//!
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `` ` `` (Databricks), `"` (PostgreSQL)
//! - Date arithmetic: `DATE_SUB`/`DATE_ADD`/`TRUNC`/`ADD_MONTHS` vs
//!   integer and interval arithmetic with `DATE_TRUNC`
//!
//! # Usage
//!
//! ```ignore
//! use text2sql::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("slot_id");  // "slot_id"
//! ```

mod databricks;
pub mod helpers;
mod postgres;

pub use databricks::Databricks;
pub use postgres::Postgres;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::{Token, TokenStream};

/// SQL dialect trait - defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Character used by [`SqlDialect::quote_identifier`].
    fn identifier_quote(&self) -> char;

    /// Quote a string literal with `''` escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a date literal: `DATE 'YYYY-MM-DD'`.
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE '{}'", date)
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit)
            .space()
            .push(Token::LitUInt(limit));
        ts
    }

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // Date arithmetic
    // =========================================================================

    /// `date` shifted by `days` (negative moves back).
    fn emit_date_add(&self, date: &TokenStream, days: i64) -> TokenStream;

    /// First day of the month containing `date`, typed as DATE.
    fn emit_month_start(&self, date: &TokenStream) -> TokenStream;

    /// `date` shifted by `months` (negative moves back), typed as DATE.
    fn emit_add_months(&self, date: &TokenStream, months: i64) -> TokenStream;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Databricks,
    Postgres,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Databricks, Dialect::Postgres];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Databricks => &Databricks,
            Dialect::Postgres => &Postgres,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn identifier_quote(&self) -> char {
        self.dialect().identifier_quote()
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.dialect().format_date_literal(date)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn emit_date_add(&self, date: &TokenStream, days: i64) -> TokenStream {
        self.dialect().emit_date_add(date, days)
    }

    fn emit_month_start(&self, date: &TokenStream) -> TokenStream {
        self.dialect().emit_month_start(date)
    }

    fn emit_add_months(&self, date: &TokenStream, months: i64) -> TokenStream {
        self.dialect().emit_add_months(date, months)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "databricks" | "spark" => Ok(Dialect::Databricks),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(format!(
                "unknown dialect '{}' (expected databricks or postgres)",
                other
            )),
        }
    }
}
