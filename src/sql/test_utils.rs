//! Test utilities for SQL emission validation.
//!
//! Emitted SQL is round-tripped through sqlparser-rs to make sure it is
//! syntactically valid.

use sqlparser::dialect::{GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::Databricks => Box::new(GenericDialect {}), // sqlparser has no Databricks dialect
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM dim_slot", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM `dim_slot`", Dialect::Databricks).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM dim_slot", Dialect::Postgres);
        assert!(result.is_err());
    }
}
