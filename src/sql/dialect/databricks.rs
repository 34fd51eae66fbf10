//! Databricks (Spark SQL) dialect.
//!
//! Databricks features:
//! - Backtick identifier quoting
//! - `DATE_ADD`/`DATE_SUB` take a day count
//! - `TRUNC(date, 'MM')` and `ADD_MONTHS` return DATE

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// Databricks (Spark SQL) dialect.
#[derive(Debug, Clone, Copy)]
pub struct Databricks;

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn emit_date_add(&self, date: &TokenStream, days: i64) -> TokenStream {
        if days < 0 {
            helpers::emit_call_with_int("DATE_SUB", date, -days)
        } else {
            helpers::emit_call_with_int("DATE_ADD", date, days)
        }
    }

    fn emit_month_start(&self, date: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("TRUNC".into()))
            .lparen()
            .append(date)
            .comma()
            .space()
            .push(Token::LitString("MM".into()))
            .rparen();
        ts
    }

    fn emit_add_months(&self, date: &TokenStream, months: i64) -> TokenStream {
        helpers::emit_call_with_int("ADD_MONTHS", date, months)
    }
}
