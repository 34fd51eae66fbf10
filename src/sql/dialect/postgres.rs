//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Lowercase case folding for unquoted identifiers
//! - `date +/- integer` yields a date
//! - `DATE_TRUNC` and interval arithmetic yield timestamps, so results are cast back

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn emit_date_add(&self, date: &TokenStream, days: i64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen()
            .append(date)
            .space()
            .push(if days < 0 { Token::Minus } else { Token::Plus })
            .space()
            .push(Token::LitInt(days.abs()))
            .rparen();
        ts
    }

    fn emit_month_start(&self, date: &TokenStream) -> TokenStream {
        let mut trunc = TokenStream::new();
        trunc
            .push(Token::FunctionName("DATE_TRUNC".into()))
            .lparen()
            .push(Token::LitString("month".into()))
            .comma()
            .space()
            .append(date)
            .rparen();
        helpers::emit_cast_date(&trunc)
    }

    fn emit_add_months(&self, date: &TokenStream, months: i64) -> TokenStream {
        let n = months.abs();
        let unit = if n == 1 { "month" } else { "months" };
        let mut shifted = TokenStream::new();
        shifted
            .append(date)
            .space()
            .push(if months < 0 { Token::Minus } else { Token::Plus })
            .space()
            .push(Token::Raw(format!("INTERVAL '{} {}'", n, unit)));
        helpers::emit_cast_date(&shifted)
    }
}
