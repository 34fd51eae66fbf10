//! Shared helper functions for SQL dialect implementations.

use super::super::token::{Token, TokenStream};

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: Databricks
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Emit `NAME(arg, n)` with the given function name.
pub fn emit_call_with_int(name: &str, arg: &TokenStream, n: i64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName(name.into()))
        .lparen()
        .append(arg)
        .comma()
        .space()
        .push(Token::LitInt(n))
        .rparen();
    ts
}

/// Emit `CAST(inner AS DATE)`.
pub fn emit_cast_date(inner: &TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("CAST".into()))
        .lparen()
        .append(inner)
        .space()
        .push(Token::As)
        .space()
        .push(Token::Raw("DATE".into()))
        .rparen();
    ts
}
