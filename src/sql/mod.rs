//! SQL generation module.
//!
//! A type-safe SQL builder that renders the same query for several dialects.
//!
//! - [`query`] - SELECT query builder with CTEs, joins, ORDER BY and LIMIT
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    add_months, aggregate, col, count_star, date_add, func, lit_date, lit_int, lit_number,
    month_start, nullif, raw_sql, star, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
    UnaryOperator,
};
pub use query::{
    Cte, Join, JoinConstraint, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
};
pub use token::{Token, TokenStream};
