//! Expression AST - the core of SQL expression building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.

use chrono::NaiveDate;

use super::dialect::{Dialect, SqlDialect};
use super::query::SelectExpr;
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// BETWEEN: expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// expr IS NOT NULL
    IsNotNull(Box<Expr>),

    /// Wildcard: *
    Star,

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Expression followed by a block comment naming it.
    Commented { expr: Box<Expr>, comment: String },

    /// Date shifted by a number of days, rendered by the dialect.
    DateAdd { date: Box<Expr>, days: i64 },

    /// First day of the month of a date, rendered by the dialect.
    MonthStart(Box<Expr>),

    /// Date shifted by a number of months, rendered by the dialect.
    AddMonths { date: Box<Expr>, months: i64 },

    /// Raw SQL expression passed directly to output without escaping.
    ///
    /// Only for validated filter predicates and static fragments. Values
    /// should go through `Expr::Literal` so they are escaped per dialect.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    /// Numeric literal kept exactly as written.
    Number(String),
    Date(NaiveDate),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Lt,
    Gte,
    // Logical
    And,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
}

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Number(n) => Token::LitNumber(n.clone()),
                    Literal::Date(d) => Token::LitDate(d.format("%Y-%m-%d").to_string()),
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Minus => ts.push(Token::Minus),
                };
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Between { expr, low, high } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space().push(Token::Between).space();
                ts.append(&low.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNotNull(expr) => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space().push(Token::IsNotNull);
            }

            Expr::Star => {
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Commented { expr, comment } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space().push(Token::Comment(comment.clone()));
            }

            Expr::DateAdd { date, days } => {
                let date = date.to_tokens_for_dialect(dialect);
                ts.append(&dialect.emit_date_add(&date, *days));
            }

            Expr::MonthStart(date) => {
                let date = date.to_tokens_for_dialect(dialect);
                ts.append(&dialect.emit_month_start(&date));
            }

            Expr::AddMonths { date, months } => {
                let date = date.to_tokens_for_dialect(dialect);
                ts.append(&dialect.emit_add_months(&date, *months));
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Render this expression as SQL text.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Create a qualified column reference (table.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a numeric literal from its source text.
pub fn lit_number(n: &str) -> Expr {
    Expr::Literal(Literal::Number(n.into()))
}

/// Create a date literal.
pub fn lit_date(d: NaiveDate) -> Expr {
    Expr::Literal(Literal::Date(d))
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star
}

/// Raw SQL fragment. See [`Expr::Raw`].
pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

// =============================================================================
// Functions
// =============================================================================

/// COUNT(*)
pub fn count_star() -> Expr {
    func("COUNT", vec![star()])
}

/// SUM(expr)
pub fn sum(expr: Expr) -> Expr {
    func("SUM", vec![expr])
}

/// Aggregate call by name, optionally DISTINCT.
pub fn aggregate(name: &str, arg: Expr, distinct: bool) -> Expr {
    Expr::Function {
        name: name.into(),
        args: vec![arg],
        distinct,
    }
}

/// NULLIF(expr, value)
pub fn nullif(expr: Expr, value: Expr) -> Expr {
    func("NULLIF", vec![expr, value])
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

// =============================================================================
// Date arithmetic
// =============================================================================

/// `date` shifted by `days`.
pub fn date_add(date: Expr, days: i64) -> Expr {
    Expr::DateAdd {
        date: Box::new(date),
        days,
    }
}

/// First day of the month of `date`.
pub fn month_start(date: Expr) -> Expr {
    Expr::MonthStart(Box::new(date))
}

/// `date` shifted by `months`.
pub fn add_months(date: Expr, months: i64) -> Expr {
    Expr::AddMonths {
        date: Box::new(date),
        months,
    }
}

// =============================================================================
// Fluent builder
// =============================================================================

/// Fluent operators available on anything convertible to an [`Expr`].
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    // Comparison operators
    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    // Logical operators
    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn neg(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: Box::new(self.into_expr()),
        }
    }

    // Arithmetic
    fn add(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Plus, other)
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Minus, other)
    }

    fn mul(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Mul, other)
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Div, other)
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNotNull(Box::new(self.into_expr()))
    }

    fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
        }
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }

    fn commented(self, comment: &str) -> Expr {
        Expr::Commented {
            expr: Box::new(self.into_expr()),
            comment: comment.into(),
        }
    }

    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr {
            expr: self.into_expr(),
            alias: Some(name.into()),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<NaiveDate> for Expr {
    fn from(d: NaiveDate) -> Self {
        lit_date(d)
    }
}
