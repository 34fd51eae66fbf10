//! Metric formula parsing.
//!
//! Formulas are written as SQL scalar expressions over column and metric
//! names, e.g. `click_cnt / impression_cnt` or `SUM(cost) / clicks`.
//! They are parsed once, at catalog construction, with sqlparser and kept
//! as a small closed AST so the synthesizer never re-parses text.

use serde::{Serialize, Serializer};
use sqlparser::ast::{
    self as sql, BinaryOperator as SqlBinaryOp, Expr as SqlExpr, UnaryOperator as SqlUnaryOp,
    Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Error raised when a formula cannot be turned into a [`FormulaExpr`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("aggregate {0} may not contain another aggregate")]
    NestedAggregate(String),
}

/// Aggregate functions a formula may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(Self::Sum),
            "COUNT" => Some(Self::Count),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Count => "COUNT",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Arithmetic operators allowed between formula terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed formula expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormulaExpr {
    /// A column of a dependency table, or another metric.
    Ident(String),
    /// Numeric literal, kept as written.
    Number(String),
    /// `FUNC(arg)`; `arg` is `None` for `COUNT(*)`.
    Aggregate {
        func: AggregateFunc,
        arg: Option<Box<FormulaExpr>>,
        distinct: bool,
    },
    Binary {
        left: Box<FormulaExpr>,
        op: ArithOp,
        right: Box<FormulaExpr>,
    },
    Negate(Box<FormulaExpr>),
    Nested(Box<FormulaExpr>),
}

impl FormulaExpr {
    /// Visit every identifier together with whether it sits inside an aggregate.
    pub fn walk_idents<'a>(&'a self, f: &mut impl FnMut(&'a str, bool)) {
        self.walk_inner(false, f);
    }

    fn walk_inner<'a>(&'a self, in_aggregate: bool, f: &mut impl FnMut(&'a str, bool)) {
        match self {
            FormulaExpr::Ident(name) => f(name, in_aggregate),
            FormulaExpr::Number(_) => {}
            FormulaExpr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.walk_inner(true, f);
                }
            }
            FormulaExpr::Binary { left, right, .. } => {
                left.walk_inner(in_aggregate, f);
                right.walk_inner(in_aggregate, f);
            }
            FormulaExpr::Negate(inner) | FormulaExpr::Nested(inner) => {
                inner.walk_inner(in_aggregate, f)
            }
        }
    }
}

/// A metric formula: the source text plus its parsed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    source: String,
    expr: FormulaExpr,
}

impl Formula {
    /// Parse a formula.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(FormulaError::Empty);
        }

        let wrapped = format!("SELECT {}", trimmed);
        let statements = Parser::parse_sql(&GenericDialect {}, &wrapped)
            .map_err(|e| FormulaError::Syntax(e.to_string()))?;

        let [statement] = statements.as_slice() else {
            return Err(FormulaError::Syntax("expected a single expression".into()));
        };

        let expr = match statement {
            sql::Statement::Query(query) => match query.body.as_ref() {
                sql::SetExpr::Select(select)
                    if select.from.is_empty() && select.selection.is_none() =>
                {
                    match select.projection.as_slice() {
                        [sql::SelectItem::UnnamedExpr(expr)] => convert(expr, false)?,
                        _ => {
                            return Err(FormulaError::Syntax(
                                "expected a single unaliased expression".into(),
                            ))
                        }
                    }
                }
                _ => return Err(FormulaError::Syntax("expected a scalar expression".into())),
            },
            _ => return Err(FormulaError::Syntax("expected a scalar expression".into())),
        };

        Ok(Self {
            source: trimmed.to_string(),
            expr,
        })
    }

    /// The formula as written in the catalog.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &FormulaExpr {
        &self.expr
    }

    /// Referenced identifiers in first-appearance order, without duplicates.
    pub fn references(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.expr.walk_idents(&mut |name, _| {
            if !names.contains(&name) {
                names.push(name);
            }
        });
        names
    }

    /// Identifiers that appear inside an aggregate call.
    pub fn aggregated_references(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.expr.walk_idents(&mut |name, in_aggregate| {
            if in_aggregate && !names.contains(&name) {
                names.push(name);
            }
        });
        names
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Formula {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

fn convert(expr: &SqlExpr, in_aggregate: bool) -> Result<FormulaExpr, FormulaError> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(FormulaExpr::Ident(ident.value.clone())),

        SqlExpr::Value(SqlValue::Number(n, _)) => match n.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(FormulaExpr::Number(n.clone())),
            _ => Err(FormulaError::Unsupported(format!("number {}", n))),
        },

        SqlExpr::BinaryOp { left, op, right } => {
            let op = match op {
                SqlBinaryOp::Plus => ArithOp::Add,
                SqlBinaryOp::Minus => ArithOp::Sub,
                SqlBinaryOp::Multiply => ArithOp::Mul,
                SqlBinaryOp::Divide => ArithOp::Div,
                other => return Err(FormulaError::Unsupported(format!("operator {}", other))),
            };
            Ok(FormulaExpr::Binary {
                left: Box::new(convert(left, in_aggregate)?),
                op,
                right: Box::new(convert(right, in_aggregate)?),
            })
        }

        SqlExpr::UnaryOp { op, expr } => match op {
            SqlUnaryOp::Minus => Ok(FormulaExpr::Negate(Box::new(convert(expr, in_aggregate)?))),
            SqlUnaryOp::Plus => convert(expr, in_aggregate),
            other => Err(FormulaError::Unsupported(format!("operator {}", other))),
        },

        SqlExpr::Nested(inner) => Ok(FormulaExpr::Nested(Box::new(convert(inner, in_aggregate)?))),

        SqlExpr::Function(func) => convert_aggregate(func, in_aggregate),

        other => Err(FormulaError::Unsupported(other.to_string())),
    }
}

fn convert_aggregate(func: &sql::Function, in_aggregate: bool) -> Result<FormulaExpr, FormulaError> {
    let name = func.name.to_string();
    let agg = AggregateFunc::from_name(&name)
        .ok_or_else(|| FormulaError::Unsupported(format!("function {}", name)))?;

    if in_aggregate {
        return Err(FormulaError::NestedAggregate(agg.as_str().to_string()));
    }
    if func.over.is_some() || func.filter.is_some() {
        return Err(FormulaError::Unsupported(format!(
            "window or FILTER clause on {}",
            agg.as_str()
        )));
    }

    let list = match &func.args {
        sql::FunctionArguments::List(list) => list,
        _ => {
            return Err(FormulaError::Unsupported(format!(
                "{} without an argument list",
                agg.as_str()
            )))
        }
    };

    let distinct = matches!(
        list.duplicate_treatment,
        Some(sql::DuplicateTreatment::Distinct)
    );

    let arg = match list.args.as_slice() {
        [sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard)]
            if agg == AggregateFunc::Count && !distinct =>
        {
            None
        }
        [sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e))] => {
            Some(Box::new(convert(e, true)?))
        }
        _ => {
            return Err(FormulaError::Unsupported(format!(
                "{} expects exactly one argument",
                agg.as_str()
            )))
        }
    };

    Ok(FormulaExpr::Aggregate {
        func: agg,
        arg,
        distinct,
    })
}
