//! Reference extraction for user filter predicates.
//!
//! A filter is accepted only if it parses as exactly one boolean expression
//! that could sit in a `WHERE` clause on its own: no extra statements, set
//! operations, subqueries, or trailing `GROUP BY`/`ORDER BY`/`LIMIT`.

use std::ops::ControlFlow;

use sqlparser::ast::{visit_expressions, Expr, GroupByExpr, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Identifier referenced by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterIdent {
    Bare(String),
    Qualified { table: String, column: String },
}

impl std::fmt::Display for FilterIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterIdent::Bare(name) => f.write_str(name),
            FilterIdent::Qualified { table, column } => write!(f, "{}.{}", table, column),
        }
    }
}

/// Parse `filter` and return its identifiers in order of appearance.
pub fn extract_identifiers(filter: &str) -> Result<Vec<FilterIdent>, String> {
    predicate_identifiers(&parse_predicate(filter)?)
}

/// Parse `filter` as a lone `WHERE` predicate.
///
/// The returned AST carries no comments, so its rendering can be embedded
/// anywhere in a larger statement.
pub fn parse_predicate(filter: &str) -> Result<Expr, String> {
    let statement = format!("SELECT * FROM t WHERE {}", filter);
    let statements =
        Parser::parse_sql(&GenericDialect {}, &statement).map_err(|e| e.to_string())?;

    let [Statement::Query(query)] = statements.as_slice() else {
        return Err("expected a single predicate".into());
    };
    if query.with.is_some()
        || query.order_by.is_some()
        || query.limit.is_some()
        || query.offset.is_some()
    {
        return Err("ORDER BY, LIMIT and OFFSET are not allowed in filters".into());
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err("set operations are not allowed in filters".into());
    };
    let plain_group_by = matches!(&select.group_by, GroupByExpr::Expressions(exprs, _) if exprs.is_empty());
    if !plain_group_by || select.having.is_some() {
        return Err("GROUP BY and HAVING are not allowed in filters".into());
    }
    select
        .selection
        .clone()
        .ok_or_else(|| "expected a predicate".to_string())
}

/// Identifiers of an already parsed predicate; subqueries are rejected.
pub fn predicate_identifiers(predicate: &Expr) -> Result<Vec<FilterIdent>, String> {
    let mut idents = Vec::new();
    let flow = visit_expressions(predicate, |expr| {
        match expr {
            Expr::Identifier(ident) => idents.push(FilterIdent::Bare(ident.value.clone())),
            Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                [table, column] => idents.push(FilterIdent::Qualified {
                    table: table.value.clone(),
                    column: column.value.clone(),
                }),
                _ => return ControlFlow::Break(format!("unsupported identifier {}", expr)),
            },
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => {
                return ControlFlow::Break("subqueries are not allowed in filters".to_string())
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    if let ControlFlow::Break(reason) = flow {
        return Err(reason);
    }

    Ok(idents)
}
