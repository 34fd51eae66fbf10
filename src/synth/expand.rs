//! Metric formula expansion into SQL expressions.

use crate::catalog::{AggregateFunc, ArithOp, Catalog, FormulaExpr, MetricDefinition, MetricType};
use crate::sql::{aggregate, count_star, lit_int, lit_number, nullif, sum, table_col, Expr, ExprExt};

use super::plan::TablePlan;
use super::SynthesisError;

/// Expands metric formulas against a table plan.
///
/// Bare columns are summed, metric references are inlined in parentheses
/// followed by a comment with the referenced name, and divisions by
/// count-like terms are guarded with `NULLIF(.., 0)`.
pub(crate) struct MetricExpander<'p, 'a> {
    catalog: &'a Catalog,
    plan: &'p TablePlan<'a>,
}

impl<'p, 'a> MetricExpander<'p, 'a> {
    pub fn new(catalog: &'a Catalog, plan: &'p TablePlan<'a>) -> Self {
        Self { catalog, plan }
    }

    pub fn expand(&self, metric: &MetricDefinition) -> Result<Expr, SynthesisError> {
        let mut stack = vec![metric.name.clone()];
        self.convert(metric.formula.expr(), metric, false, &mut stack)
    }

    fn convert(
        &self,
        expr: &FormulaExpr,
        metric: &MetricDefinition,
        in_aggregate: bool,
        stack: &mut Vec<String>,
    ) -> Result<Expr, SynthesisError> {
        match expr {
            FormulaExpr::Ident(name) => {
                if let Some(table) = self.column_table(metric, name)? {
                    let column = table_col(table, name);
                    return Ok(if in_aggregate { column } else { sum(column) });
                }
                let referenced = self
                    .catalog
                    .metric(name)
                    .ok_or_else(|| SynthesisError::UnknownMetric(name.clone()))?;
                if stack.contains(&referenced.name) {
                    return Err(SynthesisError::CircularMetric(referenced.name.clone()));
                }
                stack.push(referenced.name.clone());
                let inner = self.convert(referenced.formula.expr(), referenced, false, stack)?;
                stack.pop();
                Ok(inner.paren().commented(&referenced.name))
            }
            FormulaExpr::Number(n) => Ok(lit_number(n)),
            FormulaExpr::Aggregate {
                func,
                arg,
                distinct,
            } => match arg {
                None => Ok(count_star()),
                Some(arg) => {
                    let arg = self.convert(arg, metric, true, stack)?;
                    Ok(aggregate(func.as_str(), arg, *distinct))
                }
            },
            FormulaExpr::Binary { left, op, right } => {
                let l = self.convert(left, metric, in_aggregate, stack)?;
                let r = self.convert(right, metric, in_aggregate, stack)?;
                Ok(match op {
                    ArithOp::Add => l.add(r),
                    ArithOp::Sub => l.sub(r),
                    ArithOp::Mul => l.mul(r),
                    ArithOp::Div if self.is_count_like(right, metric) => {
                        l.div(nullif(r, lit_int(0)))
                    }
                    ArithOp::Div => l.div(r),
                })
            }
            FormulaExpr::Negate(inner) => Ok(self.convert(inner, metric, in_aggregate, stack)?.neg()),
            FormulaExpr::Nested(inner) => Ok(self.convert(inner, metric, in_aggregate, stack)?.paren()),
        }
    }

    /// The readable table providing `column` for `metric`, if the name is a
    /// column of one of its dependencies.
    fn column_table(
        &self,
        metric: &MetricDefinition,
        column: &str,
    ) -> Result<Option<&'a str>, SynthesisError> {
        let owns = |table: &str| {
            metric.dependencies.iter().any(|d| d == table)
                && self
                    .catalog
                    .lookup_table(table)
                    .is_some_and(|t| t.has_column(column))
        };

        if let Some(table) = self.plan.tables_in_scope().find(|t| owns(t)) {
            return Ok(Some(table));
        }
        if metric.dependencies.iter().any(|d| owns(d)) {
            return Err(SynthesisError::UnreachableColumn {
                column: column.to_string(),
                context: format!("metric '{}'", metric.name),
                table: self.plan.primary.name.clone(),
            });
        }
        Ok(None)
    }

    /// Whether a divisor counts rows or events: `COUNT(..)`, a sum of an
    /// integer column, or a reference to a count metric.
    fn is_count_like(&self, expr: &FormulaExpr, metric: &MetricDefinition) -> bool {
        match expr {
            FormulaExpr::Aggregate { func, arg, .. } => match func {
                AggregateFunc::Count => true,
                AggregateFunc::Sum => matches!(
                    arg.as_deref(),
                    Some(FormulaExpr::Ident(c)) if self.is_integer_column(metric, c)
                ),
                _ => false,
            },
            FormulaExpr::Ident(name) => {
                if self.is_integer_column(metric, name) {
                    return true;
                }
                self.catalog
                    .metric(name)
                    .is_some_and(|m| m.metric_type == MetricType::Count)
            }
            FormulaExpr::Nested(inner) => self.is_count_like(inner, metric),
            _ => false,
        }
    }

    fn is_integer_column(&self, metric: &MetricDefinition, column: &str) -> bool {
        metric.dependencies.iter().any(|table| {
            self.catalog
                .lookup_table(table)
                .and_then(|t| t.column_type(column))
                .is_some_and(|ty| ty.is_integer())
        })
    }
}
