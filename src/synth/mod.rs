//! SQL synthesis from a resolved request.
//!
//! The [`Synthesizer`] turns a [`ResolvedRequest`] into dialect-specific SQL
//! plus a prose explanation and performance hints:
//!
//! ```text
//! ResolvedRequest ──► TablePlan (primary table + joins)
//!                 ──► MetricExpander (formulas → expressions)
//!                 ──► Query builder ──► SQL text
//! ```
//!
//! Output depends only on the request, the catalog, the dialect and the
//! anchor date passed in; the clock is never read here.

mod expand;
mod explain;
mod plan;

use std::ops::ControlFlow;

use chrono::NaiveDate;
use sqlparser::ast::{visit_expressions_mut, Expr as SqlExpr, Ident};

use crate::catalog::Catalog;
use crate::ir::{RelativeWindow, SortDirection, SqlResponse, TimeRangeError, TimeWindow};
use crate::resolver::{OrderTarget, ResolvedFilter, ResolvedRequest};
use crate::sql::{
    add_months, col, date_add, lit_date, month_start, raw_sql, table_col, Cte, Dialect, Expr,
    ExprExt, OrderByExpr, Query, SelectExpr, SqlDialect, TableRef,
};

use expand::MetricExpander;
use plan::TablePlan;

/// Name of the aggregation CTE used when metric filters apply.
const BASE_CTE: &str = "base";

/// Reasons a resolved request cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("Table '{table}' has no partition key, so it cannot be restricted to {window}")]
    MissingPartitionKey { table: String, window: String },

    #[error("Dimension '{dimension}' has no join path to table '{table}'")]
    NoJoinPath { dimension: String, table: String },

    #[error("Column '{column}' needed by {context} cannot be reached from table '{table}'")]
    UnreachableColumn {
        column: String,
        context: String,
        table: String,
    },

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Metric '{0}' refers back to itself")]
    CircularMetric(String),

    #[error("No fact table could be determined for the request")]
    NoFactTable,

    #[error("Time window cannot be computed: {0}")]
    Window(#[from] TimeRangeError),
}

/// Compiles resolved requests to SQL for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'c> {
    catalog: &'c Catalog,
    dialect: Dialect,
}

impl<'c> Synthesizer<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Build the query, explanation and hints for `request` as of `anchor`.
    pub fn synthesize(
        &self,
        request: &ResolvedRequest<'_>,
        anchor: NaiveDate,
    ) -> Result<SqlResponse, SynthesisError> {
        let bounds = request.window.bounds(anchor)?;
        let plan = TablePlan::build(self.catalog, request)?;
        let query = self.build_query(request, &plan, anchor)?;

        Ok(SqlResponse {
            sql: query.to_sql(self.dialect),
            explanation: explain::explanation(request, &plan, bounds),
            performance_hints: explain::performance_hints(request, &plan, bounds),
        })
    }

    fn build_query(
        &self,
        request: &ResolvedRequest<'_>,
        plan: &TablePlan<'_>,
        anchor: NaiveDate,
    ) -> Result<Query, SynthesisError> {
        let expander = MetricExpander::new(self.catalog, plan);

        let dimension_exprs: Vec<Expr> = request
            .dimensions
            .iter()
            .map(|d| plan.dimension_expr(d))
            .collect();

        let mut select: Vec<SelectExpr> = dimension_exprs
            .iter()
            .cloned()
            .map(SelectExpr::new)
            .collect();
        for metric in &request.metrics {
            select.push(expander.expand(metric)?.alias(&metric.name));
        }

        let mut query = Query::new()
            .select(select)
            .from(TableRef::new(&plan.primary.name));
        for join in &plan.joins {
            query = query.left_join(TableRef::new(join.table), join.constraint());
        }

        if let Some(predicate) = partition_predicate(plan, &request.window, anchor)? {
            query = query.filter(predicate);
        }
        for filter in request.filters.iter().filter(|f| !f.references_metric()) {
            query = query.filter(raw_sql(&filter.text).paren());
        }

        query = query.group_by(dimension_exprs);

        let metric_filters: Vec<_> = request
            .filters
            .iter()
            .filter(|f| f.references_metric())
            .collect();
        let wrapped = !metric_filters.is_empty();

        if wrapped {
            let mut outer = Query::new()
                .with_cte(Cte::new(BASE_CTE, query))
                .select_star()
                .from(TableRef::new(BASE_CTE));
            for filter in metric_filters {
                outer = outer.filter(raw_sql(&self.base_predicate(filter, request)).paren());
            }
            query = outer;
        }

        if let Some((target, direction)) = &request.order_by {
            let expr = match target {
                OrderTarget::Metric(m) => col(&m.name),
                OrderTarget::Dimension(d) if wrapped => col(&d.name),
                OrderTarget::Dimension(d) => plan.dimension_expr(d),
            };
            let order = match direction {
                SortDirection::Asc => OrderByExpr::asc(expr),
                SortDirection::Desc => OrderByExpr::desc(expr).nulls_last(),
            };
            query = query.order_by(vec![order]);
        }
        if let Some(limit) = request.limit {
            query = query.limit(limit);
        }

        Ok(query)
    }

    /// Render a metric filter against the `base` CTE. Names of requested
    /// metrics and grouped dimensions become quoted references to the
    /// CTE's output columns, so they match the aliases exactly.
    fn base_predicate(&self, filter: &ResolvedFilter<'_>, request: &ResolvedRequest<'_>) -> String {
        let quote = self.dialect.identifier_quote();
        let outputs: Vec<&str> = request
            .dimensions
            .iter()
            .map(|d| d.name.as_str())
            .chain(request.metrics.iter().map(|m| m.name.as_str()))
            .collect();

        let mut predicate = filter.predicate.clone();
        let _ = visit_expressions_mut(&mut predicate, |expr| {
            if let SqlExpr::Identifier(ident) = expr {
                if let Some(name) = outputs.iter().find(|n| n.eq_ignore_ascii_case(&ident.value)) {
                    *ident = Ident::with_quote(quote, *name);
                }
            }
            ControlFlow::<()>::Continue(())
        });
        predicate.to_string()
    }
}

/// Restriction of the primary table's partition key to the window.
///
/// Relative windows are half-open ranges computed from the anchor literal,
/// absolute windows are inclusive `BETWEEN` ranges, and `all_time` only
/// requires the key to be present.
fn partition_predicate(
    plan: &TablePlan<'_>,
    window: &TimeWindow,
    anchor: NaiveDate,
) -> Result<Option<Expr>, SynthesisError> {
    let Some(key) = &plan.primary.partition_key else {
        if window.is_all_time() {
            return Ok(None);
        }
        return Err(SynthesisError::MissingPartitionKey {
            table: plan.primary.name.clone(),
            window: match window {
                TimeWindow::Relative(w) => w.to_string(),
                TimeWindow::Absolute { start, end } => format!("{}/{}", start, end),
            },
        });
    };
    let key_col = || table_col(&plan.primary.name, key);
    let a = || lit_date(anchor);

    let (start, end) = match window {
        TimeWindow::Absolute { start, end } => {
            return Ok(Some(key_col().between(*start, *end)));
        }
        TimeWindow::Relative(relative) => match relative {
            RelativeWindow::AllTime => return Ok(Some(key_col().is_not_null())),
            RelativeWindow::Today => (a(), date_add(a(), 1)),
            RelativeWindow::Yesterday => (date_add(a(), -1), a()),
            RelativeWindow::Last7Days => (date_add(a(), -7), a()),
            RelativeWindow::Last14Days => (date_add(a(), -14), a()),
            RelativeWindow::Last30Days => (date_add(a(), -30), a()),
            RelativeWindow::Last90Days => (date_add(a(), -90), a()),
            RelativeWindow::ThisMonth => (month_start(a()), date_add(a(), 1)),
            RelativeWindow::LastMonth => (add_months(month_start(a()), -1), month_start(a())),
        },
    };

    Ok(Some(key_col().gte(start).and(key_col().lt(end))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{StructuredRequirement, TimeRange};
    use crate::resolver::{Resolver, Verdict};
    use crate::sql::test_utils::validate_sql;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn compile(catalog: &Catalog, ir: &StructuredRequirement, dialect: Dialect) -> SqlResponse {
        let Verdict::Complete(request) = Resolver::new(catalog).resolve(ir) else {
            panic!("expected complete request");
        };
        Synthesizer::new(catalog)
            .with_dialect(dialect)
            .synthesize(&request, anchor())
            .unwrap()
    }

    fn totals(window: &str) -> StructuredRequirement {
        StructuredRequirement::new()
            .with_metrics(["impressions"])
            .totals()
            .with_time_range(TimeRange::relative(window))
    }

    #[test]
    fn test_window_predicates_databricks() {
        let catalog = Catalog::builtin().unwrap();
        let cases = [
            ("today", "`dwd_ad_impression`.`dt` >= DATE '2024-06-15' AND `dwd_ad_impression`.`dt` < DATE_ADD(DATE '2024-06-15', 1)"),
            ("yesterday", "`dwd_ad_impression`.`dt` >= DATE_SUB(DATE '2024-06-15', 1) AND `dwd_ad_impression`.`dt` < DATE '2024-06-15'"),
            ("this_month", "`dwd_ad_impression`.`dt` >= TRUNC(DATE '2024-06-15', 'MM') AND `dwd_ad_impression`.`dt` < DATE_ADD(DATE '2024-06-15', 1)"),
            ("last_month", "`dwd_ad_impression`.`dt` >= ADD_MONTHS(TRUNC(DATE '2024-06-15', 'MM'), -1) AND `dwd_ad_impression`.`dt` < TRUNC(DATE '2024-06-15', 'MM')"),
            ("all_time", "`dwd_ad_impression`.`dt` IS NOT NULL"),
        ];
        for (window, predicate) in cases {
            let sql = compile(&catalog, &totals(window), Dialect::Databricks).sql;
            assert!(
                sql.ends_with(&format!("\nWHERE {}", predicate)),
                "{}: {}",
                window,
                sql
            );
            validate_sql(&sql, Dialect::Databricks).unwrap();
        }
    }

    #[test]
    fn test_window_predicates_postgres_parse() {
        let catalog = Catalog::builtin().unwrap();
        for window in RelativeWindow::ALL {
            let sql = compile(&catalog, &totals(window.as_str()), Dialect::Postgres).sql;
            validate_sql(&sql, Dialect::Postgres).unwrap();
        }
    }

    #[test]
    fn test_absolute_window_is_inclusive_between() {
        let catalog = Catalog::builtin().unwrap();
        let ir = StructuredRequirement::new()
            .with_metrics(["spend"])
            .totals()
            .with_time_range(TimeRange::absolute(
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
            ));
        let response = compile(&catalog, &ir, Dialect::Postgres);
        assert!(response.sql.ends_with(
            "WHERE \"dwd_ad_impression\".\"dt\" BETWEEN DATE '2024-05-01' AND DATE '2024-05-31'"
        ));
        assert!(response.performance_hints[0].contains("31 daily partitions"));
    }

    #[test]
    fn test_unpartitioned_table_requires_all_time() {
        let catalog = Catalog::from_toml_str(
            r#"
            [tables.events.columns]
            n = "bigint"

            [metrics.total]
            formula = "SUM(n)"
            dependencies = ["events"]
            type = "count"
            "#,
        )
        .unwrap();
        let ir = StructuredRequirement::new()
            .with_metrics(["total"])
            .totals()
            .with_time_range(TimeRange::relative("last_7_days"));
        let Verdict::Complete(request) = Resolver::new(&catalog).resolve(&ir) else {
            panic!("expected complete request");
        };
        let err = Synthesizer::new(&catalog)
            .synthesize(&request, anchor())
            .unwrap_err();
        assert_eq!(
            err,
            SynthesisError::MissingPartitionKey {
                table: "events".into(),
                window: "last_7_days".into()
            }
        );

        let ir = ir.with_time_range(TimeRange::relative("all_time"));
        let response = compile(&catalog, &ir, Dialect::Databricks);
        assert!(!response.sql.contains("WHERE"));
        assert!(response.performance_hints[0].contains("not partitioned"));
    }
}
