//! Completeness and ambiguity resolution.
//!
//! The [`Resolver`] checks a candidate [`StructuredRequirement`] against the
//! catalog before any SQL is generated and classifies it as complete, in need
//! of clarification, or invalid. It never fills in defaults: every missing or
//! uninterpretable field becomes a [`ClarificationQuestion`].

mod filters;

pub use filters::{extract_identifiers, parse_predicate, predicate_identifiers, FilterIdent};

use crate::catalog::{Catalog, DimensionDefinition, MetricDefinition};
use crate::ir::{
    ClarificationQuestion, RelativeWindow, RequirementField, SortDirection, StructuredRequirement,
    TimeWindow, NONE_DIMENSION,
};

/// Request-time errors that cannot be answered with a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Request is empty: no metric, dimension, time range or filter could be interpreted")]
    Empty,

    #[error("{}", describe_unknown(.metrics, .dimensions))]
    UnknownReference {
        metrics: Vec<String>,
        dimensions: Vec<String>,
    },
}

fn describe_unknown(metrics: &[String], dimensions: &[String]) -> String {
    let quote = |names: &[String]| {
        names
            .iter()
            .map(|n| format!("'{}'", n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut parts = Vec::new();
    if !metrics.is_empty() {
        let noun = if metrics.len() == 1 { "metric" } else { "metrics" };
        parts.push(format!("unknown {} {}", noun, quote(metrics)));
    }
    if !dimensions.is_empty() {
        let noun = if dimensions.len() == 1 { "dimension" } else { "dimensions" };
        parts.push(format!("unknown {} {}", noun, quote(dimensions)));
    }
    format!("Request references names not in the catalog: {}", parts.join("; "))
}

/// What a filter identifier resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterRef<'c> {
    Metric(&'c MetricDefinition),
    Dimension(&'c DimensionDefinition),
    /// A physical column; `tables` lists every table that has it.
    Column { column: String, tables: Vec<String> },
}

/// A validated filter predicate.
///
/// `text` is the parsed predicate rendered back to SQL, so comments and
/// stray whitespace from the input are gone.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter<'c> {
    pub text: String,
    pub predicate: sqlparser::ast::Expr,
    pub references: Vec<FilterRef<'c>>,
}

impl ResolvedFilter<'_> {
    /// Filters on metric values apply after aggregation.
    pub fn references_metric(&self) -> bool {
        self.references
            .iter()
            .any(|r| matches!(r, FilterRef::Metric(_)))
    }
}

/// Ordering target of a complete request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderTarget<'c> {
    Metric(&'c MetricDefinition),
    Dimension(&'c DimensionDefinition),
}

impl OrderTarget<'_> {
    pub fn name(&self) -> &str {
        match self {
            OrderTarget::Metric(m) => &m.name,
            OrderTarget::Dimension(d) => &d.name,
        }
    }
}

/// A request that passed resolution, with every name bound to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest<'c> {
    pub metrics: Vec<&'c MetricDefinition>,
    /// Empty for a totals request.
    pub dimensions: Vec<&'c DimensionDefinition>,
    pub window: TimeWindow,
    pub filters: Vec<ResolvedFilter<'c>>,
    pub order_by: Option<(OrderTarget<'c>, SortDirection)>,
    pub limit: Option<u64>,
}

impl ResolvedRequest<'_> {
    pub fn is_totals(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Resolver outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<'c> {
    Complete(ResolvedRequest<'c>),
    NeedsClarification(Vec<ClarificationQuestion>),
    Invalid(RequestError),
}

/// Classifies candidate requests against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'c> {
    catalog: &'c Catalog,
}

impl<'c> Resolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// Classify `ir`.
    ///
    /// A structurally empty request is invalid, as is one naming metrics or
    /// dimensions the catalog does not define. Otherwise every missing or
    /// uninterpretable field yields one question, ordered by field.
    pub fn resolve(&self, ir: &StructuredRequirement) -> Verdict<'c> {
        if ir.is_structurally_empty() {
            return Verdict::Invalid(RequestError::Empty);
        }

        let mut questions = Vec::new();

        let metric_names = normalize_names(&ir.metrics);
        let dimension_names = normalize_names(&ir.dimensions);

        let mut unknown_metrics = Vec::new();
        let mut metrics: Vec<&'c MetricDefinition> = Vec::new();
        for name in &metric_names {
            match self.catalog.lookup_metric(name) {
                Some(m) if !metrics.iter().any(|seen| seen.name == m.name) => metrics.push(m),
                Some(_) => {}
                None => unknown_metrics.push(name.clone()),
            }
        }

        let totals = dimension_names
            .iter()
            .any(|d| d.eq_ignore_ascii_case(NONE_DIMENSION));
        let mut unknown_dimensions = Vec::new();
        let mut dimensions: Vec<&'c DimensionDefinition> = Vec::new();
        for name in &dimension_names {
            if name.eq_ignore_ascii_case(NONE_DIMENSION) {
                continue;
            }
            match self.catalog.lookup_dimension(name) {
                Some(d) if !dimensions.iter().any(|seen| seen.name == d.name) => {
                    dimensions.push(d)
                }
                Some(_) => {}
                None => unknown_dimensions.push(name.clone()),
            }
        }

        if !unknown_metrics.is_empty() || !unknown_dimensions.is_empty() {
            let error = RequestError::UnknownReference {
                metrics: unknown_metrics,
                dimensions: unknown_dimensions,
            };
            tracing::debug!(%error, "request references unknown names");
            return Verdict::Invalid(error);
        }

        if metrics.is_empty() {
            questions.push(ClarificationQuestion::new(
                RequirementField::Metrics,
                format!(
                    "Which metric should be measured? Available metrics: {}.",
                    self.metric_list()
                ),
            ));
        }

        if dimension_names.is_empty() {
            questions.push(ClarificationQuestion::new(
                RequirementField::Dimensions,
                format!(
                    "How should the results be broken down? Available dimensions: {}; \
                     or '{}' for overall totals.",
                    self.dimension_list(),
                    NONE_DIMENSION
                ),
            ));
        } else if totals && !dimensions.is_empty() {
            questions.push(ClarificationQuestion::new(
                RequirementField::Dimensions,
                format!(
                    "'{}' asks for overall totals and cannot be combined with {}. \
                     Should the results be totals or broken down?",
                    NONE_DIMENSION,
                    names_of(dimensions.iter().map(|d| d.name.as_str()))
                ),
            ));
        }

        let window = match &ir.time_range {
            None => {
                questions.push(ClarificationQuestion::new(
                    RequirementField::TimeRange,
                    format!(
                        "Which time period should be covered? Use one of {} or an absolute \
                         range YYYY-MM-DD/YYYY-MM-DD.",
                        relative_window_list()
                    ),
                ));
                None
            }
            Some(range) => match range.window() {
                Ok(window) => Some(window),
                Err(e) => {
                    questions.push(ClarificationQuestion::new(
                        RequirementField::TimeRange,
                        format!(
                            "The time period could not be understood: {}. Use one of {} or an \
                             absolute range YYYY-MM-DD/YYYY-MM-DD.",
                            e,
                            relative_window_list()
                        ),
                    ));
                    None
                }
            },
        };

        let mut filters = Vec::new();
        let mut filter_problems = Vec::new();
        for text in ir.filters.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
            match self.resolve_filter(text, &metrics, &dimensions) {
                Ok(filter) => filters.push(filter),
                Err(problem) => filter_problems.push(problem),
            }
        }
        if !filter_problems.is_empty() {
            questions.push(ClarificationQuestion::new(
                RequirementField::Filters,
                format!(
                    "Some filters could not be applied: {}. Filters may reference dimensions, \
                     requested metrics or table columns.",
                    filter_problems.join("; ")
                ),
            ));
        }

        let mut order_by = None;
        if let Some(order) = &ir.order_by {
            let field = order.field.trim();
            let target = metrics
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case(field))
                .map(|m| OrderTarget::Metric(*m))
                .or_else(|| {
                    dimensions
                        .iter()
                        .find(|d| d.name.eq_ignore_ascii_case(field))
                        .map(|d| OrderTarget::Dimension(*d))
                });
            match target {
                Some(target) => order_by = Some((target, order.direction)),
                None if !metrics.is_empty() => questions.push(ClarificationQuestion::new(
                    RequirementField::OrderBy,
                    format!(
                        "Results can only be ordered by a requested metric or dimension ({}); \
                         '{}' is not one of them.",
                        names_of(
                            metrics
                                .iter()
                                .map(|m| m.name.as_str())
                                .chain(dimensions.iter().map(|d| d.name.as_str()))
                        ),
                        field
                    ),
                )),
                None => {}
            }
        }

        if !questions.is_empty() {
            questions.sort_by_key(|q| q.field);
            tracing::debug!(
                fields = ?questions.iter().map(|q| q.field.as_str()).collect::<Vec<_>>(),
                "request needs clarification"
            );
            return Verdict::NeedsClarification(questions);
        }

        let Some(window) = window else {
            return Verdict::Invalid(RequestError::Empty);
        };

        Verdict::Complete(ResolvedRequest {
            metrics,
            dimensions,
            window,
            filters,
            order_by,
            limit: ir.limit,
        })
    }

    fn resolve_filter(
        &self,
        text: &str,
        metrics: &[&'c MetricDefinition],
        dimensions: &[&'c DimensionDefinition],
    ) -> Result<ResolvedFilter<'c>, String> {
        let invalid = |reason: String| format!("`{}` is not a valid predicate ({})", text, reason);
        let predicate = parse_predicate(text).map_err(invalid)?;
        let idents = predicate_identifiers(&predicate).map_err(invalid)?;

        let mut references = Vec::new();
        for ident in idents {
            let reference = self
                .resolve_identifier(&ident)
                .ok_or_else(|| format!("`{}` references unknown field '{}'", text, ident))?;
            if let FilterRef::Metric(m) = reference {
                if !metrics.iter().any(|r| r.name == m.name) {
                    return Err(format!(
                        "`{}` filters on metric '{}' which is not requested",
                        text, m.name
                    ));
                }
            }
            if !references.contains(&reference) {
                references.push(reference);
            }
        }

        let filter = ResolvedFilter {
            text: predicate.to_string(),
            predicate,
            references,
        };

        if filter.references_metric() {
            let projected = |r: &FilterRef<'c>| match r {
                FilterRef::Metric(_) => true,
                FilterRef::Dimension(d) => dimensions.iter().any(|rd| rd.name == d.name),
                FilterRef::Column { .. } => false,
            };
            if !filter.references.iter().all(projected) {
                return Err(format!(
                    "`{}` mixes a metric with fields that are not in the result",
                    text
                ));
            }
        }

        Ok(filter)
    }

    fn resolve_identifier(&self, ident: &FilterIdent) -> Option<FilterRef<'c>> {
        match ident {
            FilterIdent::Bare(name) => {
                if let Some(m) = self.catalog.lookup_metric(name) {
                    return Some(FilterRef::Metric(m));
                }
                if let Some(d) = self.catalog.lookup_dimension(name) {
                    return Some(FilterRef::Dimension(d));
                }
                let owners = self.catalog.tables_with_column(name);
                let (_, column) = owners.first()?;
                Some(FilterRef::Column {
                    column: column.clone(),
                    tables: owners.iter().map(|(t, _)| t.clone()).collect(),
                })
            }
            FilterIdent::Qualified { table, column } => {
                self.catalog
                    .tables_with_column(column)
                    .iter()
                    .find(|(t, _)| t.eq_ignore_ascii_case(table))
                    .map(|(t, c)| FilterRef::Column {
                        column: c.clone(),
                        tables: vec![t.clone()],
                    })
            }
        }
    }

    fn metric_list(&self) -> String {
        names_of(self.catalog.metrics().map(|m| m.name.as_str()))
    }

    fn dimension_list(&self) -> String {
        names_of(self.catalog.dimensions().map(|d| d.name.as_str()))
    }
}

/// Trim, drop blanks and de-duplicate case-insensitively, keeping first occurrence.
fn normalize_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
            out.push(name.to_string());
        }
    }
    out
}

fn names_of<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

fn relative_window_list() -> String {
    names_of(RelativeWindow::ALL.iter().map(|w| w.as_str()))
}
