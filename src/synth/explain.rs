//! Prose explanation and performance hints for a synthesized query.

use crate::ir::{DateBounds, SortDirection, TimeWindow};
use crate::resolver::{FilterRef, ResolvedRequest};

use super::plan::TablePlan;

pub(crate) fn explanation(
    request: &ResolvedRequest<'_>,
    plan: &TablePlan<'_>,
    bounds: Option<DateBounds>,
) -> String {
    let mut sentences = Vec::new();

    let metrics = request
        .metrics
        .iter()
        .map(|m| {
            if m.description.is_empty() {
                m.name.clone()
            } else {
                format!("{} ({})", m.name, m.description)
            }
        })
        .collect::<Vec<_>>();
    let grouping = if request.is_totals() {
        "as overall totals".to_string()
    } else {
        format!(
            "broken down by {}",
            join_words(request.dimensions.iter().map(|d| d.name.clone()).collect())
        )
    };
    sentences.push(format!(
        "Computes {} {} {}.",
        join_words(metrics),
        grouping,
        describe_window(&request.window, bounds)
    ));

    let mut source = format!("Reads {}", plan.primary.name);
    if !plan.joins.is_empty() {
        let joins = plan
            .joins
            .iter()
            .map(|j| format!("{} {}", j.table, j.condition))
            .collect();
        source.push_str(&format!(", left-joined with {}", join_words(joins)));
    }
    source.push('.');
    sentences.push(source);

    let (metric_filters, row_filters): (Vec<_>, Vec<_>) =
        request.filters.iter().partition(|f| f.references_metric());
    if !row_filters.is_empty() {
        sentences.push(format!(
            "Rows are restricted to {}.",
            row_filters
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(" and ")
        ));
    }
    if !metric_filters.is_empty() {
        sentences.push(format!(
            "Aggregated results are kept only where {}.",
            metric_filters
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(" and ")
        ));
    }

    if let Some((target, direction)) = &request.order_by {
        let dir = match direction {
            SortDirection::Asc => "ascending",
            SortDirection::Desc => "descending",
        };
        sentences.push(format!("Ordered by {} {}.", target.name(), dir));
    }
    if let Some(limit) = request.limit {
        sentences.push(format!("Returns at most {} rows.", limit));
    }

    sentences.join(" ")
}

pub(crate) fn performance_hints(
    request: &ResolvedRequest<'_>,
    plan: &TablePlan<'_>,
    bounds: Option<DateBounds>,
) -> Vec<String> {
    let mut hints = Vec::new();
    let primary = &plan.primary.name;

    let days = bounds.map(|(start, end)| (end - start).num_days());
    hints.push(match (&plan.primary.partition_key, days) {
        (Some(key), Some(days)) => format!(
            "Partition pruning: {} is restricted on partition key {} to {} daily partition{}.",
            primary,
            key,
            days,
            if days == 1 { "" } else { "s" }
        ),
        (Some(key), None) => format!(
            "Partition pruning: no time bound was requested, so every {} partition of {} is scanned; a time range would prune it.",
            key, primary
        ),
        (None, _) => format!(
            "Partition pruning: {} is not partitioned, so the whole table is scanned.",
            primary
        ),
    });

    if plan.joins.len() > 1 {
        let tables = plan.joins.iter().map(|j| j.table.to_string()).collect();
        hints.push(format!(
            "Join strategy: {} are small dimension tables; broadcast them to avoid shuffling {}.",
            join_words(tables),
            primary
        ));
    }

    let partition_key = plan.primary.partition_key.as_deref();
    let mut columns: Vec<String> = Vec::new();
    for filter in request.filters.iter().filter(|f| !f.references_metric()) {
        for reference in &filter.references {
            let column = match reference {
                FilterRef::Column { column, .. } => column.as_str(),
                FilterRef::Dimension(d) => d.name.as_str(),
                FilterRef::Metric(_) => continue,
            };
            if Some(column) != partition_key && !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    if !columns.is_empty() {
        hints.push(format!(
            "Index: filters read {}; an index or Z-ORDER on {} speeds them up.",
            join_words(columns.clone()),
            if columns.len() == 1 { "that column" } else { "those columns" }
        ));
    }

    hints
}

fn describe_window(window: &TimeWindow, bounds: Option<DateBounds>) -> String {
    match window {
        TimeWindow::Relative(relative) => match bounds {
            // bounds are half-open and never empty, so `end` has a predecessor
            Some((start, end)) => format!(
                "for {} ({} to {})",
                relative.describe(),
                start,
                end.pred_opt().unwrap_or(start)
            ),
            None => "across all time".to_string(),
        },
        TimeWindow::Absolute { start, end } => format!("from {} to {}", start, end),
    }
}

/// "a", "a and b", "a, b and c".
fn join_words(mut words: Vec<String>) -> String {
    match words.len() {
        0 => String::new(),
        1 => words.remove(0),
        _ => {
            let last = words.pop().unwrap_or_default();
            format!("{} and {}", words.join(", "), last)
        }
    }
}
