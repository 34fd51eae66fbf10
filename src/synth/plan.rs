//! Fact-table selection and join planning.

use crate::catalog::{Catalog, DimensionDefinition, JoinCondition, PhysicalTable};
use crate::resolver::{FilterRef, ResolvedRequest};
use crate::sql::{col, raw_sql, table_col, Expr, JoinConstraint};

use super::SynthesisError;

/// A dimension table joined onto the primary table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedJoin<'a> {
    pub table: &'a str,
    pub condition: &'a JoinCondition,
}

impl PlannedJoin<'_> {
    pub fn constraint(&self) -> JoinConstraint {
        match self.condition {
            JoinCondition::Using(columns) => JoinConstraint::Using(columns.clone()),
            JoinCondition::On(predicate) => JoinConstraint::On(raw_sql(predicate)),
        }
    }
}

/// Tables a query reads: one primary fact table plus dimension joins.
#[derive(Debug, Clone)]
pub(crate) struct TablePlan<'a> {
    pub primary: &'a PhysicalTable,
    pub joins: Vec<PlannedJoin<'a>>,
}

impl<'a> TablePlan<'a> {
    pub fn build(
        catalog: &'a Catalog,
        request: &ResolvedRequest<'a>,
    ) -> Result<Self, SynthesisError> {
        let dimensions = planned_dimensions(request);

        let primary_name =
            choose_primary(request, &dimensions).ok_or(SynthesisError::NoFactTable)?;
        let primary = catalog
            .lookup_table(primary_name)
            .ok_or_else(|| SynthesisError::UnknownTable(primary_name.to_string()))?;

        let mut plan = TablePlan {
            primary,
            joins: Vec::new(),
        };

        for dim in dimensions {
            if dim.table == primary.name {
                continue;
            }
            match dim.join_to(&primary.name) {
                Some(join) => plan.add_join(&dim.table, &join.condition),
                // same column carried by the fact table itself, e.g. `dt`
                None if primary.has_column(&dim.name) => {}
                None => {
                    return Err(SynthesisError::NoJoinPath {
                        dimension: dim.name.clone(),
                        table: primary.name.clone(),
                    })
                }
            }
        }

        for filter in &request.filters {
            for reference in &filter.references {
                if let FilterRef::Column { column, tables } = reference {
                    plan.reach_column(catalog, column, tables)?;
                }
            }
        }

        tracing::debug!(
            primary = %plan.primary.name,
            joins = plan.joins.len(),
            "planned tables"
        );
        Ok(plan)
    }

    fn add_join(&mut self, table: &'a str, condition: &'a JoinCondition) {
        if !self.joins.iter().any(|j| j.table == table) {
            self.joins.push(PlannedJoin { table, condition });
        }
    }

    /// Tables readable by the query: primary first, then joins in order.
    pub fn tables_in_scope(&self) -> impl Iterator<Item = &'a str> + '_ {
        std::iter::once(self.primary.name.as_str()).chain(self.joins.iter().map(|j| j.table))
    }

    pub fn in_scope(&self, table: &str) -> bool {
        self.tables_in_scope().any(|t| t == table)
    }

    /// Make sure some table owning `column` is readable, joining a
    /// dimension table if that is the only way to reach it.
    fn reach_column(
        &mut self,
        catalog: &'a Catalog,
        column: &str,
        tables: &[String],
    ) -> Result<(), SynthesisError> {
        if tables.iter().any(|t| self.in_scope(t)) {
            return Ok(());
        }
        let primary_table: &'a PhysicalTable = self.primary;
        let primary = primary_table.name.as_str();
        let via = catalog
            .dimensions()
            .filter(|d| tables.contains(&d.table))
            .find_map(|d| d.join_to(primary).map(|j| (d.table.as_str(), &j.condition)));
        match via {
            Some((table, condition)) => {
                self.add_join(table, condition);
                Ok(())
            }
            None => Err(SynthesisError::UnreachableColumn {
                column: column.to_string(),
                context: "a filter".into(),
                table: primary.to_string(),
            }),
        }
    }

    /// Column expression for a dimension: merged `USING` keys stay
    /// unqualified, everything else is qualified by its table. A dimension
    /// whose table is not read comes from the primary table's own column.
    pub fn dimension_expr(&self, dim: &DimensionDefinition) -> Expr {
        let merged = self
            .joins
            .iter()
            .any(|j| j.table == dim.table && j.condition.using_columns().contains(&dim.name));
        if merged {
            col(&dim.name)
        } else if self.in_scope(&dim.table) {
            table_col(&dim.table, &dim.name)
        } else {
            table_col(&self.primary.name, &dim.name)
        }
    }
}

/// Requested dimensions followed by filter-referenced ones, without duplicates.
fn planned_dimensions<'a>(request: &ResolvedRequest<'a>) -> Vec<&'a DimensionDefinition> {
    let mut dims: Vec<&'a DimensionDefinition> = request.dimensions.clone();
    for filter in &request.filters {
        for reference in &filter.references {
            if let FilterRef::Dimension(d) = reference {
                if !dims.iter().any(|seen| seen.name == d.name) {
                    dims.push(d);
                }
            }
        }
    }
    dims
}

/// The table referenced most often across metric dependencies and
/// dimension join targets; ties go to the first one seen.
fn choose_primary<'a>(
    request: &ResolvedRequest<'a>,
    dimensions: &[&'a DimensionDefinition],
) -> Option<&'a str> {
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    let mut bump = |table: &'a str| match counts.iter_mut().find(|(t, _)| *t == table) {
        Some((_, n)) => *n += 1,
        None => counts.push((table, 1)),
    };

    for metric in &request.metrics {
        for dep in &metric.dependencies {
            bump(dep);
        }
    }
    for dim in dimensions {
        for table in dim.fact_tables() {
            bump(table);
        }
    }

    let mut best: Option<(&'a str, usize)> = None;
    for (table, n) in counts {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((table, n));
        }
    }
    best.map(|(t, _)| t)
}
