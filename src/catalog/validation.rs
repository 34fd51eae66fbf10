//! Referential integrity checks run when a catalog is built.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use super::dimension::JoinCondition;
use super::Catalog;
use crate::ir::NONE_DIMENSION;

/// A single integrity problem found in catalog data.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityViolation {
    /// Reference to a table, metric or dimension that does not exist.
    UndefinedReference {
        entity_type: &'static str,
        entity_name: String,
        reference_type: &'static str,
        reference_name: String,
    },
    /// Column expected on a table is absent.
    MissingColumn {
        entity_type: &'static str,
        entity_name: String,
        table: String,
        column: String,
    },
    InvalidFormula { metric: String, reason: String },
    /// Aggregates must be applied to columns, not to other metrics.
    AggregatedMetric { metric: String, reference: String },
    InvalidJoinCondition {
        dimension: String,
        table: String,
        reason: String,
    },
    CircularDependency { cycle: Vec<String> },
    DuplicateName { entity_type: &'static str, name: String },
    ReservedName { name: String },
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityViolation::UndefinedReference {
                entity_type,
                entity_name,
                reference_type,
                reference_name,
            } => write!(
                f,
                "{} '{}' references undefined {} '{}'",
                entity_type, entity_name, reference_type, reference_name
            ),
            IntegrityViolation::MissingColumn {
                entity_type,
                entity_name,
                table,
                column,
            } => write!(
                f,
                "{} '{}' needs column '{}' which table '{}' does not have",
                entity_type, entity_name, column, table
            ),
            IntegrityViolation::InvalidFormula { metric, reason } => {
                write!(f, "Metric '{}' has an invalid formula: {}", metric, reason)
            }
            IntegrityViolation::AggregatedMetric { metric, reference } => write!(
                f,
                "Metric '{}' aggregates metric '{}'; aggregates may only wrap columns",
                metric, reference
            ),
            IntegrityViolation::InvalidJoinCondition {
                dimension,
                table,
                reason,
            } => write!(
                f,
                "Dimension '{}' has an invalid join to '{}': {}",
                dimension, table, reason
            ),
            IntegrityViolation::CircularDependency { cycle } => {
                write!(f, "Circular metric dependency: {}", cycle.join(" -> "))
            }
            IntegrityViolation::DuplicateName { entity_type, name } => {
                write!(f, "Duplicate {} name: '{}'", entity_type, name)
            }
            IntegrityViolation::ReservedName { name } => {
                write!(f, "'{}' is reserved for totals requests", name)
            }
        }
    }
}

impl std::error::Error for IntegrityViolation {}

/// Run every integrity check and collect all violations.
pub(crate) fn validate(catalog: &Catalog) -> Vec<IntegrityViolation> {
    let mut errors = Vec::new();

    validate_names(catalog, &mut errors);
    validate_tables(catalog, &mut errors);
    validate_metrics(catalog, &mut errors);
    validate_metric_cycles(catalog, &mut errors);
    validate_dimensions(catalog, &mut errors);

    errors
}

fn validate_names(catalog: &Catalog, errors: &mut Vec<IntegrityViolation>) {
    let mut seen: HashMap<String, &'static str> = HashMap::new();

    let metrics = catalog.metrics().map(|m| ("Metric", m.name.as_str()));
    let dimensions = catalog.dimensions().map(|d| ("Dimension", d.name.as_str()));

    for (entity_type, name) in metrics.chain(dimensions) {
        if name.eq_ignore_ascii_case(NONE_DIMENSION) {
            errors.push(IntegrityViolation::ReservedName {
                name: name.to_string(),
            });
        }
        if seen.insert(name.to_lowercase(), entity_type).is_some() {
            errors.push(IntegrityViolation::DuplicateName {
                entity_type,
                name: name.to_string(),
            });
        }
    }
}

fn validate_tables(catalog: &Catalog, errors: &mut Vec<IntegrityViolation>) {
    for table in catalog.tables() {
        if let Some(key) = &table.partition_key {
            if !table.has_column(key) {
                errors.push(IntegrityViolation::MissingColumn {
                    entity_type: "Partition key of table",
                    entity_name: table.name.clone(),
                    table: table.name.clone(),
                    column: key.clone(),
                });
            }
        }
    }
}

fn validate_metrics(catalog: &Catalog, errors: &mut Vec<IntegrityViolation>) {
    for metric in catalog.metrics() {
        if metric.dependencies.is_empty() {
            errors.push(IntegrityViolation::InvalidFormula {
                metric: metric.name.clone(),
                reason: "no dependency tables declared".into(),
            });
        }

        let mut dep_tables = Vec::new();
        for dep in &metric.dependencies {
            match catalog.lookup_table(dep) {
                Some(table) => dep_tables.push(table),
                None => errors.push(IntegrityViolation::UndefinedReference {
                    entity_type: "Metric",
                    entity_name: metric.name.clone(),
                    reference_type: "table",
                    reference_name: dep.clone(),
                }),
            }
        }

        let aggregated = metric.formula.aggregated_references();
        for name in metric.formula.references() {
            if catalog.metric(name).is_some() {
                if aggregated.contains(&name) {
                    errors.push(IntegrityViolation::AggregatedMetric {
                        metric: metric.name.clone(),
                        reference: name.to_string(),
                    });
                }
                continue;
            }
            if !dep_tables.iter().any(|t| t.has_column(name)) {
                errors.push(IntegrityViolation::UndefinedReference {
                    entity_type: "Metric",
                    entity_name: metric.name.clone(),
                    reference_type: "column or metric",
                    reference_name: name.to_string(),
                });
            }
        }
    }
}

fn validate_metric_cycles(catalog: &Catalog, errors: &mut Vec<IntegrityViolation>) {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for metric in catalog.metrics() {
        nodes.insert(metric.name.as_str(), graph.add_node(metric.name.as_str()));
    }
    for metric in catalog.metrics() {
        let from = nodes[metric.name.as_str()];
        for name in metric.formula.references() {
            if let Some(&to) = nodes.get(name) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut reported: HashSet<Vec<String>> = HashSet::new();
    for scc in tarjan_scc(&graph) {
        let is_cycle = scc.len() > 1 || graph.edges_connecting(scc[0], scc[0]).next().is_some();
        if !is_cycle {
            continue;
        }
        let mut cycle: Vec<String> = scc.iter().map(|idx| graph[*idx].to_string()).collect();
        cycle.sort();
        if reported.insert(cycle.clone()) {
            errors.push(IntegrityViolation::CircularDependency { cycle });
        }
    }
}

fn validate_dimensions(catalog: &Catalog, errors: &mut Vec<IntegrityViolation>) {
    for dim in catalog.dimensions() {
        let Some(backing) = catalog.lookup_table(&dim.table) else {
            errors.push(IntegrityViolation::UndefinedReference {
                entity_type: "Dimension",
                entity_name: dim.name.clone(),
                reference_type: "table",
                reference_name: dim.table.clone(),
            });
            continue;
        };

        if !backing.has_column(&dim.name) {
            errors.push(IntegrityViolation::MissingColumn {
                entity_type: "Dimension",
                entity_name: dim.name.clone(),
                table: backing.name.clone(),
                column: dim.name.clone(),
            });
        }

        for join in &dim.joins {
            let Some(target) = catalog.lookup_table(&join.table) else {
                errors.push(IntegrityViolation::UndefinedReference {
                    entity_type: "Dimension",
                    entity_name: dim.name.clone(),
                    reference_type: "join target",
                    reference_name: join.table.clone(),
                });
                continue;
            };

            if let JoinCondition::Using(columns) = &join.condition {
                for column in columns {
                    for table in [backing, target] {
                        if !table.has_column(column) {
                            errors.push(IntegrityViolation::MissingColumn {
                                entity_type: "Join of dimension",
                                entity_name: dim.name.clone(),
                                table: table.name.clone(),
                                column: column.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
}
