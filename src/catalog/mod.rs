//! The semantic catalog: physical tables, metrics and dimensions.
//!
//! A [`Catalog`] is built once at startup, validated eagerly, and then shared
//! read-only (usually behind an `Arc`) by the resolver and synthesizer.
//! Catalog data is declared in TOML:
//!
//! ```toml
//! [tables.dwd_ad_impression]
//! partition_key = "dt"
//! columns = { dt = "date", slot_id = "bigint", click_cnt = "bigint", impression_cnt = "bigint" }
//!
//! [metrics.CTR]
//! formula = "click_cnt / impression_cnt"
//! dependencies = ["dwd_ad_impression"]
//! type = "ratio"
//!
//! [dimensions.slot_id]
//! table = "dim_slot"
//! joins = [{ table = "dwd_ad_impression", condition = "using(slot_id)" }]
//! ```

mod dimension;
mod formula;
mod metric;
mod table;
mod validation;

pub use dimension::{DimensionDefinition, DimensionType, JoinCondition, JoinSpec};
pub use formula::{AggregateFunc, ArithOp, Formula, FormulaError, FormulaExpr};
pub use metric::{MetricDefinition, MetricType};
pub use table::{ColumnType, PhysicalTable};
pub use validation::IntegrityViolation;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/ads.toml");

/// Errors raised while loading a catalog. All of them are startup-fatal.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Catalog integrity check failed:\n{}", format_violations(.0))]
    Integrity(Vec<IntegrityViolation>),
}

fn format_violations(violations: &[IntegrityViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Declarative catalog format
// =============================================================================

/// Catalog as declared in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSpec {
    pub tables: BTreeMap<String, TableSpec>,
    pub metrics: BTreeMap<String, MetricSpec>,
    pub dimensions: BTreeMap<String, DimensionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub columns: BTreeMap<String, ColumnType>,
    #[serde(default)]
    pub partition_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricSpec {
    pub formula: String,
    pub dependencies: Vec<String>,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionSpec {
    pub table: String,
    #[serde(default, rename = "type")]
    pub dimension_type: DimensionType,
    #[serde(default)]
    pub joins: Vec<JoinSpecEntry>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinSpecEntry {
    pub table: String,
    pub condition: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// Immutable registry of tables, metrics and dimensions.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: HashMap<String, PhysicalTable>,
    metrics: HashMap<String, MetricDefinition>,
    dimensions: HashMap<String, DimensionDefinition>,
    /// Lowercased name -> canonical name.
    metric_keys: HashMap<String, String>,
    dimension_keys: HashMap<String, String>,
    /// Lowercased column -> (table, column) pairs, sorted by table.
    column_index: HashMap<String, Vec<(String, String)>>,
}

impl Catalog {
    /// Build and validate a catalog.
    pub fn new(
        tables: Vec<PhysicalTable>,
        metrics: Vec<MetricDefinition>,
        dimensions: Vec<DimensionDefinition>,
    ) -> Result<Self, CatalogError> {
        Self::build(tables, metrics, dimensions, Vec::new())
    }

    fn build(
        tables: Vec<PhysicalTable>,
        metrics: Vec<MetricDefinition>,
        dimensions: Vec<DimensionDefinition>,
        mut violations: Vec<IntegrityViolation>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Catalog {
            tables: HashMap::new(),
            metrics: HashMap::new(),
            dimensions: HashMap::new(),
            metric_keys: HashMap::new(),
            dimension_keys: HashMap::new(),
            column_index: HashMap::new(),
        };

        for table in tables {
            if catalog.tables.contains_key(&table.name) {
                violations.push(IntegrityViolation::DuplicateName {
                    entity_type: "Table",
                    name: table.name.clone(),
                });
                continue;
            }
            catalog.tables.insert(table.name.clone(), table);
        }

        for metric in metrics {
            let key = metric.name.to_lowercase();
            if catalog.metric_keys.contains_key(&key) {
                violations.push(IntegrityViolation::DuplicateName {
                    entity_type: "Metric",
                    name: metric.name.clone(),
                });
                continue;
            }
            catalog.metric_keys.insert(key, metric.name.clone());
            catalog.metrics.insert(metric.name.clone(), metric);
        }

        for dimension in dimensions {
            let key = dimension.name.to_lowercase();
            if catalog.dimension_keys.contains_key(&key) {
                violations.push(IntegrityViolation::DuplicateName {
                    entity_type: "Dimension",
                    name: dimension.name.clone(),
                });
                continue;
            }
            catalog.dimension_keys.insert(key, dimension.name.clone());
            catalog.dimensions.insert(dimension.name.clone(), dimension);
        }

        let mut table_names: Vec<&String> = catalog.tables.keys().collect();
        table_names.sort();
        for name in table_names {
            for column in catalog.tables[name].columns.keys() {
                catalog
                    .column_index
                    .entry(column.to_lowercase())
                    .or_default()
                    .push((name.clone(), column.clone()));
            }
        }

        violations.extend(validation::validate(&catalog));
        if !violations.is_empty() {
            return Err(CatalogError::Integrity(violations));
        }

        tracing::info!(
            tables = catalog.tables.len(),
            metrics = catalog.metrics.len(),
            dimensions = catalog.dimensions.len(),
            "catalog validated"
        );
        Ok(catalog)
    }

    /// Build a catalog from its declarative form.
    ///
    /// Formula and join-condition syntax errors are reported together with
    /// the referential checks.
    pub fn from_spec(spec: CatalogSpec) -> Result<Self, CatalogError> {
        let mut violations = Vec::new();

        let tables = spec
            .tables
            .into_iter()
            .map(|(name, t)| PhysicalTable {
                name,
                columns: t.columns,
                partition_key: t.partition_key,
                description: t.description,
            })
            .collect();

        let mut metrics = Vec::new();
        for (name, m) in spec.metrics {
            match Formula::parse(&m.formula) {
                Ok(formula) => metrics.push(
                    MetricDefinition::new(name, formula, m.dependencies, m.metric_type)
                        .with_description(m.description)
                        .with_synonyms(m.synonyms),
                ),
                Err(e) => violations.push(IntegrityViolation::InvalidFormula {
                    metric: name,
                    reason: e.to_string(),
                }),
            }
        }

        let mut dimensions = Vec::new();
        for (name, d) in spec.dimensions {
            let mut joins = Vec::new();
            for entry in d.joins {
                match JoinCondition::parse(&entry.condition) {
                    Ok(condition) => joins.push(JoinSpec {
                        table: entry.table,
                        condition,
                    }),
                    Err(reason) => violations.push(IntegrityViolation::InvalidJoinCondition {
                        dimension: name.clone(),
                        table: entry.table,
                        reason,
                    }),
                }
            }
            dimensions.push(DimensionDefinition {
                name,
                table: d.table,
                dimension_type: d.dimension_type,
                joins,
                description: d.description,
                synonyms: d.synonyms,
            });
        }

        Self::build(tables, metrics, dimensions, violations)
    }

    /// Parse and validate a TOML catalog.
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let spec: CatalogSpec = toml::from_str(content)?;
        Self::from_spec(spec)
    }

    /// Load a TOML catalog from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), "loaded catalog");
        Ok(catalog)
    }

    /// The embedded advertising catalog.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Metric by exact name.
    pub fn metric(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name)
    }

    /// Metric by name, falling back to a case-insensitive match.
    pub fn lookup_metric(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name).or_else(|| {
            self.metric_keys
                .get(&name.to_lowercase())
                .and_then(|canonical| self.metrics.get(canonical))
        })
    }

    /// Dimension by name, falling back to a case-insensitive match.
    pub fn lookup_dimension(&self, name: &str) -> Option<&DimensionDefinition> {
        self.dimensions.get(name).or_else(|| {
            self.dimension_keys
                .get(&name.to_lowercase())
                .and_then(|canonical| self.dimensions.get(canonical))
        })
    }

    pub fn lookup_table(&self, name: &str) -> Option<&PhysicalTable> {
        self.tables.get(name)
    }

    /// Every `(table, column)` whose column name matches case-insensitively.
    pub fn tables_with_column(&self, column: &str) -> &[(String, String)] {
        self.column_index
            .get(&column.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Metrics sorted by name.
    pub fn metrics(&self) -> impl Iterator<Item = &MetricDefinition> {
        sorted_values(&self.metrics)
    }

    /// Dimensions sorted by name.
    pub fn dimensions(&self) -> impl Iterator<Item = &DimensionDefinition> {
        sorted_values(&self.dimensions)
    }

    /// Tables sorted by name.
    pub fn tables(&self) -> impl Iterator<Item = &PhysicalTable> {
        sorted_values(&self.tables)
    }
}

fn sorted_values<T>(map: &HashMap<String, T>) -> impl Iterator<Item = &T> {
    let mut entries: Vec<(&String, &T)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, v)| v)
}
