//! Metric definitions.

use serde::{Deserialize, Serialize};

use super::formula::Formula;

/// Value type of a metric, used for presentation and division guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Ratio,
    Currency,
    Count,
    Number,
    Percentage,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Ratio => "ratio",
            MetricType::Currency => "currency",
            MetricType::Count => "count",
            MetricType::Number => "number",
            MetricType::Percentage => "percentage",
        }
    }
}

/// A named business metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDefinition {
    pub name: String,
    pub formula: Formula,
    /// Tables the formula's columns come from, in declaration order.
    pub dependencies: Vec<String>,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub description: String,
    /// Alternative phrasings recognised by the keyword parser.
    pub synonyms: Vec<String>,
}

impl MetricDefinition {
    pub fn new(
        name: impl Into<String>,
        formula: Formula,
        dependencies: Vec<String>,
        metric_type: MetricType,
    ) -> Self {
        Self {
            name: name.into(),
            formula,
            dependencies,
            metric_type,
            description: String::new(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_synonyms(mut self, synonyms: Vec<String>) -> Self {
        self.synonyms = synonyms;
        self
    }
}
