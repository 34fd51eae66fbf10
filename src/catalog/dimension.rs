//! Dimension definitions and join specifications.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

static USING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*using\s*\((.*)\)\s*$").expect("valid regex"));

/// Value type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    #[default]
    Categorical,
    Continuous,
}

/// How a dimension's backing table joins to a fact table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinCondition {
    /// `USING (col, ...)`; every column exists on both sides.
    Using(Vec<String>),
    /// Free-form `ON` predicate, validated as SQL at load time.
    On(String),
}

impl JoinCondition {
    /// Parse the catalog notation: `using(a, b)` or a boolean SQL expression.
    pub fn parse(text: &str) -> Result<Self, String> {
        if let Some(caps) = USING_RE.captures(text) {
            let columns: Vec<String> = caps[1]
                .split(',')
                .map(|c| c.trim().trim_matches('`').trim_matches('"').to_string())
                .collect();
            if columns.iter().any(String::is_empty) {
                return Err(format!("empty column in '{}'", text.trim()));
            }
            return Ok(JoinCondition::Using(columns));
        }

        let predicate = text.trim();
        if predicate.is_empty() {
            return Err("join condition is empty".into());
        }
        let probe = format!("SELECT * FROM a WHERE {}", predicate);
        Parser::parse_sql(&GenericDialect {}, &probe).map_err(|e| e.to_string())?;
        Ok(JoinCondition::On(predicate.to_string()))
    }

    pub fn using_columns(&self) -> &[String] {
        match self {
            JoinCondition::Using(cols) => cols,
            JoinCondition::On(_) => &[],
        }
    }
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinCondition::Using(cols) => write!(f, "using({})", cols.join(", ")),
            JoinCondition::On(pred) => f.write_str(pred),
        }
    }
}

impl Serialize for JoinCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One join path from a dimension's backing table to a fact table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JoinSpec {
    /// Fact table this join connects to.
    pub table: String,
    pub condition: JoinCondition,
}

/// A grouping attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionDefinition {
    /// Also the column name on the backing table.
    pub name: String,
    pub table: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    pub joins: Vec<JoinSpec>,
    pub description: String,
    pub synonyms: Vec<String>,
}

impl DimensionDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            dimension_type: DimensionType::Categorical,
            joins: Vec::new(),
            description: String::new(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_join(mut self, table: impl Into<String>, condition: JoinCondition) -> Self {
        self.joins.push(JoinSpec {
            table: table.into(),
            condition,
        });
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The join spec whose target is `fact_table`, if any.
    pub fn join_to(&self, fact_table: &str) -> Option<&JoinSpec> {
        self.joins.iter().find(|j| j.table == fact_table)
    }

    /// Tables this dimension can be evaluated against.
    ///
    /// A dimension without joins lives directly on its backing table.
    pub fn fact_tables(&self) -> Vec<&str> {
        if self.joins.is_empty() {
            vec![self.table.as_str()]
        } else {
            self.joins.iter().map(|j| j.table.as_str()).collect()
        }
    }
}
