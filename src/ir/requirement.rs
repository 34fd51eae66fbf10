//! The structured requirement: the canonical form of an analytics request.

use serde::{Deserialize, Serialize};

use super::time::TimeRange;

/// Dimension marker for an explicit totals request (no grouping).
pub const NONE_DIMENSION: &str = "none";

/// Sort direction of the requested ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering over a requested metric or dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }
}

/// A candidate analytics request, possibly incomplete.
///
/// Empty `dimensions` means the grouping was never stated; `["none"]`
/// means totals were asked for explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredRequirement {
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    pub filters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl StructuredRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics<S: Into<String>>(mut self, metrics: impl IntoIterator<Item = S>) -> Self {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dimensions<S: Into<String>>(
        mut self,
        dimensions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    /// Request totals over the whole window.
    pub fn totals(mut self) -> Self {
        self.dimensions = vec![NONE_DIMENSION.to_string()];
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// No metric, dimension, time range or filter was populated.
    pub fn is_structurally_empty(&self) -> bool {
        self.metrics.iter().all(|m| m.trim().is_empty())
            && self.dimensions.iter().all(|d| d.trim().is_empty())
            && self.time_range.is_none()
            && self.filters.iter().all(|f| f.trim().is_empty())
    }

    pub fn is_totals(&self) -> bool {
        self.dimensions.len() == 1 && self.dimensions[0].eq_ignore_ascii_case(NONE_DIMENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let ir: StructuredRequirement = serde_json::from_str(r#"{"metrics": ["CTR"]}"#).unwrap();
        assert_eq!(ir.metrics, vec!["CTR"]);
        assert!(ir.dimensions.is_empty());
        assert!(ir.time_range.is_none());
        assert!(!ir.is_structurally_empty());
    }

    #[test]
    fn test_structurally_empty() {
        assert!(StructuredRequirement::new().is_structurally_empty());
        assert!(StructuredRequirement::new()
            .with_metrics(["  "])
            .with_limit(10)
            .is_structurally_empty());
        assert!(!StructuredRequirement::new().totals().is_structurally_empty());
    }

    #[test]
    fn test_totals_marker() {
        let ir = StructuredRequirement::new().with_dimensions(["NONE"]);
        assert!(ir.is_totals());
        assert!(!StructuredRequirement::new()
            .with_dimensions(["none", "slot_id"])
            .is_totals());
    }

    #[test]
    fn test_serialization_skips_unset_options() {
        let ir = StructuredRequirement::new()
            .with_metrics(["CTR"])
            .with_dimensions(["slot_id"])
            .with_time_range(TimeRange::relative("last_7_days"));
        let json = serde_json::to_value(&ir).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "metrics": ["CTR"],
                "dimensions": ["slot_id"],
                "time_range": {"type": "relative", "value": "last_7_days"},
                "filters": []
            })
        );
    }

    #[test]
    fn test_order_by_default_direction() {
        let order: OrderBy = serde_json::from_str(r#"{"field": "CTR"}"#).unwrap();
        assert_eq!(order, OrderBy::asc("CTR"));
    }
}
