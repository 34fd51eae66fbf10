//! Clarification questions and the response envelope.

use serde::{Deserialize, Serialize};

/// IR field a clarification question is about. Ordering is the order
/// questions are presented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementField {
    Metrics,
    Dimensions,
    TimeRange,
    Filters,
    OrderBy,
}

impl RequirementField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementField::Metrics => "metrics",
            RequirementField::Dimensions => "dimensions",
            RequirementField::TimeRange => "time_range",
            RequirementField::Filters => "filters",
            RequirementField::OrderBy => "order_by",
        }
    }
}

/// A follow-up question for the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub field: RequirementField,
    pub message: String,
}

impl ClarificationQuestion {
    pub fn new(field: RequirementField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Synthesized query with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlResponse {
    pub sql: String,
    pub explanation: String,
    pub performance_hints: Vec<String>,
}

/// Outcome of one translation request.
///
/// Serialized as `{"status": "success" | "clarify" | "error", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Response {
    Success(SqlResponse),
    Clarify(Vec<ClarificationQuestion>),
    Error(String),
}

impl Response {
    pub fn status(&self) -> &'static str {
        match self {
            Response::Success(_) => "success",
            Response::Clarify(_) => "clarify",
            Response::Error(_) => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn as_success(&self) -> Option<&SqlResponse> {
        match self {
            Response::Success(sql) => Some(sql),
            _ => None,
        }
    }

    pub fn as_clarify(&self) -> Option<&[ClarificationQuestion]> {
        match self {
            Response::Clarify(questions) => Some(questions),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&str> {
        match self {
            Response::Error(message) => Some(message),
            _ => None,
        }
    }
}
