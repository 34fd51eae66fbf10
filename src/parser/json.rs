//! IR JSON as parser input.

use async_trait::async_trait;

use super::{ParserError, RequirementParser};
use crate::ir::StructuredRequirement;

/// Reads the text as an IR JSON document.
///
/// Markdown code fences around the document are tolerated, since that is
/// how chat models usually wrap JSON answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRequirementParser;

impl JsonRequirementParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, text: &str) -> Result<StructuredRequirement, ParserError> {
        let body = strip_code_fence(text);
        serde_json::from_str(body).map_err(|e| ParserError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RequirementParser for JsonRequirementParser {
    async fn parse(&self, text: &str) -> Result<StructuredRequirement, ParserError> {
        self.parse_str(text)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
