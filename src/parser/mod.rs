//! Natural-language parsing collaborators.
//!
//! A [`RequirementParser`] turns free text into a candidate
//! [`StructuredRequirement`]. The pipeline treats it as an external
//! collaborator: it may call out to an LLM, and its failures are reported
//! to the user rather than propagated.
//!
//! Two implementations ship with the crate:
//!
//! - [`JsonRequirementParser`]: the text already is an IR JSON document,
//!   the shape an LLM is asked to return by [`crate::prompt`]
//! - [`KeywordParser`]: deterministic matching against the catalog
//!   vocabulary, with no external calls

mod json;
mod keyword;

pub use json::JsonRequirementParser;
pub use keyword::KeywordParser;

use async_trait::async_trait;

use crate::ir::StructuredRequirement;

/// Failure of the parsing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParserError {
    /// The collaborator answered, but not with a usable requirement.
    #[error("Malformed requirement: {0}")]
    Malformed(String),

    /// The collaborator could not be reached or refused the request.
    #[error("Parser unavailable: {0}")]
    Unavailable(String),
}

/// Translates free text into a candidate requirement.
///
/// Implementations must not validate against the catalog beyond what they
/// need for matching; unknown names and missing fields are the resolver's
/// concern.
#[async_trait]
pub trait RequirementParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<StructuredRequirement, ParserError>;
}
