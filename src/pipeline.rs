//! End-to-end translation from free text to SQL.
//!
//! ```text
//! text → RequirementParser → StructuredRequirement → Resolver → Synthesizer → Response
//! ```
//!
//! The [`Pipeline`] is the error boundary: every request-time failure is
//! converted into [`Response::Error`], so callers always get an envelope.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use text2sql::catalog::Catalog;
//! use text2sql::parser::KeywordParser;
//! use text2sql::pipeline::Pipeline;
//!
//! let catalog = Arc::new(Catalog::builtin()?);
//! let parser = Arc::new(KeywordParser::new(&catalog));
//! let pipeline = Pipeline::new(catalog, parser);
//!
//! let anchor = chrono::NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
//! let response = pipeline.process("CTR by slot for the last 7 days", anchor).await;
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::catalog::Catalog;
use crate::ir::{Response, StructuredRequirement};
use crate::parser::{ParserError, RequirementParser};
use crate::resolver::{RequestError, Resolver, Verdict};
use crate::sql::Dialect;
use crate::synth::{SynthesisError, Synthesizer};

// ============================================================================
// Error Types
// ============================================================================

/// Request-time failures, reported as [`Response::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Invalid(#[from] RequestError),

    #[error("Requirement parsing failed: {0}")]
    Collaborator(#[from] ParserError),

    #[error("Could not generate SQL: {0}")]
    Synthesis(#[from] SynthesisError),
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub dialect: Dialect,
}

impl PipelineOptions {
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Shared, cheaply cloneable translation service.
#[derive(Clone)]
pub struct Pipeline {
    catalog: Arc<Catalog>,
    parser: Arc<dyn RequirementParser>,
    options: PipelineOptions,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(catalog: Arc<Catalog>, parser: Arc<dyn RequirementParser>) -> Self {
        Self {
            catalog,
            parser,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Translate free text as of `anchor`.
    pub async fn process(&self, text: &str, anchor: NaiveDate) -> Response {
        match self.parse(text).await {
            Ok(ir) => self.process_requirement(&ir, anchor),
            Err(e) => self.fail(e),
        }
    }

    /// Run only the parsing collaborator.
    pub async fn parse(&self, text: &str) -> Result<StructuredRequirement, PipelineError> {
        if text.trim().is_empty() {
            return Err(RequestError::Empty.into());
        }
        let ir = self.parser.parse(text).await?;
        tracing::debug!(?ir, "parsed requirement");
        Ok(ir)
    }

    /// Resolve and synthesize an already structured requirement.
    pub fn process_requirement(&self, ir: &StructuredRequirement, anchor: NaiveDate) -> Response {
        match self.evaluate(ir, anchor) {
            Ok(response) => {
                tracing::info!(
                    status = response.status(),
                    metrics = ?ir.metrics,
                    dimensions = ?ir.dimensions,
                    "request processed"
                );
                response
            }
            Err(e) => self.fail(e),
        }
    }

    fn evaluate(
        &self,
        ir: &StructuredRequirement,
        anchor: NaiveDate,
    ) -> Result<Response, PipelineError> {
        match Resolver::new(&self.catalog).resolve(ir) {
            Verdict::Complete(request) => {
                let sql = Synthesizer::new(&self.catalog)
                    .with_dialect(self.options.dialect)
                    .synthesize(&request, anchor)?;
                tracing::debug!(sql = %sql.sql, "synthesized query");
                Ok(Response::Success(sql))
            }
            Verdict::NeedsClarification(questions) => Ok(Response::Clarify(questions)),
            Verdict::Invalid(e) => Err(e.into()),
        }
    }

    fn fail(&self, error: PipelineError) -> Response {
        tracing::warn!(error = %error, "request failed");
        Response::Error(error.to_string())
    }
}
