//! # text2sql
//!
//! Translates natural-language advertising analytics questions into
//! partition-safe SQL over a declared semantic catalog.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Free text question                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [parser]  (keyword matcher, IR JSON, LLM)
//! ┌─────────────────────────────────────────────────────────┐
//! │               StructuredRequirement (IR)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolver]  (against the catalog)
//! ┌─────────────────────────────────────────────────────────┐
//! │   Complete │ NeedsClarification │ Invalid                │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [synth]  (anchor date + dialect)
//! ┌─────────────────────────────────────────────────────────┐
//! │          SQL + explanation + performance hints           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`pipeline::Pipeline`] runs the stages and converts every outcome
//! into an [`ir::Response`] envelope.

pub mod catalog;
pub mod config;
pub mod ir;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod sql;
pub mod synth;

#[cfg(feature = "server")]
pub mod web;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{Catalog, CatalogError, DimensionDefinition, MetricDefinition};
    pub use crate::ir::{
        ClarificationQuestion, OrderBy, RelativeWindow, RequirementField, Response,
        SortDirection, SqlResponse, StructuredRequirement, TimeRange, TimeWindow,
    };
    pub use crate::parser::{JsonRequirementParser, KeywordParser, ParserError, RequirementParser};
    pub use crate::pipeline::{Pipeline, PipelineError, PipelineOptions};
    pub use crate::resolver::{RequestError, ResolvedRequest, Resolver, Verdict};
    pub use crate::sql::Dialect;
    pub use crate::synth::{SynthesisError, Synthesizer};
}

pub use catalog::Catalog;
pub use ir::{Response, StructuredRequirement};
pub use pipeline::Pipeline;
pub use sql::Dialect;
