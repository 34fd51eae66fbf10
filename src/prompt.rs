//! Translator prompt for an external LLM.
//!
//! The rendered prompt lists the catalog vocabulary and asks for an IR JSON
//! document, which [`crate::parser::JsonRequirementParser`] reads back.

use std::fmt::Write;

use crate::catalog::Catalog;
use crate::ir::{RelativeWindow, NONE_DIMENSION};

/// Render the prompt translating `text` into a structured requirement.
pub fn translation_prompt(catalog: &Catalog, text: &str) -> String {
    let mut out = String::new();

    out.push_str(
        "You are an advertising analytics expert. Convert the user's question \
         into a structured analytics requirement.\n\n",
    );

    out.push_str("Known metrics:\n");
    for metric in catalog.metrics() {
        let _ = write!(out, "- {} ({})", metric.name, metric.metric_type.as_str());
        if !metric.description.is_empty() {
            let _ = write!(out, ": {}", metric.description);
        }
        if !metric.synonyms.is_empty() {
            let _ = write!(out, " [also: {}]", metric.synonyms.join(", "));
        }
        out.push('\n');
    }

    out.push_str("\nKnown dimensions:\n");
    for dimension in catalog.dimensions() {
        let _ = write!(out, "- {}", dimension.name);
        if !dimension.description.is_empty() {
            let _ = write!(out, ": {}", dimension.description);
        }
        if !dimension.synonyms.is_empty() {
            let _ = write!(out, " [also: {}]", dimension.synonyms.join(", "));
        }
        out.push('\n');
    }

    let windows: Vec<&str> = RelativeWindow::ALL.iter().map(|w| w.as_str()).collect();
    let _ = writeln!(
        out,
        "\nRelative time ranges: {}. Absolute time ranges are inclusive \
         \"YYYY-MM-DD/YYYY-MM-DD\" intervals.",
        windows.join(", ")
    );
    let _ = writeln!(
        out,
        "Use [\"{}\"] as dimensions when the user asks for overall totals. \
         Leave a field empty rather than guessing.",
        NONE_DIMENSION
    );

    let _ = writeln!(out, "\nUser input: {}", text.trim());

    out.push_str(
        r#"
Answer with JSON only, in this shape:
{
  "metrics": ["metric names"],
  "dimensions": ["dimension names"],
  "time_range": {"type": "relative or absolute", "value": "time range"},
  "filters": ["SQL boolean conditions"],
  "order_by": {"field": "metric or dimension", "direction": "asc or desc"},
  "limit": 10
}
"#,
    );

    out
}
