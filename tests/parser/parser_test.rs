use std::sync::Arc;

use text2sql::catalog::Catalog;
use text2sql::ir::{OrderBy, StructuredRequirement, TimeRange};
use text2sql::parser::{JsonRequirementParser, KeywordParser, ParserError, RequirementParser};

fn keyword_parser() -> Arc<dyn RequirementParser> {
    let catalog = Catalog::builtin().unwrap();
    Arc::new(KeywordParser::new(&catalog))
}

#[tokio::test]
async fn test_keyword_parser_through_trait_object() {
    let parser = keyword_parser();
    let ir = parser
        .parse("Show CTR by slot for the last 7 days")
        .await
        .unwrap();

    assert_eq!(
        ir,
        StructuredRequirement::new()
            .with_metrics(["CTR"])
            .with_dimensions(["slot_id"])
            .with_time_range(TimeRange::relative("last_7_days"))
    );
}

#[tokio::test]
async fn test_keyword_parser_ranking() {
    let parser = keyword_parser();
    let ir = parser.parse("bottom 3 slots by CTR last month").await.unwrap();

    assert_eq!(ir.metrics, vec!["CTR"]);
    assert_eq!(ir.dimensions, vec!["slot_id"]);
    assert_eq!(ir.time_range, Some(TimeRange::relative("last_month")));
    assert_eq!(ir.order_by, Some(OrderBy::asc("CTR")));
    assert_eq!(ir.limit, Some(3));
}

#[tokio::test]
async fn test_keyword_parser_leaves_gaps_unfilled() {
    let parser = keyword_parser();
    let ir = parser.parse("how are the slots doing").await.unwrap();

    assert_eq!(ir.dimensions, vec!["slot_id"]);
    assert!(ir.metrics.is_empty());
    assert!(ir.time_range.is_none());
}

#[tokio::test]
async fn test_json_parser_reads_llm_answer() {
    let parser: Arc<dyn RequirementParser> = Arc::new(JsonRequirementParser::new());
    let answer = r#"```json
{
  "metrics": ["CTR"],
  "dimensions": ["slot_id"],
  "time_range": {"type": "relative", "value": "last_7_days"},
  "filters": ["CTR > 0.01"],
  "order_by": {"field": "CTR", "direction": "desc"},
  "limit": 10
}
```"#;
    let ir = parser.parse(answer).await.unwrap();

    assert_eq!(ir.filters, vec!["CTR > 0.01"]);
    assert_eq!(ir.order_by, Some(OrderBy::desc("CTR")));
    assert_eq!(ir.limit, Some(10));
}

#[tokio::test]
async fn test_json_parser_rejects_wrong_shapes() {
    let parser = JsonRequirementParser::new();

    let err = parser.parse(r#"{"metrics": "CTR"}"#).await.unwrap_err();
    assert!(matches!(err, ParserError::Malformed(_)));

    let err = parser
        .parse(r#"{"time_range": {"type": "sometime", "value": "x"}}"#)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Malformed requirement:"));
}

#[tokio::test]
async fn test_json_parser_keeps_unvalidated_values() {
    let parser = JsonRequirementParser::new();
    let ir = parser
        .parse(r#"{"metrics": ["UNKNOWN_METRIC"], "time_range": {"type": "relative", "value": "last_3_days"}}"#)
        .await
        .unwrap();

    assert_eq!(ir.metrics, vec!["UNKNOWN_METRIC"]);
    assert_eq!(ir.time_range, Some(TimeRange::relative("last_3_days")));
}
