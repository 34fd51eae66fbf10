use std::sync::Arc;

use chrono::NaiveDate;
use text2sql::catalog::Catalog;
use text2sql::ir::{RequirementField, Response};
use text2sql::parser::{JsonRequirementParser, KeywordParser};
use text2sql::pipeline::{Pipeline, PipelineOptions};
use text2sql::sql::Dialect;

const CTR_BY_SLOT_LAST_7_DAYS: &str = "SELECT
  `slot_id`,
  SUM(`dwd_ad_impression`.`click_cnt`) / NULLIF(SUM(`dwd_ad_impression`.`impression_cnt`), 0) AS `CTR`
FROM `dwd_ad_impression`
LEFT JOIN `dim_slot` USING (`slot_id`)
WHERE `dwd_ad_impression`.`dt` >= DATE_SUB(DATE '2024-06-15', 7) AND `dwd_ad_impression`.`dt` < DATE '2024-06-15'
GROUP BY `slot_id`";

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn keyword_pipeline() -> Pipeline {
    let catalog = Arc::new(Catalog::builtin().unwrap());
    let parser = Arc::new(KeywordParser::new(&catalog));
    Pipeline::new(catalog, parser)
}

fn json_pipeline() -> Pipeline {
    let catalog = Arc::new(Catalog::builtin().unwrap());
    Pipeline::new(catalog, Arc::new(JsonRequirementParser::new()))
}

#[tokio::test]
async fn test_english_question_to_sql() {
    let response = keyword_pipeline()
        .process("Show CTR by slot for the last 7 days", anchor())
        .await;

    let sql = response.as_success().expect("success");
    assert_eq!(sql.sql, CTR_BY_SLOT_LAST_7_DAYS);
    assert!(!sql.explanation.is_empty());
    assert!(!sql.performance_hints.is_empty());
}

#[tokio::test]
async fn test_chinese_question_to_sql() {
    let response = keyword_pipeline()
        .process("最近7天各广告位的点击率", anchor())
        .await;
    assert_eq!(response.as_success().expect("success").sql, CTR_BY_SLOT_LAST_7_DAYS);
}

#[tokio::test]
async fn test_missing_grouping_asks_instead_of_guessing() {
    let response = keyword_pipeline()
        .process("CTR for the last 7 days", anchor())
        .await;

    let questions = response.as_clarify().expect("clarify");
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].field, RequirementField::Dimensions);
}

#[tokio::test]
async fn test_explicit_totals_compile() {
    let response = keyword_pipeline()
        .process("total spend last 30 days", anchor())
        .await;

    let sql = &response.as_success().expect("success").sql;
    assert!(!sql.contains("GROUP BY"));
    assert!(sql.contains("DATE_SUB(DATE '2024-06-15', 30)"));
}

#[tokio::test]
async fn test_unrecognised_text_is_error() {
    let response = keyword_pipeline().process("hello there", anchor()).await;
    assert_eq!(
        response.as_error(),
        Some("Request is empty: no metric, dimension, time range or filter could be interpreted")
    );
}

#[tokio::test]
async fn test_unknown_metric_is_error() {
    let response = json_pipeline()
        .process(
            r#"{"metrics": ["UNKNOWN_METRIC"], "dimensions": ["slot_id"],
                "time_range": {"type": "relative", "value": "last_7_days"}}"#,
            anchor(),
        )
        .await;

    let message = response.as_error().expect("error");
    assert!(message.contains("unknown metric 'UNKNOWN_METRIC'"), "{}", message);
}

#[tokio::test]
async fn test_malformed_parser_output_is_error() {
    let response = json_pipeline().process("not json at all", anchor()).await;
    assert!(response
        .as_error()
        .expect("error")
        .starts_with("Requirement parsing failed: Malformed requirement:"));
}

#[tokio::test]
async fn test_metric_filter_with_ranking() {
    let response = json_pipeline()
        .process(
            r#"{"metrics": ["CTR"], "dimensions": ["slot_id"],
                "time_range": {"type": "relative", "value": "last_7_days"},
                "filters": ["CTR > 0.01"],
                "order_by": {"field": "CTR", "direction": "desc"},
                "limit": 5}"#,
            anchor(),
        )
        .await;

    let sql = &response.as_success().expect("success").sql;
    assert!(sql.starts_with("WITH `base` AS (\nSELECT"));
    assert!(sql.ends_with("WHERE (`CTR` > 0.01)\nORDER BY `CTR` DESC NULLS LAST\nLIMIT 5"));
}

#[tokio::test]
async fn test_postgres_option() {
    let pipeline = keyword_pipeline().with_options(PipelineOptions::default().with_dialect(Dialect::Postgres));
    let response = pipeline
        .process("Show CTR by slot for the last 7 days", anchor())
        .await;

    let sql = &response.as_success().expect("success").sql;
    assert!(sql.contains("FROM \"dwd_ad_impression\""));
    assert!(sql.contains("(DATE '2024-06-15' - 7)"));
}

#[tokio::test]
async fn test_same_input_same_output() {
    let pipeline = keyword_pipeline();
    let first = pipeline.process("top 10 creatives by spend yesterday", anchor()).await;
    let second = pipeline.process("top 10 creatives by spend yesterday", anchor()).await;
    assert!(first.is_success());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_response_envelope_json() {
    let response = keyword_pipeline()
        .process("CTR for the last 7 days", anchor())
        .await;
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["status"], "clarify");
    assert_eq!(json["data"][0]["field"], "dimensions");

    let round_trip: Response = serde_json::from_value(json).unwrap();
    assert_eq!(round_trip, response);
}
