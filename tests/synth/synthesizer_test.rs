use chrono::NaiveDate;
use sqlparser::dialect::{GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use text2sql::catalog::Catalog;
use text2sql::ir::{OrderBy, SqlResponse, StructuredRequirement, TimeRange, TimeRangeError};
use text2sql::resolver::{Resolver, Verdict};
use text2sql::sql::Dialect;
use text2sql::synth::{SynthesisError, Synthesizer};

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn synthesize(
    catalog: &Catalog,
    ir: &StructuredRequirement,
    dialect: Dialect,
) -> Result<SqlResponse, SynthesisError> {
    let Verdict::Complete(request) = Resolver::new(catalog).resolve(ir) else {
        panic!("expected a complete request: {:?}", ir);
    };
    Synthesizer::new(catalog)
        .with_dialect(dialect)
        .synthesize(&request, anchor())
}

fn ctr_by_slot() -> StructuredRequirement {
    StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_7_days"))
}

fn assert_parses(sql: &str, dialect: Dialect) {
    let result = match dialect {
        Dialect::Databricks => Parser::parse_sql(&GenericDialect {}, sql),
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
    };
    assert!(result.is_ok(), "{:?}\n{}", result.err(), sql);
}

#[test]
fn test_ctr_by_slot_databricks() {
    let catalog = Catalog::builtin().unwrap();
    let response = synthesize(&catalog, &ctr_by_slot(), Dialect::Databricks).unwrap();

    insta::assert_snapshot!(response.sql, @r"
SELECT
  `slot_id`,
  SUM(`dwd_ad_impression`.`click_cnt`) / NULLIF(SUM(`dwd_ad_impression`.`impression_cnt`), 0) AS `CTR`
FROM `dwd_ad_impression`
LEFT JOIN `dim_slot` USING (`slot_id`)
WHERE `dwd_ad_impression`.`dt` >= DATE_SUB(DATE '2024-06-15', 7) AND `dwd_ad_impression`.`dt` < DATE '2024-06-15'
GROUP BY `slot_id`
");
    assert_parses(&response.sql, Dialect::Databricks);

    assert_eq!(
        response.explanation,
        "Computes CTR (Click-through rate: clicks per impression) broken down by slot_id \
         for the last 7 days (2024-06-08 to 2024-06-14). Reads dwd_ad_impression, \
         left-joined with dim_slot using(slot_id)."
    );
    assert_eq!(
        response.performance_hints[0],
        "Partition pruning: dwd_ad_impression is restricted on partition key dt to 7 daily partitions."
    );
}

#[test]
fn test_ctr_by_slot_postgres() {
    let catalog = Catalog::builtin().unwrap();
    let response = synthesize(&catalog, &ctr_by_slot(), Dialect::Postgres).unwrap();

    assert!(response.sql.contains(
        "WHERE \"dwd_ad_impression\".\"dt\" >= (DATE '2024-06-15' - 7) \
         AND \"dwd_ad_impression\".\"dt\" < DATE '2024-06-15'"
    ));
    assert!(response.sql.contains("LEFT JOIN \"dim_slot\" USING (\"slot_id\")"));
    assert_parses(&response.sql, Dialect::Postgres);
}

#[test]
fn test_output_is_deterministic() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot()
        .with_metrics(["CTR", "spend", "clicks"])
        .with_dimensions(["slot_id", "creative_id"]);
    let first = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();
    let second = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_two_dimension_tables_join_separately() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot().with_dimensions(["slot_id", "creative_id"]);
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert_eq!(response.sql.matches("LEFT JOIN").count(), 2);
    assert!(response.sql.contains("LEFT JOIN `dim_slot` USING (`slot_id`)"));
    assert!(response.sql.contains("LEFT JOIN `dim_creative` USING (`creative_id`)"));
    assert!(response
        .performance_hints
        .iter()
        .any(|h| h.starts_with("Join strategy:")));
    assert_parses(&response.sql, Dialect::Databricks);
}

#[test]
fn test_shared_dimension_table_joins_once() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot().with_dimensions(["slot_id", "slot_type"]);
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();
    assert_eq!(response.sql.matches("LEFT JOIN").count(), 1);
}

#[test]
fn test_totals_have_no_group_by() {
    let catalog = Catalog::builtin().unwrap();
    let ir = StructuredRequirement::new()
        .with_metrics(["spend"])
        .totals()
        .with_time_range(TimeRange::relative("yesterday"));
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert!(response.sql.starts_with("SELECT\n  SUM(`dwd_ad_impression`.`cost`) AS `spend`\n"));
    assert!(!response.sql.contains("GROUP BY"));
    assert!(!response.sql.contains("JOIN"));
    assert!(response.explanation.contains("as overall totals"));
}

#[test]
fn test_metric_filter_wraps_in_cte() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot().with_filter("CTR > 0.01");
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert!(response.sql.starts_with("WITH `base` AS (\nSELECT"));
    assert!(response.sql.ends_with("FROM `base`\nWHERE (`CTR` > 0.01)"));
    assert!(response
        .explanation
        .contains("Aggregated results are kept only where CTR > 0.01."));
    assert_parses(&response.sql, Dialect::Databricks);
}

#[test]
fn test_metric_filter_postgres_matches_quoted_alias() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot().with_filter("ctr > 0.01 AND slot_id <> 0");
    let response = synthesize(&catalog, &ir, Dialect::Postgres).unwrap();

    assert!(response.sql.contains(" AS \"CTR\"\n"));
    assert!(response
        .sql
        .ends_with("FROM \"base\"\nWHERE (\"CTR\" > 0.01 AND \"slot_id\" <> 0)"));
    assert_parses(&response.sql, Dialect::Postgres);
}

#[test]
fn test_filter_comment_does_not_swallow_sql() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot()
        .with_filter("slot_type = 'banner' -- only banners")
        .with_filter("CTR > 0.01 -- keep good slots")
        .with_order_by(OrderBy::desc("CTR"))
        .with_limit(5);

    for dialect in Dialect::ALL {
        let response = synthesize(&catalog, &ir, dialect).unwrap();
        assert!(!response.sql.contains("--"), "{}", response.sql);
        assert!(response.sql.contains(" AND (slot_type = 'banner')\nGROUP BY "));
        assert!(response.sql.ends_with("NULLS LAST\nLIMIT 5"));
        assert_parses(&response.sql, dialect);
    }
}

#[test]
fn test_sql_mentions_every_formula_token() {
    fn formula_tokens(source: &str) -> Vec<String> {
        source
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase())
            .collect()
    }

    let composed = Catalog::from_toml_str(
        r#"
        [tables.orders]
        partition_key = "dt"
        columns = { dt = "date", amount = "decimal(12,2)", order_cnt = "bigint" }

        [metrics.gmv]
        formula = "SUM(amount)"
        dependencies = ["orders"]
        type = "currency"

        [metrics.orders_placed]
        formula = "SUM(order_cnt)"
        dependencies = ["orders"]
        type = "count"

        [metrics.aov]
        formula = "gmv / orders_placed"
        dependencies = ["orders"]
        type = "currency"
        "#,
    )
    .unwrap();

    for catalog in [Catalog::builtin().unwrap(), composed] {
        for metric in catalog.metrics() {
            let ir = StructuredRequirement::new()
                .with_metrics([metric.name.as_str()])
                .totals()
                .with_time_range(TimeRange::relative("last_7_days"));
            let sql = synthesize(&catalog, &ir, Dialect::Databricks)
                .unwrap()
                .sql
                .to_lowercase();
            for token in formula_tokens(metric.formula.source()) {
                assert!(sql.contains(&token), "{}: '{}' missing from\n{}", metric.name, token, sql);
            }
            assert_parses(&sql, Dialect::Databricks);
        }
    }
}

#[test]
fn test_row_filters_join_the_partition_predicate() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot().with_filter("slot_type = 'banner'");
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert!(response.sql.contains("AND (slot_type = 'banner')"));
    assert!(response.performance_hints.contains(
        &"Index: filters read slot_type; an index or Z-ORDER on that column speeds them up."
            .to_string()
    ));
}

#[test]
fn test_filter_column_adds_join() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot().with_filter("dim_creative.format = 'video'");
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();
    assert!(response
        .sql
        .contains("LEFT JOIN `dim_creative` USING (`creative_id`)"));
}

#[test]
fn test_order_and_limit() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot()
        .with_order_by(OrderBy::desc("CTR"))
        .with_limit(5);
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert!(response
        .sql
        .ends_with("\nORDER BY `CTR` DESC NULLS LAST\nLIMIT 5"));
    assert!(response.explanation.ends_with("Ordered by CTR descending. Returns at most 5 rows."));
    assert_parses(&response.sql, Dialect::Databricks);
}

#[test]
fn test_limit_beyond_signed_range() {
    let catalog = Catalog::builtin().unwrap();
    let ir = ctr_by_slot()
        .with_order_by(OrderBy::desc("CTR"))
        .with_limit(u64::MAX);
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert!(response.sql.ends_with("\nLIMIT 18446744073709551615"));
    assert!(!response.sql.contains("LIMIT -"));
    assert_parses(&response.sql, Dialect::Databricks);
}

#[test]
fn test_date_dimension_on_another_fact_table() {
    let catalog = Catalog::builtin().unwrap();
    let ir = StructuredRequirement::new()
        .with_metrics(["slot_spend"])
        .with_dimensions(["dt"])
        .with_time_range(TimeRange::relative("last_7_days"));
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();

    assert!(response.sql.starts_with(
        "SELECT\n  `dwd_ad_cost`.`dt`,\n  SUM(`dwd_ad_cost`.`cost_amount`) AS `slot_spend`\nFROM `dwd_ad_cost`\nWHERE "
    ));
    assert!(response.sql.ends_with("\nGROUP BY `dwd_ad_cost`.`dt`"));
    assert!(!response.sql.contains("JOIN"));
    assert_parses(&response.sql, Dialect::Databricks);

    let ir = StructuredRequirement::new()
        .with_metrics(["click_events"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_30_days"))
        .with_filter("dt >= '2024-06-01'");
    let response = synthesize(&catalog, &ir, Dialect::Databricks).unwrap();
    assert!(response.sql.contains("\nFROM `dwd_ad_click`\n"));
    assert!(response.sql.contains(" AND (dt >= '2024-06-01')"));
}

#[test]
fn test_anchor_outside_calendar() {
    let catalog = Catalog::builtin().unwrap();
    let Verdict::Complete(request) = Resolver::new(&catalog).resolve(&ctr_by_slot()) else {
        panic!("expected a complete request");
    };
    let err = Synthesizer::new(&catalog)
        .synthesize(&request, NaiveDate::MIN)
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::Window(TimeRangeError::OutOfRange { .. })
    ));
}

#[test]
fn test_dimension_without_join_path() {
    let catalog = Catalog::builtin().unwrap();
    let ir = StructuredRequirement::new()
        .with_metrics(["slot_spend"])
        .with_dimensions(["industry"])
        .with_time_range(TimeRange::relative("last_30_days"));
    let err = synthesize(&catalog, &ir, Dialect::Databricks).unwrap_err();
    assert_eq!(
        err,
        SynthesisError::NoJoinPath {
            dimension: "industry".into(),
            table: "dwd_ad_cost".into(),
        }
    );
}
