use std::fs;

use text2sql::catalog::{Catalog, CatalogError, JoinCondition, MetricType};

#[test]
fn test_builtin_catalog_contents() {
    let catalog = Catalog::builtin().unwrap();

    let ctr = catalog.lookup_metric("ctr").unwrap();
    assert_eq!(ctr.name, "CTR");
    assert_eq!(ctr.metric_type, MetricType::Ratio);
    assert_eq!(ctr.dependencies, vec!["dwd_ad_impression"]);
    assert_eq!(ctr.formula.source(), "click_cnt / impression_cnt");

    let slot = catalog.lookup_dimension("slot_id").unwrap();
    assert_eq!(slot.table, "dim_slot");
    assert_eq!(
        slot.join_to("dwd_ad_impression").unwrap().condition,
        JoinCondition::Using(vec!["slot_id".into()])
    );

    let impressions = catalog.lookup_table("dwd_ad_impression").unwrap();
    assert_eq!(impressions.partition_key.as_deref(), Some("dt"));
    assert!(catalog.lookup_table("dim_slot").unwrap().partition_key.is_none());
}

#[test]
fn test_unknown_names_are_absent() {
    let catalog = Catalog::builtin().unwrap();
    assert!(catalog.lookup_metric("UNKNOWN_METRIC").is_none());
    assert!(catalog.lookup_dimension("region").is_none());
    assert!(catalog.lookup_table("dwd_ad_conversion").is_none());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.toml");
    fs::write(
        &path,
        r#"
[tables.orders]
partition_key = "dt"
columns = { dt = "date", shop_id = "bigint", amount = "decimal(12,2)", order_cnt = "bigint" }

[tables.dim_shop]
columns = { shop_id = "bigint", city = "string" }

[metrics.gmv]
formula = "SUM(amount)"
dependencies = ["orders"]
type = "currency"

[metrics.aov]
formula = "gmv / order_cnt"
dependencies = ["orders"]
type = "currency"

[dimensions.city]
table = "dim_shop"
joins = [{ table = "orders", condition = "orders.shop_id = dim_shop.shop_id" }]
"#,
    )
    .unwrap();

    let catalog = Catalog::from_file(&path).unwrap();
    assert_eq!(catalog.metrics().count(), 2);
    let city = catalog.lookup_dimension("city").unwrap();
    assert_eq!(
        city.joins[0].condition,
        JoinCondition::On("orders.shop_id = dim_shop.shop_id".into())
    );
}

#[test]
fn test_missing_file_is_read_error() {
    let err = Catalog::from_file("/no/such/catalog.toml").unwrap_err();
    assert!(matches!(err, CatalogError::Read { .. }));
}

#[test]
fn test_dangling_references_fail_fast() {
    let toml = r#"
[tables.facts]
partition_key = "dt"
columns = { dt = "date", slot_id = "bigint", clicks = "bigint" }

[metrics.click_total]
formula = "SUM(clicks)"
dependencies = ["facts", "dwd_missing"]
type = "count"

[dimensions.slot_id]
table = "facts"
joins = [{ table = "dim_missing", condition = "using(slot_id)" }]
"#;
    let err = Catalog::from_toml_str(toml).unwrap_err();
    let message = err.to_string();

    assert!(message.starts_with("Catalog integrity check failed:"));
    assert!(message.contains("Metric 'click_total' references undefined table 'dwd_missing'"));
    assert!(message.contains("Dimension 'slot_id' references undefined join target 'dim_missing'"));
}

#[test]
fn test_cycles_are_rejected() {
    let toml = r#"
[tables.facts]
columns = { n = "bigint" }

[metrics.a]
formula = "b + 1"
dependencies = ["facts"]
type = "number"

[metrics.b]
formula = "a * 2"
dependencies = ["facts"]
type = "number"
"#;
    let Err(CatalogError::Integrity(violations)) = Catalog::from_toml_str(toml) else {
        panic!("expected integrity failure");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].to_string(),
        "Circular metric dependency: a -> b"
    );
}
