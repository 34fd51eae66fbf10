use chrono::NaiveDate;
use text2sql::catalog::Catalog;
use text2sql::ir::{
    OrderBy, RelativeWindow, RequirementField, SortDirection, StructuredRequirement, TimeRange,
    TimeWindow,
};
use text2sql::resolver::{FilterRef, OrderTarget, RequestError, Resolver, Verdict};

fn catalog() -> Catalog {
    Catalog::builtin().unwrap()
}

fn fields(verdict: &Verdict) -> Vec<RequirementField> {
    match verdict {
        Verdict::NeedsClarification(questions) => questions.iter().map(|q| q.field).collect(),
        other => panic!("expected clarification, got {:?}", other),
    }
}

#[test]
fn test_complete_request() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["ctr"])
        .with_dimensions(["SLOT_ID"])
        .with_time_range(TimeRange::relative("last_7_days"));

    let Verdict::Complete(resolved) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected a complete request");
    };
    assert_eq!(resolved.metrics[0].name, "CTR");
    assert_eq!(resolved.dimensions[0].name, "slot_id");
    assert_eq!(resolved.window, TimeWindow::Relative(RelativeWindow::Last7Days));
    assert!(resolved.filters.is_empty());
    assert!(!resolved.is_totals());
}

#[test]
fn test_duplicate_names_collapse() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR", "ctr", " clicks "])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("yesterday"));

    let Verdict::Complete(resolved) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected a complete request");
    };
    let names: Vec<&str> = resolved.metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["CTR", "clicks"]);
}

#[test]
fn test_missing_dimensions_asks_one_question() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_time_range(TimeRange::relative("last_7_days"));

    let verdict = Resolver::new(&catalog).resolve(&ir);
    assert_eq!(fields(&verdict), vec![RequirementField::Dimensions]);

    let Verdict::NeedsClarification(questions) = verdict else {
        unreachable!();
    };
    assert!(questions[0].message.contains("slot_id"));
    assert!(questions[0].message.contains("'none'"));
}

#[test]
fn test_questions_are_ordered_by_field() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_dimensions(["industry"])
        .with_filter("region = 'north'");

    let verdict = Resolver::new(&catalog).resolve(&ir);
    assert_eq!(
        fields(&verdict),
        vec![
            RequirementField::Metrics,
            RequirementField::TimeRange,
            RequirementField::Filters,
        ]
    );
}

#[test]
fn test_explicit_totals() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["spend"])
        .totals()
        .with_time_range(TimeRange::relative("this_month"));

    let Verdict::Complete(resolved) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected a complete request");
    };
    assert!(resolved.is_totals());
}

#[test]
fn test_totals_mixed_with_grouping() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["spend"])
        .with_dimensions(["none", "slot_id"])
        .with_time_range(TimeRange::relative("this_month"));

    let verdict = Resolver::new(&catalog).resolve(&ir);
    assert_eq!(fields(&verdict), vec![RequirementField::Dimensions]);
}

#[test]
fn test_unknown_metric_is_invalid() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["UNKNOWN_METRIC"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_7_days"));

    let Verdict::Invalid(error) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected an invalid request");
    };
    assert_eq!(
        error,
        RequestError::UnknownReference {
            metrics: vec!["UNKNOWN_METRIC".into()],
            dimensions: vec![],
        }
    );
    assert!(error.to_string().contains("unknown metric 'UNKNOWN_METRIC'"));
}

#[test]
fn test_empty_request_is_invalid() {
    let catalog = catalog();
    let ir = StructuredRequirement::new().with_metrics(["  "]);
    assert_eq!(
        Resolver::new(&catalog).resolve(&ir),
        Verdict::Invalid(RequestError::Empty)
    );
}

#[test]
fn test_unrecognised_relative_window() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_3_days"));

    let Verdict::NeedsClarification(questions) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected clarification");
    };
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].field, RequirementField::TimeRange);
    assert!(questions[0]
        .message
        .contains("'last_3_days' is not a recognised relative window"));
}

#[test]
fn test_reversed_absolute_range() {
    let catalog = catalog();
    let start = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::absolute(start, end));

    let verdict = Resolver::new(&catalog).resolve(&ir);
    assert_eq!(fields(&verdict), vec![RequirementField::TimeRange]);
}

#[test]
fn test_filter_references_are_bound() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_7_days"))
        .with_filter("CTR > 0.01")
        .with_filter("slot_type = 'banner'")
        .with_filter("dim_creative.format = 'video'");

    let Verdict::Complete(resolved) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected a complete request");
    };
    assert_eq!(resolved.filters.len(), 3);
    assert!(resolved.filters[0].references_metric());
    assert!(matches!(
        resolved.filters[1].references[0],
        FilterRef::Dimension(d) if d.name == "slot_type"
    ));
    assert_eq!(
        resolved.filters[2].references,
        vec![FilterRef::Column {
            column: "format".into(),
            tables: vec!["dim_creative".into()],
        }]
    );
}

#[test]
fn test_filter_text_is_normalized() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_7_days"))
        .with_filter("slot_type   = 'banner' -- only banners");

    let Verdict::Complete(resolved) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected a complete request");
    };
    assert_eq!(resolved.filters[0].text, "slot_type = 'banner'");
    assert_eq!(resolved.filters[0].predicate.to_string(), resolved.filters[0].text);
}

#[test]
fn test_filter_problems_share_one_question() {
    let catalog = catalog();
    let ir = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_7_days"))
        .with_filter("CPC > 1")
        .with_filter("region = 'north'")
        .with_filter("slot_id IN (SELECT slot_id FROM dim_slot)");

    let Verdict::NeedsClarification(questions) = Resolver::new(&catalog).resolve(&ir) else {
        panic!("expected clarification");
    };
    assert_eq!(questions.len(), 1);
    let message = &questions[0].message;
    assert!(message.contains("filters on metric 'CPC' which is not requested"));
    assert!(message.contains("unknown field 'region'"));
    assert!(message.contains("subqueries are not allowed"));
}

#[test]
fn test_order_by_must_be_requested() {
    let catalog = catalog();
    let base = StructuredRequirement::new()
        .with_metrics(["CTR"])
        .with_dimensions(["slot_id"])
        .with_time_range(TimeRange::relative("last_7_days"));

    let ordered = base.clone().with_order_by(OrderBy::desc("ctr")).with_limit(5);
    let Verdict::Complete(resolved) = Resolver::new(&catalog).resolve(&ordered) else {
        panic!("expected a complete request");
    };
    let (target, direction) = resolved.order_by.unwrap();
    assert!(matches!(target, OrderTarget::Metric(m) if m.name == "CTR"));
    assert_eq!(direction, SortDirection::Desc);
    assert_eq!(resolved.limit, Some(5));

    let stray = base.with_order_by(OrderBy::asc("spend"));
    let verdict = Resolver::new(&catalog).resolve(&stray);
    assert_eq!(fields(&verdict), vec![RequirementField::OrderBy]);
}
