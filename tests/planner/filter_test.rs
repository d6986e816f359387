//! Filter operators compiled through the full pipeline.

#[path = "../common/mod.rs"]
mod common;

use common::{assert_placeholders_aligned, fixed_now, validate_sql};
use quarry::catalog::EntityRegistry;
use quarry::planner::{CompileError, CompileOptions, ReportCompiler};
use quarry::report::{FilterCondition, FilterOperator, ReportConfig};
use serde_json::{json, Value};

/// Compile a one-filter report on vehicles and return the WHERE line and params.
fn where_clause(condition: FilterCondition) -> Result<(String, Vec<Value>), CompileError> {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .filter(condition);
    let query = ReportCompiler::new(EntityRegistry::builtin(), CompileOptions::default())
        .compile_at(&config, fixed_now())?;

    validate_sql(&query.sql).unwrap();
    assert_placeholders_aligned(&query.sql, &query.params);

    let line = query
        .sql
        .lines()
        .find_map(|l| l.strip_prefix("WHERE "))
        .unwrap_or_default()
        .to_string();
    Ok((line, query.params))
}

fn year(op: FilterOperator) -> FilterCondition {
    FilterCondition::new("vehicles", "manufacture_year", op)
}

fn label(op: FilterOperator) -> FilterCondition {
    FilterCondition::new("vehicles", "vehicle_label", op)
}

#[test]
fn test_comparison_operators() {
    let cases = [
        (FilterOperator::Equals, "="),
        (FilterOperator::NotEquals, "!="),
        (FilterOperator::GreaterThan, ">"),
        (FilterOperator::GreaterEqual, ">="),
        (FilterOperator::LessThan, "<"),
        (FilterOperator::LessEqual, "<="),
    ];
    for (op, symbol) in cases {
        let (sql, params) = where_clause(year(op).with_value(2020)).unwrap();
        assert_eq!(sql, format!("vehicles.manufacture_year {symbol} $1"));
        assert_eq!(params, vec![json!(2020)]);
    }
}

#[test]
fn test_pattern_operators() {
    let cases = [
        (FilterOperator::Contains, "ILIKE", "%Van%"),
        (FilterOperator::NotContains, "NOT ILIKE", "%Van%"),
        (FilterOperator::StartsWith, "ILIKE", "Van%"),
        (FilterOperator::EndsWith, "ILIKE", "%Van"),
    ];
    for (op, keyword, pattern) in cases {
        let (sql, params) = where_clause(label(op).with_value("Van")).unwrap();
        assert_eq!(sql, format!("vehicles.vehicle_label {keyword} $1"));
        assert_eq!(params, vec![json!(pattern)]);
    }
}

#[test]
fn test_pattern_text_is_not_interpreted() {
    let condition = label(FilterOperator::Contains).with_value("'; DROP TABLE vehicles; --");
    let (sql, params) = where_clause(condition).unwrap();
    assert_eq!(sql, "vehicles.vehicle_label ILIKE $1");
    assert_eq!(params, vec![json!("%'; DROP TABLE vehicles; --%")]);
}

#[test]
fn test_null_checks_bind_nothing() {
    let (sql, params) = where_clause(label(FilterOperator::IsNull)).unwrap();
    assert_eq!(sql, "vehicles.vehicle_label IS NULL");
    assert!(params.is_empty());

    let (sql, params) =
        where_clause(label(FilterOperator::IsNotNull).with_value("ignored")).unwrap();
    assert_eq!(sql, "vehicles.vehicle_label IS NOT NULL");
    assert!(params.is_empty());
}

#[test]
fn test_between() {
    let (sql, params) = where_clause(year(FilterOperator::Between).with_range(2010, 2020)).unwrap();
    assert_eq!(sql, "vehicles.manufacture_year BETWEEN $1 AND $2");
    assert_eq!(params, vec![json!(2010), json!(2020)]);

    let err = where_clause(year(FilterOperator::Between).with_value(2010)).unwrap_err();
    assert_eq!(
        err,
        CompileError::MissingFilterValue {
            field: "manufacture_year".into()
        }
    );
}

#[test]
fn test_membership() {
    let (sql, params) =
        where_clause(year(FilterOperator::In).with_value(json!([2018, 2019, 2020]))).unwrap();
    assert_eq!(sql, "vehicles.manufacture_year IN ($1, $2, $3)");
    assert_eq!(params, vec![json!(2018), json!(2019), json!(2020)]);

    let (sql, _) = where_clause(year(FilterOperator::NotIn).with_value(json!([2018]))).unwrap();
    assert_eq!(sql, "vehicles.manufacture_year NOT IN ($1)");
}

#[test]
fn test_membership_with_scalar_degrades_to_comparison() {
    let (sql, params) = where_clause(year(FilterOperator::In).with_value(2018)).unwrap();
    assert_eq!(sql, "vehicles.manufacture_year = $1");
    assert_eq!(params, vec![json!(2018)]);

    let (sql, _) = where_clause(year(FilterOperator::NotIn).with_value(2018)).unwrap();
    assert_eq!(sql, "vehicles.manufacture_year != $1");
}

#[test]
fn test_empty_membership_list_rejected() {
    let err = where_clause(year(FilterOperator::In).with_value(json!([]))).unwrap_err();
    assert_eq!(
        err,
        CompileError::EmptyValueList {
            field: "manufacture_year".into()
        }
    );
}

#[test]
fn test_missing_value_binds_null() {
    let (sql, params) = where_clause(label(FilterOperator::Equals)).unwrap();
    assert_eq!(sql, "vehicles.vehicle_label = $1");
    assert_eq!(params, vec![Value::Null]);
}

#[test]
fn test_filters_are_conjoined_in_order() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .filter(label(FilterOperator::StartsWith).with_value("A"))
        .filter(year(FilterOperator::GreaterEqual).with_value(2015))
        .filter(label(FilterOperator::IsNotNull));
    let query = ReportCompiler::new(EntityRegistry::builtin(), CompileOptions::default())
        .compile_at(&config, fixed_now())
        .unwrap();
    assert!(query.sql.contains(
        "WHERE vehicles.vehicle_label ILIKE $1 AND vehicles.manufacture_year >= $2 \
         AND vehicles.vehicle_label IS NOT NULL"
    ));
    assert_eq!(query.params, vec![json!("A%"), json!(2015)]);
}

#[test]
fn test_filter_operator_names_from_json() {
    let condition: FilterCondition = serde_json::from_value(json!({
        "entity_id": "vehicles",
        "field_id": "manufacture_year",
        "operator": "greater_equal",
        "value": 2000
    }))
    .unwrap();
    let (sql, _) = where_clause(condition).unwrap();
    assert_eq!(sql, "vehicles.manufacture_year >= $1");

    let unknown = serde_json::from_value::<FilterCondition>(json!({
        "entity_id": "vehicles",
        "field_id": "manufacture_year",
        "operator": "roughly"
    }));
    assert!(unknown.is_err());
}
