//! Time windows: bound resolution and the predicates they compile to.

#[path = "../common/mod.rs"]
mod common;

use chrono::NaiveDate;
use common::{assert_placeholders_aligned, fixed_now, validate_sql};
use quarry::catalog::EntityRegistry;
use quarry::planner::time_range::{resolve, TimeBounds};
use quarry::planner::{CompileError, CompileOptions, CompiledQuery, ReportCompiler};
use quarry::report::{FilterCondition, FilterOperator, ReportConfig, TimeRange};
use serde_json::json;

fn compile(config: &ReportConfig) -> Result<CompiledQuery, CompileError> {
    ReportCompiler::new(EntityRegistry::builtin(), CompileOptions::default())
        .compile_at(config, fixed_now())
}

fn start_of(value: Option<i64>, unit: Option<&str>) -> String {
    let range = TimeRange::Relative {
        value,
        unit: unit.map(Into::into),
    };
    let bounds = resolve(&range, fixed_now()).unwrap();
    assert_eq!(bounds.end, Some(fixed_now()));
    TimeBounds::format(bounds.start.unwrap())
}

#[test]
fn test_relative_units() {
    assert_eq!(start_of(Some(6), Some("hours")), "2024-03-15T06:00:00");
    assert_eq!(start_of(Some(1), Some("days")), "2024-03-14T12:00:00");
    assert_eq!(start_of(Some(2), Some("weeks")), "2024-03-01T12:00:00");
    assert_eq!(start_of(Some(1), Some("months")), "2024-02-14T12:00:00");
    assert_eq!(start_of(Some(1), Some("years")), "2023-03-16T12:00:00");
}

#[test]
fn test_unit_names_are_case_insensitive() {
    assert_eq!(start_of(Some(1), Some("DAYS")), "2024-03-14T12:00:00");
}

#[test]
fn test_unknown_or_missing_unit_is_seven_days() {
    assert_eq!(start_of(Some(3), Some("fortnights")), "2024-03-08T12:00:00");
    assert_eq!(start_of(Some(100), None), "2024-03-08T12:00:00");
}

#[test]
fn test_missing_count_is_empty_window() {
    assert_eq!(start_of(None, Some("days")), "2024-03-15T12:00:00");
}

#[test]
fn test_absolute_bounds() {
    let range = TimeRange::absolute(Some("2024-01-01"), Some("2024-01-31T23:59:59.250"));
    let bounds = resolve(&range, fixed_now()).unwrap();
    assert_eq!(
        bounds.start,
        NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    );
    assert_eq!(
        TimeBounds::format(bounds.end.unwrap()),
        "2024-01-31T23:59:59.250"
    );
}

#[test]
fn test_absolute_with_offset_is_normalized_to_utc() {
    let range = TimeRange::absolute(Some("2024-01-01T02:00:00+02:00"), None);
    let bounds = resolve(&range, fixed_now()).unwrap();
    assert_eq!(
        TimeBounds::format(bounds.start.unwrap()),
        "2024-01-01T00:00:00"
    );
    assert_eq!(bounds.end, None);
}

#[test]
fn test_open_sides_emit_one_predicate() {
    let base = ReportConfig::new("vehicles").select("vehicles", "vin");

    let query = compile(
        &base
            .clone()
            .within(TimeRange::absolute(Some("2024-02-01"), None), "record_added_at"),
    )
    .unwrap();
    assert!(query
        .sql
        .contains("\nWHERE vehicles.record_added_at >= $1\n"));
    assert_eq!(query.params, vec![json!("2024-02-01T00:00:00")]);

    let query = compile(
        &base
            .clone()
            .within(TimeRange::absolute(None, Some("2024-02-01")), "record_added_at"),
    )
    .unwrap();
    assert!(query
        .sql
        .contains("\nWHERE vehicles.record_added_at <= $1\n"));

    let query =
        compile(&base.within(TimeRange::absolute(Some(" "), None), "record_added_at")).unwrap();
    assert!(!query.sql.contains("WHERE"));
    assert!(query.params.is_empty());
}

#[test]
fn test_window_follows_filters() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vin")
        .filter(
            FilterCondition::new("vehicles", "manufacture_year", FilterOperator::GreaterThan)
                .with_value(2015),
        )
        .within(TimeRange::relative(7, "days"), "record_added_at");

    let query = compile(&config).unwrap();
    assert!(query.sql.contains(
        "WHERE vehicles.manufacture_year > $1 \
         AND vehicles.record_added_at >= $2 \
         AND vehicles.record_added_at <= $3"
    ));
    assert_eq!(
        query.params,
        vec![
            json!(2015),
            json!("2024-03-08T12:00:00"),
            json!("2024-03-15T12:00:00")
        ]
    );
    assert_placeholders_aligned(&query.sql, &query.params);
    validate_sql(&query.sql).unwrap();
}

#[test]
fn test_window_on_joined_entity_adds_join() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vin")
        .within_entity(TimeRange::relative(1, "days"), "objects", "create_datetime");

    let query = compile(&config).unwrap();
    assert!(query
        .sql
        .contains("LEFT JOIN raw_business_data.objects ON vehicles.object_id = objects.object_id"));
    assert!(query.sql.contains("objects.create_datetime >= $1"));
}

#[test]
fn test_window_requires_field() {
    let mut config = ReportConfig::new("vehicles").select("vehicles", "vin");
    config.time_range = Some(TimeRange::relative(7, "days"));

    let query = compile(&config).unwrap();
    assert!(!query.sql.contains("WHERE"));
}

#[test]
fn test_unparseable_bound_rejected() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vin")
        .within(TimeRange::absolute(Some("last tuesday"), None), "record_added_at");

    let err = compile(&config).unwrap_err();
    assert!(matches!(err, CompileError::InvalidTimeRange(_)));
}
