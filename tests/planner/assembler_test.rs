//! End-to-end compilation against the built-in telematics catalog.

#[path = "../common/mod.rs"]
mod common;

use common::{assert_placeholders_aligned, clause_heads, fixed_now, validate_sql};
use insta::assert_snapshot;
use quarry::catalog::{AggregationKind, EntityRegistry};
use quarry::planner::{
    CompileError, CompileOptions, CompiledQuery, ErrorKind, GroupByPolicy, JoinStrategy,
    ReportCompiler,
};
use quarry::report::{
    FilterCondition, FilterOperator, ReportConfig, SelectedField, SortDirection, TimeRange,
};
use serde_json::json;

fn compile(config: &ReportConfig) -> Result<CompiledQuery, CompileError> {
    ReportCompiler::new(EntityRegistry::builtin(), CompileOptions::default())
        .compile_at(config, fixed_now())
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_two_hop_join_through_objects() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .select("devices", "device_imei");

    let query = compile(&config).unwrap();
    assert_snapshot!(&query.sql, @r"
    SELECT vehicles.vehicle_label AS vehicles_vehicle_label, devices.device_imei AS devices_device_imei
    FROM raw_business_data.vehicles
    LEFT JOIN raw_business_data.objects ON vehicles.object_id = objects.object_id
    LEFT JOIN raw_business_data.devices ON objects.device_id = devices.device_id
    LIMIT 1000
    ");
    assert!(query.params.is_empty());
    validate_sql(&query.sql).unwrap();
}

#[test]
fn test_filter_on_joined_entity() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .filter(
            FilterCondition::new("objects", "is_deleted", FilterOperator::Equals)
                .with_value(false),
        );

    let query = compile(&config).unwrap();
    assert_snapshot!(&query.sql, @r"
    SELECT vehicles.vehicle_label AS vehicles_vehicle_label
    FROM raw_business_data.vehicles
    LEFT JOIN raw_business_data.objects ON vehicles.object_id = objects.object_id
    WHERE objects.is_deleted = $1
    LIMIT 1000
    ");
    assert_eq!(query.params, vec![json!(false)]);
}

#[test]
fn test_relative_window_on_primary_timestamp() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .within(TimeRange::relative(7, "days"), "record_added_at");

    let query = compile(&config).unwrap();
    assert_snapshot!(&query.sql, @r"
    SELECT vehicles.vehicle_label AS vehicles_vehicle_label
    FROM raw_business_data.vehicles
    WHERE vehicles.record_added_at >= $1 AND vehicles.record_added_at <= $2
    LIMIT 1000
    ");
    assert_eq!(
        query.params,
        vec![json!("2024-03-08T12:00:00"), json!("2024-03-15T12:00:00")]
    );
}

#[test]
fn test_aggregate_without_group_by_list_emits_no_group_by() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "model")
        .select_field(SelectedField::new("vehicles", "max_speed").aggregated(AggregationKind::Max));

    let query = compile(&config).unwrap();
    assert_snapshot!(&query.sql, @r"
    SELECT vehicles.model AS vehicles_model, MAX(vehicles.max_speed) AS max_vehicles_max_speed
    FROM raw_business_data.vehicles
    LIMIT 1000
    ");
}

#[test]
fn test_explicit_group_by_list() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "model")
        .select("vehicles", "fuel_type")
        .select_field(SelectedField::new("vehicles", "max_speed").aggregated(AggregationKind::Avg))
        .group_by("vehicles", "model");

    let query = compile(&config).unwrap();
    assert!(query.sql.contains("\nGROUP BY vehicles.model\n"));
    assert!(!query.sql.contains("GROUP BY vehicles.model, "));
    validate_sql(&query.sql).unwrap();
}

#[test]
fn test_all_plain_policy_groups_every_plain_field() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "model")
        .select("vehicles", "fuel_type")
        .select_field(SelectedField::new("vehicles", "max_speed").aggregated(AggregationKind::Avg));

    let options = CompileOptions::default().with_group_by(GroupByPolicy::AllPlain);
    let query = ReportCompiler::new(EntityRegistry::builtin(), options)
        .compile_at(&config, fixed_now())
        .unwrap();
    assert!(query
        .sql
        .contains("\nGROUP BY vehicles.model, vehicles.fuel_type\n"));
}

#[test]
fn test_full_report() {
    let config = ReportConfig::new("tracking_data_core")
        .select("devices", "device_imei")
        .select_field(
            SelectedField::new("tracking_data_core", "speed").aggregated(AggregationKind::Avg),
        )
        .select_field(
            SelectedField::new("tracking_data_core", "event_id")
                .aggregated(AggregationKind::CountDistinct),
        )
        .filter(
            FilterCondition::new("tracking_data_core", "speed", FilterOperator::Between)
                .with_range(10, 120),
        )
        .filter(
            FilterCondition::new("devices", "device_imei", FilterOperator::In)
                .with_value(json!(["356000000000001", "356000000000002"])),
        )
        .within(
            TimeRange::absolute(Some("2024-01-01"), Some("2024-01-31T23:59:59")),
            "device_time",
        )
        .group_by("devices", "device_imei")
        .sort("devices", "device_imei", SortDirection::Desc)
        .limit(250);

    let query = compile(&config).unwrap();
    assert_snapshot!(&query.sql, @r"
    SELECT devices.device_imei AS devices_device_imei, AVG(tracking_data_core.speed) AS avg_tracking_data_core_speed, COUNT(DISTINCT tracking_data_core.event_id) AS count_distinct_tracking_data_core_event_id
    FROM raw_telematics_data.tracking_data_core
    INNER JOIN raw_business_data.devices ON tracking_data_core.device_id = devices.device_id
    WHERE tracking_data_core.speed BETWEEN $1 AND $2 AND devices.device_imei IN ($3, $4) AND tracking_data_core.device_time >= $5 AND tracking_data_core.device_time <= $6
    GROUP BY devices.device_imei
    ORDER BY devices.device_imei DESC
    LIMIT 250
    ");
    assert_eq!(
        query.params,
        vec![
            json!(10),
            json!(120),
            json!("356000000000001"),
            json!("356000000000002"),
            json!("2024-01-01T00:00:00"),
            json!("2024-01-31T23:59:59"),
        ]
    );
    assert_placeholders_aligned(&query.sql, &query.params);
    validate_sql(&query.sql).unwrap();
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_clause_order_is_fixed() {
    let config = ReportConfig::new("employees")
        .select("employees", "last_name")
        .select("departments", "department_label")
        .select_field(
            SelectedField::new("employees", "employee_id").aggregated(AggregationKind::Count),
        )
        .filter(
            FilterCondition::new("employees", "last_name", FilterOperator::StartsWith)
                .with_value("Mc"),
        )
        .group_by("employees", "last_name")
        .group_by("departments", "department_label")
        .sort("employees", "last_name", SortDirection::Asc);

    let query = compile(&config).unwrap();
    assert_eq!(
        clause_heads(&query.sql),
        vec!["SELECT", "FROM", "JOIN", "WHERE", "GROUP BY", "ORDER BY", "LIMIT"]
    );
    assert_eq!(query.sql.matches("SELECT").count(), 1);
    assert_eq!(query.sql.matches("\nLIMIT ").count(), 1);
    validate_sql(&query.sql).unwrap();
}

#[test]
fn test_compilation_is_deterministic() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .select("employees", "email")
        .select("tracking_data_core", "speed")
        .filter(
            FilterCondition::new("objects", "object_label", FilterOperator::Contains)
                .with_value("van"),
        )
        .within(TimeRange::relative(3, "months"), "record_added_at");

    let first = compile(&config).unwrap();
    let second = compile(&config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_limit_clamped() {
    let config = ReportConfig::new("vehicles").select("vehicles", "vin");

    let query = compile(&config.clone().limit(999_999)).unwrap();
    assert!(query.sql.ends_with("\nLIMIT 10000"));

    let query = compile(&config.limit(5)).unwrap();
    assert!(query.sql.ends_with("\nLIMIT 5"));
}

#[test]
fn test_directly_related_entity_yields_one_join() {
    let config = ReportConfig::new("employees")
        .select("employees", "email")
        .select("departments", "department_label");

    let query = compile(&config).unwrap();
    assert_eq!(query.sql.matches(" JOIN ").count(), 1);
    assert!(query.sql.contains(
        "LEFT JOIN raw_business_data.departments \
         ON employees.department_id = departments.department_id"
    ));
}

#[test]
fn test_shared_prefix_is_joined_once() {
    let config = ReportConfig::new("vehicles")
        .select("objects", "object_label")
        .select("devices", "device_imei")
        .select("employees", "email");

    let query = compile(&config).unwrap();
    assert_eq!(query.sql.matches("JOIN raw_business_data.objects").count(), 1);
    assert_eq!(query.sql.matches(" JOIN ").count(), 3);
}

#[test]
fn test_path_to_departments_under_both_strategies() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vin")
        .select("departments", "department_label");

    for strategy in [JoinStrategy::Priority, JoinStrategy::ShortestPath] {
        let options = CompileOptions::default().with_join_strategy(strategy);
        let query = ReportCompiler::new(EntityRegistry::builtin(), options)
            .compile_at(&config, fixed_now())
            .unwrap();
        let joined: Vec<&str> = query
            .sql
            .lines()
            .filter(|l| l.contains(" JOIN "))
            .map(|l| l.split_whitespace().nth(2).unwrap())
            .collect();
        assert_eq!(
            joined,
            vec![
                "raw_business_data.objects",
                "raw_business_data.employees",
                "raw_business_data.departments"
            ],
            "{strategy:?}"
        );
    }
}

#[test]
fn test_output_columns() {
    let config = ReportConfig::new("vehicles")
        .select_field(SelectedField::new("vehicles", "vehicle_label").with_alias("Name"))
        .select_field(SelectedField::new("vehicles", "max_speed").aggregated(AggregationKind::Max));

    let query = compile(&config).unwrap();
    let names: Vec<&str> = query.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["vehicles_vehicle_label", "max_vehicles_max_speed"]);
    assert_eq!(query.columns[0].display_name, "Name");
    assert_eq!(query.columns[1].display_name, "Max Speed (km/h)");
    assert_eq!(query.columns[1].aggregation, Some(AggregationKind::Max));
}

#[test]
fn test_unrecognized_aggregation_selects_bare_field() {
    let config = ReportConfig::new("vehicles")
        .select_field(
            SelectedField::new("vehicles", "max_speed")
                .aggregated(AggregationKind::parse("median")),
        );

    let query = compile(&config).unwrap();
    assert!(query
        .sql
        .starts_with("SELECT vehicles.max_speed AS vehicles_max_speed\n"));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unreachable_entity_is_join_path_error() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vin")
        .select("tags", "tag_label");

    let err = compile(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::JoinPath);
    assert_eq!(
        err.to_string(),
        "Cannot join entity 'tags' to primary entity 'vehicles'. No relationship path found."
    );
}

#[test]
fn test_configuration_errors() {
    let err = compile(&ReportConfig::new("trucks").select("trucks", "id")).unwrap_err();
    assert_eq!(err, CompileError::UnknownEntity("trucks".into()));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = compile(&ReportConfig::new("vehicles")).unwrap_err();
    assert_eq!(err, CompileError::NoFields);

    let err = compile(
        &ReportConfig::new("vehicles")
            .select("vehicles", "vin")
            .filter(FilterCondition::new("vehicles", "colour", FilterOperator::IsNull)),
    )
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnknownField {
            entity: "vehicles".into(),
            field: "colour".into()
        }
    );

    let err = compile(
        &ReportConfig::new("vehicles")
            .select("vehicles", "vin")
            .within(TimeRange::relative(1, "days"), "no_such_column"),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnknownField { .. }));
}

#[test]
fn test_hostile_catalog_identifiers_rejected() {
    let catalog = r#"
version = "1"

[[entities]]
id = "evil"
schema_name = "public"
table_name = "evil; DROP TABLE users"

[[entities.fields]]
id = "name"
type = "string"
"#;
    let registry = EntityRegistry::from_toml_str(catalog).unwrap();
    let err = ReportCompiler::new(&registry, CompileOptions::default())
        .compile_at(&ReportConfig::new("evil").select("evil", "name"), fixed_now())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Identifier);
    assert_eq!(
        err,
        CompileError::InvalidIdentifier("evil; DROP TABLE users".into())
    );
}

#[test]
fn test_preview_inlines_values() {
    let config = ReportConfig::new("vehicles")
        .select("vehicles", "vehicle_label")
        .filter(
            FilterCondition::new("vehicles", "vehicle_label", FilterOperator::Equals)
                .with_value("O'Brien's van"),
        )
        .filter(
            FilterCondition::new("objects", "is_deleted", FilterOperator::Equals)
                .with_value(false),
        );

    let sql = ReportCompiler::new(EntityRegistry::builtin(), CompileOptions::default())
        .preview(&config)
        .unwrap();
    assert!(sql.contains(
        "WHERE vehicles.vehicle_label = 'O''Brien''s van' AND objects.is_deleted = false"
    ));
    assert!(!sql.contains('$'));
}
