//! Query assembly: the single entry point that turns a [`ReportConfig`]
//! into SQL text and its parameter array.
//!
//! Clauses are emitted in a fixed order (SELECT, FROM, JOIN*, WHERE,
//! GROUP BY, ORDER BY, LIMIT), one per line. Every table alias is the
//! entity's table name.

use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::{CompileError, CompileResult};
use super::ident::{check_identifier, qualify};
use super::join_path::JoinPathResolver;
use super::params::ParamSink;
use super::validate::{collect_warnings, ValidationReport};
use super::{aggregate, filter, preview, time_range};
use super::{CompileOptions, GroupByPolicy, MAX_LIMIT};
use crate::catalog::{AggregationKind, Entity, EntityRegistry, Field, FieldType};
use crate::report::{ReportConfig, SelectedField};

/// Compiled SQL with its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// `params[i]` binds to `$(i + 1)`.
    pub params: Vec<Value>,
    /// One entry per SELECT item, in order.
    pub columns: Vec<OutputColumn>,
}

/// Metadata for one SELECT item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputColumn {
    /// SQL output alias.
    pub name: String,
    pub display_name: String,
    pub field_type: FieldType,
    pub entity_id: String,
    pub field_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationKind>,
}

/// Compile a report against the built-in catalog.
pub fn compile_report(
    config: &ReportConfig,
    options: CompileOptions,
) -> CompileResult<CompiledQuery> {
    ReportCompiler::new(EntityRegistry::builtin(), options).compile(config)
}

/// Compiles report configurations against a registry.
///
/// Holds only shared references, so one compiler can serve any number of
/// concurrent callers.
#[derive(Debug, Clone, Copy)]
pub struct ReportCompiler<'a> {
    registry: &'a EntityRegistry,
    options: CompileOptions,
}

impl<'a> ReportCompiler<'a> {
    pub fn new(registry: &'a EntityRegistry, options: CompileOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &'a EntityRegistry {
        self.registry
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compile with relative time windows ending at the current UTC time.
    pub fn compile(&self, config: &ReportConfig) -> CompileResult<CompiledQuery> {
        self.compile_at(config, Utc::now().naive_utc())
    }

    /// Compile with relative time windows ending at `now`.
    pub fn compile_at(
        &self,
        config: &ReportConfig,
        now: NaiveDateTime,
    ) -> CompileResult<CompiledQuery> {
        let primary = self
            .registry
            .lookup(&config.primary_entity)
            .ok_or_else(|| CompileError::UnknownEntity(config.primary_entity.clone()))?;
        if config.selected_fields.is_empty() {
            return Err(CompileError::NoFields);
        }

        let required = self.required_entities(primary, config)?;
        let mut params = ParamSink::new();

        let (select, columns, group_by) = self.build_select(config)?;
        let from = qualify(&primary.schema_name, &primary.table_name)?;
        let joins = self.build_joins(primary, &required)?;
        let mut predicates = self.build_filters(config, &mut params)?;
        predicates.extend(self.build_time_window(config, now, &mut params)?);
        let order_by = self.build_order_by(config)?;

        let mut lines = Vec::with_capacity(joins.len() + 5);
        lines.push(format!("SELECT {}", select.join(", ")));
        lines.push(format!("FROM {from}"));
        lines.extend(joins);
        if !predicates.is_empty() {
            lines.push(format!("WHERE {}", predicates.join(" AND ")));
        }
        if !group_by.is_empty() {
            lines.push(format!("GROUP BY {}", group_by.join(", ")));
        }
        if !order_by.is_empty() {
            lines.push(format!("ORDER BY {}", order_by.join(", ")));
        }
        lines.push(format!("LIMIT {}", config.limit.min(MAX_LIMIT)));

        debug!(
            primary = %primary.id,
            entities = required.len(),
            params = params.len(),
            "compiled report"
        );

        Ok(CompiledQuery {
            sql: lines.join("\n"),
            params: params.into_values(),
            columns,
        })
    }

    /// Compiled SQL with parameters inlined, for display only.
    pub fn preview(&self, config: &ReportConfig) -> CompileResult<String> {
        let query = self.compile(config)?;
        Ok(preview::render(&query.sql, &query.params))
    }

    /// Compile, then report advisory warnings alongside the preview SQL.
    pub fn validate(&self, config: &ReportConfig) -> CompileResult<ValidationReport> {
        let query = self.compile(config)?;
        Ok(ValidationReport {
            sql: preview::render(&query.sql, &query.params),
            warnings: collect_warnings(self.registry, config),
        })
    }

    /// Resolve an (entity, field) reference.
    fn field(&self, entity_id: &str, field_id: &str) -> CompileResult<(&'a Entity, &'a Field)> {
        let entity = self
            .registry
            .lookup(entity_id)
            .ok_or_else(|| CompileError::UnknownEntity(entity_id.to_string()))?;
        let field = entity
            .field(field_id)
            .ok_or_else(|| CompileError::unknown_field(entity_id, field_id))?;
        Ok((entity, field))
    }

    /// Every entity the configuration touches, in first-reference order.
    ///
    /// Also rejects any reference that does not resolve.
    fn required_entities(
        &self,
        primary: &'a Entity,
        config: &ReportConfig,
    ) -> CompileResult<Vec<&'a Entity>> {
        let time_scope = config
            .time_scope()
            .map(|(_, scope)| (scope.entity_id, scope.field_id));

        let references = config
            .selected_fields
            .iter()
            .map(|f| (f.entity_id.as_str(), f.field_id.as_str()))
            .chain(
                config
                    .filters
                    .iter()
                    .map(|f| (f.entity_id.as_str(), f.field_id.as_str())),
            )
            .chain(
                config
                    .sorting
                    .iter()
                    .map(|s| (s.entity_id.as_str(), s.field_id.as_str())),
            )
            .chain(time_scope.as_ref().map(|(e, f)| (e.as_str(), f.as_str())));

        let mut required = vec![primary];
        for (entity_id, field_id) in references {
            let (entity, _) = self.field(entity_id, field_id)?;
            if !required.iter().any(|e| e.id == entity.id) {
                required.push(entity);
            }
        }
        Ok(required)
    }

    fn build_select(
        &self,
        config: &ReportConfig,
    ) -> CompileResult<(Vec<String>, Vec<OutputColumn>, Vec<String>)> {
        let aggregating = config.selected_fields.iter().any(SelectedField::is_aggregated);
        let mut select = Vec::with_capacity(config.selected_fields.len());
        let mut columns = Vec::with_capacity(config.selected_fields.len());
        let mut group_by: Vec<String> = Vec::new();

        for selected in &config.selected_fields {
            let (entity, field) = self.field(&selected.entity_id, &selected.field_id)?;
            let column = qualify(&entity.table_name, field.column_name())?;
            let aggregation = selected.known_aggregation();

            let alias = match aggregation {
                Some(kind) => format!("{}_{}_{}", kind.as_str(), entity.id, field.id),
                None => format!("{}_{}", entity.id, field.id),
            };
            check_identifier(&alias)?;

            if aggregating && aggregation.is_none() {
                match self.options.group_by {
                    GroupByPolicy::Explicit => {
                        if config.is_grouped(selected) {
                            group_by.push(column.clone());
                        }
                    }
                    GroupByPolicy::AllPlain => {
                        if !group_by.contains(&column) {
                            group_by.push(column.clone());
                        }
                    }
                }
            }

            select.push(format!("{} AS {alias}", aggregate::wrap(&column, aggregation)));
            columns.push(OutputColumn {
                name: alias,
                display_name: selected
                    .alias
                    .clone()
                    .unwrap_or_else(|| field.display_name().to_string()),
                field_type: field.field_type,
                entity_id: entity.id.clone(),
                field_id: field.id.clone(),
                aggregation: aggregation.cloned(),
            });
        }

        Ok((select, columns, group_by))
    }

    fn build_joins(&self, primary: &Entity, required: &[&Entity]) -> CompileResult<Vec<String>> {
        let resolver = JoinPathResolver::new(self.registry, self.options.join_strategy);
        let mut joined: HashSet<&str> = HashSet::from([primary.id.as_str()]);
        let mut clauses = Vec::new();

        for target in required.iter().filter(|e| e.id != primary.id) {
            let path = resolver.resolve(&primary.id, &target.id)?;
            for step in path {
                if joined.contains(step.to_entity.as_str()) {
                    continue;
                }
                let from = self
                    .registry
                    .lookup(&step.from_entity)
                    .ok_or_else(|| CompileError::UnknownEntity(step.from_entity.clone()))?;
                let to = self
                    .registry
                    .lookup(&step.to_entity)
                    .ok_or_else(|| CompileError::UnknownEntity(step.to_entity.clone()))?;

                let table = qualify(&to.schema_name, &to.table_name)?;
                let left = qualify(&from.table_name, &from.column_for(&step.from_field))?;
                let right = qualify(&to.table_name, &to.column_for(&step.to_field))?;
                clauses.push(format!(
                    "{} JOIN {table} ON {left} = {right}",
                    step.join.keyword()
                ));
                joined.insert(to.id.as_str());
            }
        }

        Ok(clauses)
    }

    fn build_filters(
        &self,
        config: &ReportConfig,
        params: &mut ParamSink,
    ) -> CompileResult<Vec<String>> {
        config
            .filters
            .iter()
            .map(|condition| {
                let (entity, field) = self.field(&condition.entity_id, &condition.field_id)?;
                filter::compile(field, &entity.table_name, condition, params)
            })
            .collect()
    }

    fn build_time_window(
        &self,
        config: &ReportConfig,
        now: NaiveDateTime,
        params: &mut ParamSink,
    ) -> CompileResult<Vec<String>> {
        let Some((range, scope)) = config.time_scope() else {
            return Ok(Vec::new());
        };
        let (entity, field) = self.field(&scope.entity_id, &scope.field_id)?;
        let column = qualify(&entity.table_name, field.column_name())?;
        let bounds = time_range::resolve(range, now)?;

        let mut predicates = Vec::with_capacity(2);
        if let Some(start) = bounds.start {
            let placeholder = params.bind(time_range::TimeBounds::format(start));
            predicates.push(format!("{column} >= {placeholder}"));
        }
        if let Some(end) = bounds.end {
            let placeholder = params.bind(time_range::TimeBounds::format(end));
            predicates.push(format!("{column} <= {placeholder}"));
        }
        Ok(predicates)
    }

    fn build_order_by(&self, config: &ReportConfig) -> CompileResult<Vec<String>> {
        config
            .sorting
            .iter()
            .map(|sort| {
                let (entity, field) = self.field(&sort.entity_id, &sort.field_id)?;
                let column = qualify(&entity.table_name, field.column_name())?;
                Ok(format!("{column} {}", sort.direction.keyword()))
            })
            .collect()
    }
}
