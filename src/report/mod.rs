//! Report configuration: what a caller asks the compiler for.
//!
//! A [`ReportConfig`] names a primary entity, the fields to project, filters,
//! sort order, an optional time window and a row limit. It is the snake_case
//! internal form; [`ReportRequest`] is the camelCase form received from
//! HTTP clients and converts into it.

mod request;

pub use request::{ReportRequest, RequestError, RequestResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::AggregationKind;

/// Default row limit when a configuration does not name one.
pub const DEFAULT_LIMIT: u64 = 1000;

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

/// Reference to a field on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub entity_id: String,
    pub field_id: String,
}

impl FieldRef {
    pub fn new(entity_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            field_id: field_id.into(),
        }
    }
}

/// A projected field, optionally aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedField {
    pub entity_id: String,
    pub field_id: String,
    /// Display label. Does not affect the SQL output alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationKind>,
}

impl SelectedField {
    pub fn new(entity_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            field_id: field_id.into(),
            alias: None,
            aggregation: None,
        }
    }

    pub fn aggregated(mut self, kind: AggregationKind) -> Self {
        self.aggregation = Some(kind);
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The aggregation, if it is one the compiler can emit.
    pub fn known_aggregation(&self) -> Option<&AggregationKind> {
        self.aggregation.as_ref().filter(|kind| kind.is_known())
    }

    pub fn is_aggregated(&self) -> bool {
        self.known_aggregation().is_some()
    }

    pub fn refers_to(&self, field: &FieldRef) -> bool {
        self.entity_id == field.entity_id && self.field_id == field.field_id
    }
}

/// Comparison applied by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// One WHERE condition on an (entity, field) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Client-side identifier; ignored by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub entity_id: String,
    pub field_id: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Upper bound for `between`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

impl FilterCondition {
    pub fn new(
        entity_id: impl Into<String>,
        field_id: impl Into<String>,
        operator: FilterOperator,
    ) -> Self {
        Self {
            id: None,
            entity_id: entity_id.into(),
            field_id: field_id.into(),
            operator,
            value: None,
            value2: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_range(mut self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.value = Some(low.into());
        self.value2 = Some(high.into());
        self
    }
}

/// Sort direction. Only a case-insensitive "desc" selects descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl From<String> for SortDirection {
    fn from(name: String) -> Self {
        SortDirection::parse(&name)
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub entity_id: String,
    pub field_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(
        entity_id: impl Into<String>,
        field_id: impl Into<String>,
        direction: SortDirection,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            field_id: field_id.into(),
            direction,
        }
    }
}

/// Unit of a relative time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeUnit {
    /// Parse a unit name; `None` for anything unrecognized.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            "weeks" => Some(TimeUnit::Weeks),
            "months" => Some(TimeUnit::Months),
            "years" => Some(TimeUnit::Years),
            _ => None,
        }
    }
}

/// Time window applied to the report's time-scope field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeRange {
    /// The last `value` `unit`s up to now.
    Relative {
        #[serde(default)]
        value: Option<i64>,
        /// Kept as text so unrecognized units can fall back to a default window.
        #[serde(default)]
        unit: Option<String>,
    },
    /// Fixed bounds; either side may be open.
    Absolute {
        #[serde(default)]
        start: Option<String>,
        #[serde(default)]
        end: Option<String>,
    },
}

impl TimeRange {
    pub fn relative(value: i64, unit: &str) -> Self {
        TimeRange::Relative {
            value: Some(value),
            unit: Some(unit.into()),
        }
    }

    pub fn absolute(start: Option<&str>, end: Option<&str>) -> Self {
        TimeRange::Absolute {
            start: start.map(Into::into),
            end: end.map(Into::into),
        }
    }
}

/// A complete report definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub primary_entity: String,
    pub selected_fields: Vec<SelectedField>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Field the time window applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,
    /// Entity owning `time_field`; defaults to the primary entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field_entity: Option<String>,
    /// Fields echoed into GROUP BY when the report aggregates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<FieldRef>>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl ReportConfig {
    /// Start a report on a primary entity with nothing selected.
    pub fn new(primary_entity: impl Into<String>) -> Self {
        Self {
            name: None,
            description: None,
            primary_entity: primary_entity.into(),
            selected_fields: Vec::new(),
            filters: Vec::new(),
            sorting: Vec::new(),
            time_range: None,
            time_field: None,
            time_field_entity: None,
            group_by: None,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn select(mut self, entity_id: &str, field_id: &str) -> Self {
        self.selected_fields.push(SelectedField::new(entity_id, field_id));
        self
    }

    pub fn select_field(mut self, field: SelectedField) -> Self {
        self.selected_fields.push(field);
        self
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn sort(mut self, entity_id: &str, field_id: &str, direction: SortDirection) -> Self {
        self.sorting.push(SortSpec::new(entity_id, field_id, direction));
        self
    }

    /// Apply a time window to a field of the primary entity.
    pub fn within(mut self, range: TimeRange, field_id: &str) -> Self {
        self.time_range = Some(range);
        self.time_field = Some(field_id.into());
        self
    }

    /// Apply a time window to a field of another entity.
    pub fn within_entity(mut self, range: TimeRange, entity_id: &str, field_id: &str) -> Self {
        self.time_range = Some(range);
        self.time_field = Some(field_id.into());
        self.time_field_entity = Some(entity_id.into());
        self
    }

    pub fn group_by(mut self, entity_id: &str, field_id: &str) -> Self {
        self.group_by
            .get_or_insert_with(Vec::new)
            .push(FieldRef::new(entity_id, field_id));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Does the explicit group-by list contain this selected field?
    pub fn is_grouped(&self, field: &SelectedField) -> bool {
        self.group_by
            .as_ref()
            .is_some_and(|group| group.iter().any(|g| field.refers_to(g)))
    }

    /// The time window and its scope, when both are set.
    ///
    /// The scope entity defaults to the primary entity.
    pub fn time_scope(&self) -> Option<(&TimeRange, FieldRef)> {
        let range = self.time_range.as_ref()?;
        let field = self.time_field.as_ref()?;
        let entity = self
            .time_field_entity
            .as_deref()
            .unwrap_or(&self.primary_entity);
        Some((range, FieldRef::new(entity, field.as_str())))
    }
}
