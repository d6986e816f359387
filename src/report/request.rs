//! The camelCase report request received at the HTTP boundary.
//!
//! Clients send field references as `{entityId, fieldId}` objects and the
//! time-scope field as `"entity::field"`. [`ReportRequest::into_config`]
//! validates the request and converts it into a [`ReportConfig`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{
    FieldRef, FilterCondition, FilterOperator, ReportConfig, SelectedField, SortDirection,
    SortSpec, TimeRange, DEFAULT_LIMIT,
};
use crate::catalog::AggregationKind;
use crate::planner::is_valid_identifier;

/// Longest report name accepted, after trimming.
pub const MAX_NAME_LEN: usize = 200;

/// Largest row limit a client may request.
pub const MAX_REQUEST_LIMIT: u64 = 10_000;

/// Separator between entity and field in `timeField`.
const TIME_FIELD_SEPARATOR: &str = "::";

/// Errors raised while validating a boundary request.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Name too long (max {max} chars)", max = MAX_NAME_LEN)]
    NameTooLong,

    #[error("Limit must be between 1 and {max}, got {0}", max = MAX_REQUEST_LIMIT)]
    LimitOutOfRange(u64),

    #[error("Invalid entity name: {0}")]
    InvalidPrimaryEntity(String),
}

pub type RequestResult<T> = Result<T, RequestError>;

fn default_name() -> String {
    "New Report".to_string()
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_operator() -> FilterOperator {
    FilterOperator::Equals
}

fn default_time_range_type() -> String {
    "relative".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestField {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub field_id: String,
    #[serde(default = "default_operator")]
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSort {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub field_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTimeRange {
    #[serde(rename = "type", default = "default_time_range_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl RequestTimeRange {
    fn into_range(self) -> TimeRange {
        if self.kind == "absolute" {
            TimeRange::Absolute {
                start: self.start_date,
                end: self.end_date,
            }
        } else {
            TimeRange::Relative {
                value: self.relative_value,
                unit: self.relative_unit,
            }
        }
    }
}

/// Report configuration as sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub primary_entity: String,
    pub selected_fields: Vec<RequestField>,
    #[serde(default)]
    pub filters: Vec<RequestFilter>,
    #[serde(default)]
    pub sorting: Vec<RequestSort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<RequestTimeRange>,
    /// `"entity::field"` or a bare field of the primary entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<RequestField>>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl ReportRequest {
    /// Check the request's boundary constraints without converting it.
    pub fn validate(&self) -> RequestResult<()> {
        if self.name.trim().chars().count() > MAX_NAME_LEN {
            return Err(RequestError::NameTooLong);
        }
        if !(1..=MAX_REQUEST_LIMIT).contains(&self.limit) {
            return Err(RequestError::LimitOutOfRange(self.limit));
        }
        if !is_valid_identifier(&self.primary_entity) {
            return Err(RequestError::InvalidPrimaryEntity(self.primary_entity.clone()));
        }
        Ok(())
    }

    /// Validate and convert into the internal configuration.
    pub fn into_config(self) -> RequestResult<ReportConfig> {
        self.validate()?;

        let selected_fields = self
            .selected_fields
            .into_iter()
            .map(|f| SelectedField {
                entity_id: f.entity_id,
                field_id: f.field_id,
                alias: f.alias,
                aggregation: f.aggregation,
            })
            .collect();

        let filters = self
            .filters
            .into_iter()
            .map(|f| FilterCondition {
                id: f.id,
                entity_id: f.entity_id,
                field_id: f.field_id,
                operator: f.operator,
                value: f.value,
                value2: f.value2,
            })
            .collect();

        let sorting = self
            .sorting
            .into_iter()
            .map(|s| SortSpec::new(s.entity_id, s.field_id, s.direction))
            .collect();

        let group_by = self.group_by.map(|group| {
            group
                .into_iter()
                .map(|g| FieldRef::new(g.entity_id, g.field_id))
                .collect()
        });

        let (time_field_entity, time_field) = match self.time_field {
            Some(raw) => match raw.split_once(TIME_FIELD_SEPARATOR) {
                Some((entity, field)) => (Some(entity.to_string()), Some(field.to_string())),
                None => (None, Some(raw.clone())),
            },
            None => (None, None),
        };

        Ok(ReportConfig {
            name: Some(self.name.trim().to_string()),
            description: self.description,
            primary_entity: self.primary_entity,
            selected_fields,
            filters,
            sorting,
            time_range: self.time_range.map(RequestTimeRange::into_range),
            time_field,
            time_field_entity,
            group_by,
            limit: self.limit,
        })
    }
}
