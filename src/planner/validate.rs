//! Advisory checks against catalog flags.
//!
//! None of these block compilation; they surface choices the catalog does
//! not offer, such as sorting on a field not marked sortable.

use std::fmt;

use serde::Serialize;

use crate::catalog::{AggregationKind, EntityRegistry};
use crate::report::ReportConfig;

/// Result of validating a report: the preview SQL and any warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub sql: String,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    AggregationNotPermitted {
        entity: String,
        field: String,
        aggregation: AggregationKind,
    },
    /// Compiled as the bare field.
    UnrecognizedAggregation {
        entity: String,
        field: String,
        aggregation: AggregationKind,
    },
    NotFilterable { entity: String, field: String },
    NotSortable { entity: String, field: String },
    /// The time window compares against a column that holds no dates.
    TimeFieldNotTemporal { entity: String, field: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::AggregationNotPermitted {
                entity,
                field,
                aggregation,
            } => write!(f, "{entity}.{field} does not offer aggregation '{aggregation}'"),
            ValidationWarning::UnrecognizedAggregation {
                entity,
                field,
                aggregation,
            } => write!(
                f,
                "unknown aggregation '{aggregation}' on {entity}.{field} is ignored"
            ),
            ValidationWarning::NotFilterable { entity, field } => {
                write!(f, "{entity}.{field} is not filterable")
            }
            ValidationWarning::NotSortable { entity, field } => {
                write!(f, "{entity}.{field} is not sortable")
            }
            ValidationWarning::TimeFieldNotTemporal { entity, field } => {
                write!(f, "{entity}.{field} is not a date or datetime field")
            }
        }
    }
}

/// Collect warnings for references that resolve. Unresolved references are
/// the compiler's concern, not this function's.
pub(crate) fn collect_warnings(
    registry: &EntityRegistry,
    config: &ReportConfig,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for selected in &config.selected_fields {
        let (Some(kind), Some((entity, field))) = (
            selected.aggregation.as_ref(),
            registry.field(&selected.entity_id, &selected.field_id),
        ) else {
            continue;
        };
        if !kind.is_known() {
            warnings.push(ValidationWarning::UnrecognizedAggregation {
                entity: entity.id.clone(),
                field: field.id.clone(),
                aggregation: kind.clone(),
            });
        } else if !field.permits(kind) {
            warnings.push(ValidationWarning::AggregationNotPermitted {
                entity: entity.id.clone(),
                field: field.id.clone(),
                aggregation: kind.clone(),
            });
        }
    }

    for condition in &config.filters {
        if let Some((entity, field)) = registry.field(&condition.entity_id, &condition.field_id) {
            if !field.filterable {
                warnings.push(ValidationWarning::NotFilterable {
                    entity: entity.id.clone(),
                    field: field.id.clone(),
                });
            }
        }
    }

    for sort in &config.sorting {
        if let Some((entity, field)) = registry.field(&sort.entity_id, &sort.field_id) {
            if !field.sortable {
                warnings.push(ValidationWarning::NotSortable {
                    entity: entity.id.clone(),
                    field: field.id.clone(),
                });
            }
        }
    }

    if let (Some(_), Some(field_id)) = (&config.time_range, &config.time_field) {
        let entity_id = config
            .time_field_entity
            .as_deref()
            .unwrap_or(&config.primary_entity);
        if let Some((entity, field)) = registry.field(entity_id, field_id) {
            if !field.field_type.is_temporal() {
                warnings.push(ValidationWarning::TimeFieldNotTemporal {
                    entity: entity.id.clone(),
                    field: field.id.clone(),
                });
            }
        }
    }

    warnings
}
