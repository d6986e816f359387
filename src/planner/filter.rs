//! Filter compilation: one condition to one parameterized predicate.
//!
//! Values never reach the SQL text. Each is appended to the [`ParamSink`]
//! and referenced by its positional placeholder.

use serde_json::Value;

use super::error::{CompileError, CompileResult};
use super::ident::qualify;
use super::params::ParamSink;
use crate::catalog::Field;
use crate::report::{FilterCondition, FilterOperator};

/// Compile a filter on `field`, read through `table_alias`.
pub fn compile(
    field: &Field,
    table_alias: &str,
    condition: &FilterCondition,
    params: &mut ParamSink,
) -> CompileResult<String> {
    let column = qualify(table_alias, field.column_name())?;
    let value = || condition.value.clone().unwrap_or(Value::Null);

    let predicate = match condition.operator {
        FilterOperator::IsNull => format!("{column} IS NULL"),
        FilterOperator::IsNotNull => format!("{column} IS NOT NULL"),
        FilterOperator::Equals => format!("{column} = {}", params.bind(value())),
        FilterOperator::NotEquals => format!("{column} != {}", params.bind(value())),
        FilterOperator::GreaterThan => format!("{column} > {}", params.bind(value())),
        FilterOperator::GreaterEqual => format!("{column} >= {}", params.bind(value())),
        FilterOperator::LessThan => format!("{column} < {}", params.bind(value())),
        FilterOperator::LessEqual => format!("{column} <= {}", params.bind(value())),
        FilterOperator::Contains => {
            let pattern = format!("%{}%", pattern_text(condition.value.as_ref()));
            format!("{column} ILIKE {}", params.bind(pattern))
        }
        FilterOperator::NotContains => {
            let pattern = format!("%{}%", pattern_text(condition.value.as_ref()));
            format!("{column} NOT ILIKE {}", params.bind(pattern))
        }
        FilterOperator::StartsWith => {
            let pattern = format!("{}%", pattern_text(condition.value.as_ref()));
            format!("{column} ILIKE {}", params.bind(pattern))
        }
        FilterOperator::EndsWith => {
            let pattern = format!("%{}", pattern_text(condition.value.as_ref()));
            format!("{column} ILIKE {}", params.bind(pattern))
        }
        FilterOperator::Between => {
            let high = condition
                .value2
                .clone()
                .ok_or_else(|| CompileError::MissingFilterValue {
                    field: field.id.clone(),
                })?;
            let low = params.bind(value());
            let high = params.bind(high);
            format!("{column} BETWEEN {low} AND {high}")
        }
        FilterOperator::In => membership(&column, field, condition, params, "IN", "=")?,
        FilterOperator::NotIn => membership(&column, field, condition, params, "NOT IN", "!=")?,
    };

    Ok(predicate)
}

/// `IN` / `NOT IN` with one placeholder per element.
///
/// A scalar value degrades to a plain comparison.
fn membership(
    column: &str,
    field: &Field,
    condition: &FilterCondition,
    params: &mut ParamSink,
    keyword: &str,
    scalar_op: &str,
) -> CompileResult<String> {
    match &condition.value {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(CompileError::EmptyValueList {
                    field: field.id.clone(),
                });
            }
            let placeholders: Vec<String> =
                items.iter().map(|item| params.bind(item.clone())).collect();
            Ok(format!("{column} {keyword} ({})", placeholders.join(", ")))
        }
        other => {
            let value = other.clone().unwrap_or(Value::Null);
            Ok(format!("{column} {scalar_op} {}", params.bind(value)))
        }
    }
}

/// Text spliced into a LIKE pattern. Strings are used as-is.
fn pattern_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
