//! Aggregation wrapping for SELECT expressions.

use crate::catalog::AggregationKind;

/// Wrap a field expression in its aggregate function.
///
/// An absent or unrecognized kind returns the expression unchanged.
pub fn wrap(expr: &str, kind: Option<&AggregationKind>) -> String {
    match kind {
        Some(AggregationKind::Count) => format!("COUNT({expr})"),
        Some(AggregationKind::Sum) => format!("SUM({expr})"),
        Some(AggregationKind::Avg) => format!("AVG({expr})"),
        Some(AggregationKind::Min) => format!("MIN({expr})"),
        Some(AggregationKind::Max) => format!("MAX({expr})"),
        Some(AggregationKind::CountDistinct) => format!("COUNT(DISTINCT {expr})"),
        Some(AggregationKind::Unrecognized(_)) | None => expr.to_string(),
    }
}
