//! Display-only rendering of compiled SQL with parameters inlined.
//!
//! The output is for people to read. It must never be executed.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$(\d+)").unwrap());

/// Replace each `$n` with a literal rendering of `params[n - 1]`.
///
/// Placeholders are matched whole, so `$1` never clobbers `$10`.
/// Placeholders without a parameter are left as they are.
pub fn render(sql: &str, params: &[Value]) -> String {
    PLACEHOLDER
        .replace_all(sql, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| params.get(i))
                .map(literal)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Literal form of a bound value.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(_) | Value::Object(_) => quote(&value.to_string()),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
