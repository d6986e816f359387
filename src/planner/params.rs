//! Positional parameter sink.

use serde_json::Value;

/// Collects bound values and hands out `$n` placeholders.
///
/// Placeholder `$k` always binds to `values[k - 1]`.
#[derive(Debug, Default)]
pub struct ParamSink {
    values: Vec<Value>,
}

impl ParamSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its placeholder.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
