//! Strict identifier guard.
//!
//! Schema, table, column and alias names are the only non-parameterized
//! text the compiler splices into SQL. Each one must match
//! `[A-Za-z_][A-Za-z0-9_]*` or compilation fails. Names are never rewritten
//! into something that would pass.

use std::sync::LazyLock;

use regex::Regex;

use super::error::{CompileError, CompileResult};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Does `name` pass the identifier check?
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Return `name` unchanged if it is a safe identifier.
pub fn check_identifier(name: &str) -> CompileResult<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(CompileError::InvalidIdentifier(name.to_string()))
    }
}

/// `qualifier.name`, with both parts checked.
pub fn qualify(qualifier: &str, name: &str) -> CompileResult<String> {
    Ok(format!(
        "{}.{}",
        check_identifier(qualifier)?,
        check_identifier(name)?
    ))
}
