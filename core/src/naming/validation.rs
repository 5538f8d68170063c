use crate::errors::{Result, ScopeError};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Separator between namespace and name in qualified names, e.g. `region:header`.
pub const QUALIFIER: char = ':';

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name pattern is valid"));

pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ScopeError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Random name that always passes [`validate_name`] when `prefix` is a valid name start.
pub fn generate_name(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

/// Split `namespace:name` into its parts. Unqualified names have no namespace.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once(QUALIFIER) {
        Some((namespace, local)) => (Some(namespace), local),
        None => (None, name),
    }
}

pub fn qualify(namespace: &str, name: &str) -> String {
    format!("{}{}{}", namespace, QUALIFIER, name)
}
