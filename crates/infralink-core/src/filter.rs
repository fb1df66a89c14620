//! Post-fetch filtering of listed entries
//!
//! Each [`FilterSpec`] keeps an entry only if the named field matches at least
//! one allowed value. Several filters combine with AND. A filter with no
//! values, or no filters at all, leaves the input untouched.

use crate::error::{CloudError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User-supplied predicate over one field of a listed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Field name; dots reach into nested objects ("shape_config.ocpus")
    pub name: String,

    /// Allowed values (match-any)
    pub values: Vec<String>,

    /// Treat `values` as regular expressions instead of exact strings
    #[serde(default)]
    pub regex: bool,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            regex: false,
        }
    }

    pub fn regex(name: impl Into<String>, patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values: patterns,
            regex: true,
        }
    }

    fn compile(&self) -> Result<Matcher<'_>> {
        if !self.regex {
            return Ok(Matcher::Exact(&self.values));
        }
        let patterns = self
            .values
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    CloudError::InvalidConfig(format!("filter {}: invalid pattern {}: {}", self.name, p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Matcher::Patterns(patterns))
    }
}

enum Matcher<'a> {
    Exact(&'a [String]),
    Patterns(Vec<Regex>),
}

impl Matcher<'_> {
    fn matches(&self, candidate: &str) -> bool {
        match self {
            Matcher::Exact(values) => values.iter().any(|v| v == candidate),
            Matcher::Patterns(patterns) => patterns.iter().any(|p| p.is_match(candidate)),
        }
    }
}

/// Apply every filter to `items`, keeping their relative order
pub fn apply_filters(items: Vec<Value>, filters: &[FilterSpec]) -> Result<Vec<Value>> {
    let active: Vec<(&str, Matcher<'_>)> = filters
        .iter()
        .filter(|f| !f.values.is_empty())
        .map(|f| f.compile().map(|m| (f.name.as_str(), m)))
        .collect::<Result<_>>()?;

    if active.is_empty() {
        return Ok(items);
    }

    let before = items.len();
    let kept: Vec<Value> = items
        .into_iter()
        .filter(|item| {
            active.iter().all(|(field, matcher)| {
                field_strings(item, field)
                    .iter()
                    .any(|candidate| matcher.matches(candidate))
            })
        })
        .collect();

    tracing::debug!("Filters kept {} of {} entries", kept.len(), before);
    Ok(kept)
}

/// String forms of a field's value; lists contribute each scalar element
fn field_strings(item: &Value, path: &str) -> Vec<String> {
    let mut current = item;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Vec::new(),
        }
    }

    match current {
        Value::Array(elements) => elements.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
