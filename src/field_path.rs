//! Field references into nested JSON events.
//!
//! Two spellings are accepted:
//! - dotted: `latency.response_transmitted`
//! - bracketed: `[latency][response_transmitted]`
//!
//! A segment made of digits indexes into an array when the value at that
//! point is an array, and is an ordinary key otherwise.

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let trimmed = path.trim();
        let invalid = |reason: &str| ConfigError::InvalidFieldPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("path is empty"));
        }

        let segments: Vec<String> = if trimmed.starts_with('[') {
            let mut segments = Vec::new();
            let mut rest = trimmed;
            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .ok_or_else(|| invalid("expected '['"))?;
                let end = inner.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                segments.push(inner[..end].to_string());
                rest = &inner[end + 1..];
            }
            segments
        } else {
            trimmed.split('.').map(|s| s.to_string()).collect()
        };

        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty segment"));
        }
        if segments.iter().any(|s| s.contains('[') || s.contains(']')) {
            return Err(invalid("stray bracket"));
        }

        Ok(FieldPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Look the path up in `doc`. `None` if any step is missing.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let mut current = doc;
        for segment in &self.segments {
            current = match current {
                Value::Object(obj) => obj.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at the path, creating intermediate objects as needed.
    ///
    /// Fails when the path runs through a scalar or an array, or when `doc`
    /// itself is not an object. `doc` is left untouched on failure.
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<(), String> {
        let (last, parents) = self
            .segments
            .split_last()
            .ok_or_else(|| "path is empty".to_string())?;
        self.check_writable(doc, parents.len())?;

        let mut current = doc;
        for segment in parents {
            current = as_object_mut(current)?
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        as_object_mut(current)?.insert(last.clone(), value);
        Ok(())
    }

    /// Every existing value along the first `depth` segments must be an object.
    fn check_writable(&self, doc: &Value, depth: usize) -> Result<(), String> {
        let mut current = doc;
        for (i, segment) in self.segments[..depth].iter().enumerate() {
            let obj = current
                .as_object()
                .ok_or_else(|| self.not_an_object(i, current))?;
            match obj.get(segment) {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }
        if current.is_object() {
            Ok(())
        } else {
            Err(self.not_an_object(depth, current))
        }
    }

    fn not_an_object(&self, depth: usize, found: &Value) -> String {
        let at = if depth == 0 {
            "<event>".to_string()
        } else {
            self.segments[..depth].join(".")
        };
        format!("'{}' is {}, not an object", at, kind(found))
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    let found = kind(value);
    value
        .as_object_mut()
        .ok_or_else(|| format!("found {}, expected an object", found))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl std::str::FromStr for FieldPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}
