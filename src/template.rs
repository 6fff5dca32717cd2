use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ConfigError;
use crate::field_path::FieldPath;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"%\{([^}]*)\}").unwrap());

/// Event field holding the time used by `%{+...}` placeholders
pub const TIMESTAMP_FIELD: &str = "@timestamp";

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field { path: FieldPath, raw: String },
    Time(String),
}

/// A string with `%{...}` placeholders filled in from an event
///
/// - `%{field}` / `%{[a][b]}` / `%{a.b}`: the field's value
/// - `%{+FORMAT}`: the event's `@timestamp` formatted with strftime `FORMAT`
///   (`%{+%Y.%m.%d}`), falling back to the current time
///
/// A field that is missing or null leaves its placeholder in the output
/// unchanged.
#[derive(Debug, Clone)]
pub struct EventTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl EventTemplate {
    pub fn new(template: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut last_end = 0;

        for captures in PLACEHOLDER.captures_iter(template) {
            let whole = captures.get(0).unwrap();
            let inner = captures.get(1).map_or("", |m| m.as_str());

            if whole.start() > last_end {
                segments.push(Segment::Literal(template[last_end..whole.start()].to_string()));
            }
            last_end = whole.end();

            if let Some(format) = inner.strip_prefix('+') {
                if format.is_empty()
                    || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
                {
                    return Err(ConfigError::InvalidTemplate {
                        template: template.to_string(),
                        reason: format!("bad time format '{}'", format),
                    });
                }
                segments.push(Segment::Time(format.to_string()));
            } else {
                let path = FieldPath::parse(inner).map_err(|e| ConfigError::InvalidTemplate {
                    template: template.to_string(),
                    reason: e.to_string(),
                })?;
                segments.push(Segment::Field {
                    path,
                    raw: whole.as_str().to_string(),
                });
            }
        }

        if last_end < template.len() {
            segments.push(Segment::Literal(template[last_end..].to_string()));
        }

        Ok(EventTemplate {
            source: template.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    pub fn render(&self, event: &Value) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { path, raw } => match path.resolve(event) {
                    None | Some(Value::Null) => out.push_str(raw),
                    Some(value) => out.push_str(&value_to_text(value)),
                },
                Segment::Time(format) => {
                    out.push_str(&event_time(event).format(format).to_string());
                }
            }
        }
        out
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn event_time(event: &Value) -> DateTime<Utc> {
    match event.get(TIMESTAMP_FIELD) {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}
