// src/config.rs
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::aggregate::{ResponseTimeAggregator, DEFAULT_PERCENTAGE_LIMIT};
use crate::error::ConfigError;
use crate::field_path::FieldPath;
use crate::template::EventTemplate;

pub const DEFAULT_HOST: &str = "localhost:9200";
pub const DEFAULT_SORT: &str = "@timestamp:desc";
pub const DEFAULT_SIZE: usize = 10000;
pub const DEFAULT_LATENCY_FIELD: &str = "latency.response_transmitted";
pub const DEFAULT_BEST_FIELD: &str = "best_response_time";
pub const DEFAULT_WORST_FIELD: &str = "worst_response_time";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with a hit whose latency field is absent or not a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingLatency {
    /// Abandon the whole event; no summary fields are written
    #[default]
    Fail,
    /// Leave the hit out and aggregate over the rest
    Skip,
}

/// Settings of the response time filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Elasticsearch hosts, `host`, `host:port` or full URLs
    pub hosts: Vec<String>,
    /// Index, index list or pattern to search; all indices when unset
    pub index: Option<String>,
    /// Query string; `%{field}` placeholders are filled from the event
    pub query: String,
    /// Comma-delimited `<field>:<direction>` pairs
    pub sort: String,
    /// `_source` filter, may contain placeholders
    pub source_filter: Option<String>,
    /// Result window; a query matching more hits than this fails
    pub size: usize,
    /// Share of the result set (in percent) that forms the worst slice
    pub percentage_limit: f64,
    /// Where the latency lives inside each matched document
    pub latency_field: String,
    pub best_response_time_field_name: String,
    pub worst_response_time_field_name: String,
    pub on_missing_latency: MissingLatency,
    /// Tags appended to `tags` on successfully enriched events
    pub add_tag: Vec<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            hosts: vec![DEFAULT_HOST.to_string()],
            index: None,
            query: String::new(),
            sort: DEFAULT_SORT.to_string(),
            source_filter: None,
            size: DEFAULT_SIZE,
            percentage_limit: DEFAULT_PERCENTAGE_LIMIT,
            latency_field: DEFAULT_LATENCY_FIELD.to_string(),
            best_response_time_field_name: DEFAULT_BEST_FIELD.to_string(),
            worst_response_time_field_name: DEFAULT_WORST_FIELD.to_string(),
            on_missing_latency: MissingLatency::default(),
            add_tag: Vec::new(),
            user: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FilterConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty document means "all defaults"
        if text.trim().is_empty() {
            return Ok(FilterConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileNotFound {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every setting that can be checked without talking to the backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.trim().is_empty() {
            return Err(ConfigError::Invalid("query is required".to_string()));
        }
        if self.hosts.is_empty() {
            return Err(ConfigError::Invalid("at least one host is required".to_string()));
        }
        if self.size == 0 {
            return Err(ConfigError::Invalid("size must be at least 1".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".to_string()));
        }
        if self.password.is_some() && self.user.is_none() {
            return Err(ConfigError::Invalid("password given without user".to_string()));
        }

        ResponseTimeAggregator::new(self.percentage_limit)?;
        EventTemplate::new(&self.query)?;
        if let Some(filter) = &self.source_filter {
            EventTemplate::new(filter)?;
        }
        FieldPath::parse(&self.latency_field)?;
        let best = FieldPath::parse(&self.best_response_time_field_name)?;
        let worst = FieldPath::parse(&self.worst_response_time_field_name)?;
        // Equal paths, or one nested under the other, cannot both be written
        let (shorter, longer) = if best.segments().len() <= worst.segments().len() {
            (&best, &worst)
        } else {
            (&worst, &best)
        };
        if longer.segments().starts_with(shorter.segments()) {
            return Err(ConfigError::Invalid(format!(
                "best and worst response time fields overlap ('{}' and '{}')",
                best, worst
            )));
        }
        for host in &self.hosts {
            crate::search::elasticsearch::normalize_host(host)?;
        }
        Ok(())
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FilterConfig::default();
        assert_eq!(config.hosts, vec!["localhost:9200"]);
        assert_eq!(config.sort, "@timestamp:desc");
        assert_eq!(config.size, 10000);
        assert_eq!(config.percentage_limit, 5.0);
        assert_eq!(config.latency_field, "latency.response_transmitted");
        assert_eq!(config.best_response_time_field_name, "best_response_time");
        assert_eq!(config.worst_response_time_field_name, "worst_response_time");
        assert_eq!(config.on_missing_latency, MissingLatency::Fail);
        assert_eq!(config.timeout, Duration::from_secs(30));
        // no query yet
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_overrides_and_defaults() {
        let config = FilterConfig::from_yaml_str(
            r#"
hosts: ["es1", "es2:9201"]
query: "type:end AND operation:%{[opid]}"
percentage_limit: 10
source_filter: latency.response_transmitted
on_missing_latency: skip
timeout: 1m 30s
add_tag: [resptime]
"#,
        )
        .unwrap();

        assert_eq!(config.hosts, vec!["es1", "es2:9201"]);
        assert_eq!(config.percentage_limit, 10.0);
        assert_eq!(config.on_missing_latency, MissingLatency::Skip);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.add_tag, vec!["resptime"]);
        assert_eq!(config.sort, DEFAULT_SORT);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FilterConfig::from_yaml_str("query: x\nfields: [a]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(FilterConfig::from_yaml_str("\n").unwrap(), FilterConfig::default());
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = FilterConfig::default();
        config.query = "service:api".to_string();
        config.timeout = Duration::from_millis(2500);
        let text = config.to_yaml().unwrap();
        assert_eq!(FilterConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validation_failures() {
        let base = FilterConfig {
            query: "x".to_string(),
            ..FilterConfig::default()
        };
        base.validate().unwrap();

        let cases: Vec<FilterConfig> = vec![
            FilterConfig { percentage_limit: 0.0, ..base.clone() },
            FilterConfig { percentage_limit: 150.0, ..base.clone() },
            FilterConfig { size: 0, ..base.clone() },
            FilterConfig { hosts: vec![], ..base.clone() },
            FilterConfig { hosts: vec!["ftp://es".to_string()], ..base.clone() },
            FilterConfig { latency_field: "a..b".to_string(), ..base.clone() },
            FilterConfig { query: "%{}".to_string(), ..base.clone() },
            FilterConfig { worst_response_time_field_name: "best_response_time".to_string(), ..base.clone() },
            FilterConfig {
                best_response_time_field_name: "rt".to_string(),
                worst_response_time_field_name: "rt.worst".to_string(),
                ..base.clone()
            },
            FilterConfig {
                best_response_time_field_name: "[rt][best][ms]".to_string(),
                worst_response_time_field_name: "[rt][best]".to_string(),
                ..base.clone()
            },
            FilterConfig { password: Some("secret".to_string()), ..base.clone() },
            FilterConfig { timeout: Duration::ZERO, ..base.clone() },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn test_sibling_output_fields_accepted() {
        let config = FilterConfig {
            query: "x".to_string(),
            best_response_time_field_name: "rt.best".to_string(),
            worst_response_time_field_name: "[rt][worst]".to_string(),
            ..FilterConfig::default()
        };
        config.validate().unwrap();

        // a shared name prefix is not a shared path
        let config = FilterConfig {
            best_response_time_field_name: "rt".to_string(),
            worst_response_time_field_name: "rt_worst".to_string(),
            ..config
        };
        config.validate().unwrap();
    }
}
