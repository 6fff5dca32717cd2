// src/processors/resp_time.rs
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateResult, ResponseTimeAggregator};
use crate::config::{FilterConfig, MissingLatency};
use crate::error::{ConfigError, FilterError, ProcessingError};
use crate::field_path::FieldPath;
use crate::pipeline::context::{ProcessResult, RecordContext, RecordData};
use crate::pipeline::stream::RecordProcessor;
use crate::search::{ElasticsearchClient, SearchBackend, SearchRequest, SearchResponse};
use crate::template::EventTemplate;

/// Event field that `add_tag` appends to
pub const TAGS_FIELD: &str = "tags";

/// Looks up earlier events for each incoming event and attaches the best
/// and worst response time found among them
pub struct RespTimeFilter {
    name: String,
    backend: Box<dyn SearchBackend>,
    query: EventTemplate,
    source_filter: Option<EventTemplate>,
    sort: String,
    size: usize,
    latency_field: FieldPath,
    best_field: FieldPath,
    worst_field: FieldPath,
    aggregator: ResponseTimeAggregator,
    on_missing_latency: MissingLatency,
    add_tag: Vec<String>,
}

impl RespTimeFilter {
    /// Build the filter with an Elasticsearch client made from `config`.
    pub fn from_config(name: &str, config: &FilterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut client = ElasticsearchClient::new(&config.hosts, config.timeout)?
            .with_index(config.index.clone());
        if let Some(user) = &config.user {
            client = client.with_basic_auth(user, config.password.as_deref().unwrap_or(""));
        }

        let hosts: Vec<&str> = client.hosts().iter().map(|h| h.as_str()).collect();
        info!(step = name, hosts = ?hosts, index = ?config.index, "New response time filter");

        let filter = Self::new(name, config, Box::new(client))?;
        if !filter.query.has_placeholders() {
            warn!(
                step = name,
                query = filter.query.source(),
                "query has no %{{...}} placeholders; every event gets the same summary"
            );
        }
        Ok(filter)
    }

    /// Build the filter around any search backend.
    pub fn new(
        name: &str,
        config: &FilterConfig,
        backend: Box<dyn SearchBackend>,
    ) -> Result<Self, ConfigError> {
        let source_filter = match config.source_filter.as_deref() {
            Some(filter) if !filter.trim().is_empty() => Some(EventTemplate::new(filter)?),
            _ => None,
        };

        Ok(RespTimeFilter {
            name: name.to_string(),
            backend,
            query: EventTemplate::new(&config.query)?,
            source_filter,
            sort: config.sort.clone(),
            size: config.size,
            latency_field: FieldPath::parse(&config.latency_field)?,
            best_field: FieldPath::parse(&config.best_response_time_field_name)?,
            worst_field: FieldPath::parse(&config.worst_response_time_field_name)?,
            aggregator: ResponseTimeAggregator::new(config.percentage_limit)?,
            on_missing_latency: config.on_missing_latency,
            add_tag: config.add_tag.clone(),
        })
    }

    /// The search this filter would run for `event`.
    pub fn build_request(&self, event: &Value) -> SearchRequest {
        let source_filter = self
            .source_filter
            .as_ref()
            .map(|t| t.render(event))
            .filter(|f| !f.trim().is_empty());

        SearchRequest {
            query: self.query.render(event),
            sort: self.sort.clone(),
            source_filter,
            size: self.size,
        }
    }

    /// Run the search for `event` and aggregate the hits.
    pub fn summarize(&self, event: &Value) -> Result<AggregateResult, FilterError> {
        let request = self.build_request(event);
        self.summarize_request(&request)
    }

    /// Enriched copy of `event`. The original is never modified, and on
    /// error nothing is written.
    pub fn enrich(&self, event: &Value) -> Result<Value, FilterError> {
        let request = self.build_request(event);
        let summary = self.summarize_request(&request)?;
        self.apply(event, summary)
    }

    fn summarize_request(&self, request: &SearchRequest) -> Result<AggregateResult, FilterError> {
        let response = self
            .backend
            .search(request)
            .map_err(|source| FilterError::Retrieval {
                query: request.query.clone(),
                source,
            })?;

        if response.total == 0 {
            return Ok(AggregateResult::EMPTY);
        }
        if response.total_is_lower_bound {
            return Err(FilterError::TotalNotExact {
                query: request.query.clone(),
                total: response.total,
            });
        }
        if response.hits.len() as u64 != response.total {
            return Err(FilterError::Truncated {
                query: request.query.clone(),
                total: response.total,
                returned: response.hits.len(),
            });
        }

        let latencies = self.latencies(&response)?;
        if latencies.is_empty() {
            return Err(FilterError::NoLatencies {
                query: request.query.clone(),
                hits: response.hits.len(),
                path: self.latency_field.to_string(),
            });
        }
        let summary = self.aggregator.aggregate(&latencies);
        debug!(
            step = %self.name,
            query = %request.query,
            hits = response.hits.len(),
            used = latencies.len(),
            worst_len = self.aggregator.worst_len(latencies.len()),
            worst = summary.worst,
            best = summary.best,
            "aggregated response times"
        );
        Ok(summary)
    }

    fn latencies(&self, response: &SearchResponse) -> Result<Vec<f64>, FilterError> {
        let mut values = Vec::with_capacity(response.hits.len());
        for (position, hit) in response.hits.iter().enumerate() {
            let reason = match self.latency_field.resolve(&hit.source) {
                Some(value) => match value.as_f64() {
                    Some(latency) => {
                        values.push(latency);
                        continue;
                    }
                    None => format!("is not a number ({})", value),
                },
                None => "is missing".to_string(),
            };

            match self.on_missing_latency {
                MissingLatency::Fail => {
                    return Err(FilterError::DataShape {
                        hit: position,
                        id: hit.describe(),
                        path: self.latency_field.to_string(),
                        reason,
                    })
                }
                MissingLatency::Skip => {
                    debug!(
                        step = %self.name,
                        hit = %hit.describe(),
                        field = %self.latency_field,
                        reason = %reason,
                        "skipping hit without usable latency"
                    );
                }
            }
        }
        Ok(values)
    }

    fn apply(&self, event: &Value, summary: AggregateResult) -> Result<Value, FilterError> {
        let mut enriched = event.clone();
        for (path, value) in [
            (&self.best_field, summary.best),
            (&self.worst_field, summary.worst),
        ] {
            let number = Number::from_f64(value).ok_or_else(|| FilterError::OutputField {
                path: path.to_string(),
                reason: format!("{} is not a finite number", value),
            })?;
            path.set(&mut enriched, Value::Number(number))
                .map_err(|reason| FilterError::OutputField {
                    path: path.to_string(),
                    reason,
                })?;
        }

        if !self.add_tag.is_empty() {
            add_tags(&mut enriched, &self.add_tag)?;
        }
        Ok(enriched)
    }
}

fn add_tags(event: &mut Value, tags: &[String]) -> Result<(), FilterError> {
    let obj = event.as_object_mut().ok_or_else(|| FilterError::OutputField {
        path: TAGS_FIELD.to_string(),
        reason: "event is not an object".to_string(),
    })?;

    let entry = obj
        .entry(TAGS_FIELD.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    // A lone string tag is promoted to a list
    if let Some(single) = entry.as_str().map(str::to_string) {
        *entry = Value::Array(vec![Value::String(single)]);
    }

    match entry {
        Value::Array(existing) => {
            for tag in tags {
                if !existing.iter().any(|t| t.as_str() == Some(tag.as_str())) {
                    existing.push(Value::String(tag.clone()));
                }
            }
            Ok(())
        }
        other => Err(FilterError::OutputField {
            path: TAGS_FIELD.to_string(),
            reason: format!("expected a list of tags, found {}", other),
        }),
    }
}

impl RecordProcessor for RespTimeFilter {
    fn process(&mut self, record: &RecordData, ctx: &RecordContext) -> ProcessResult {
        let event = match record {
            RecordData::Structured(event) => event,
            RecordData::Text(_) => return ProcessResult::Transform(record.clone()),
        };

        let request = self.build_request(event);
        let outcome = self
            .summarize_request(&request)
            .and_then(|summary| self.apply(event, summary));

        match outcome {
            Ok(enriched) => ProcessResult::Transform(RecordData::structured(enriched)),
            Err(err) => {
                warn!(
                    step = %self.name,
                    backend = self.backend.name(),
                    input = ctx.file_name.unwrap_or("<stdin>"),
                    line = ctx.line_number,
                    query = %request.query,
                    error = %err,
                    "Failed to query elasticsearch for response times"
                );
                ProcessResult::Error(ProcessingError::FilterError {
                    step: self.name.clone(),
                    line: ctx.line_number,
                    source: err,
                })
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
