// src/search/elasticsearch.rs
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConfigError, SearchError};
use crate::search::{SearchBackend, SearchRequest, SearchResponse};

pub const DEFAULT_PORT: u16 = 9200;

// Error bodies are echoed into logs; keep them readable.
const MAX_ERROR_BODY: usize = 512;

/// Blocking client for the Elasticsearch `_search` URI API
///
/// Hosts are used round-robin. When a host cannot be reached the next one
/// is tried; an HTTP error status from a reachable host is final.
pub struct ElasticsearchClient {
    hosts: Vec<Url>,
    index: Option<String>,
    authorization: Option<String>,
    agent: ureq::Agent,
    next_host: AtomicUsize,
}

impl ElasticsearchClient {
    pub fn new(hosts: &[String], timeout: Duration) -> Result<Self, ConfigError> {
        if hosts.is_empty() {
            return Err(ConfigError::Invalid("at least one host is required".to_string()));
        }
        let hosts = hosts
            .iter()
            .map(|h| normalize_host(h))
            .collect::<Result<Vec<_>, _>>()?;

        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Ok(ElasticsearchClient {
            hosts,
            index: None,
            authorization: None,
            agent,
            next_host: AtomicUsize::new(0),
        })
    }

    /// Restrict searches to an index (or comma-separated list / pattern)
    pub fn with_index(mut self, index: Option<String>) -> Self {
        self.index = index.filter(|i| !i.trim().is_empty());
        self
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        let token = BASE64.encode(format!("{}:{}", user, password));
        self.authorization = Some(format!("Basic {}", token));
        self
    }

    pub fn hosts(&self) -> &[Url] {
        &self.hosts
    }

    pub fn search_url(&self, host: &Url, request: &SearchRequest) -> Url {
        let mut url = host.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            if let Some(index) = &self.index {
                segments.push(index);
            }
            segments.push("_search");
        }

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", &request.query);
            if !request.sort.trim().is_empty() {
                query.append_pair("sort", &request.sort);
            }
            if let Some(filter) = &request.source_filter {
                query.append_pair("_source", filter);
            }
            query.append_pair("size", &request.size.to_string());
        }
        url
    }

    fn search_host(&self, host: &Url, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let url = self.search_url(host, request);
        debug!(url = %url, "searching");

        let mut call = self.agent.get(url.as_str());
        if let Some(authorization) = &self.authorization {
            call = call.set("Authorization", authorization);
        }

        match call.call() {
            Ok(response) => {
                let mut body = String::new();
                response
                    .into_reader()
                    .read_to_string(&mut body)
                    .map_err(|e| SearchError::Transport {
                        host: host_label(host),
                        message: e.to_string(),
                    })?;
                SearchResponse::from_json(&body)
            }
            Err(ureq::Error::Status(status, response)) => {
                let mut body = response.into_string().unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                    body.push_str("...");
                }
                Err(SearchError::Status {
                    host: host_label(host),
                    status,
                    body,
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(SearchError::Transport {
                host: host_label(host),
                message: transport.to_string(),
            }),
        }
    }
}

impl SearchBackend for ElasticsearchClient {
    fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let count = self.hosts.len();
        if count == 0 {
            return Err(SearchError::NoHosts);
        }

        let start = self.next_host.fetch_add(1, Ordering::Relaxed) % count;
        let mut last_error = SearchError::NoHosts;

        for offset in 0..count {
            let host = &self.hosts[(start + offset) % count];
            match self.search_host(host, request) {
                Err(err @ SearchError::Transport { .. }) => {
                    if offset + 1 < count {
                        warn!(host = %host_label(host), error = %err, "search host unreachable, trying next");
                    }
                    last_error = err;
                }
                other => return other,
            }
        }

        Err(last_error)
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

fn host_label(host: &Url) -> String {
    host.as_str().trim_end_matches('/').to_string()
}

/// Turn a configured host into a base URL.
///
/// `es-server` becomes `http://es-server:9200/`, `es-server:9201` keeps its
/// port, and anything with a scheme is taken as written.
pub fn normalize_host(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let invalid = |reason: String| ConfigError::InvalidHost {
        host: raw.to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("host is empty".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        let (authority, path) = match trimmed.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (trimmed, None),
        };
        let authority = if has_port(authority) {
            authority.to_string()
        } else {
            format!("{}:{}", authority, DEFAULT_PORT)
        };
        match path {
            Some(path) => format!("http://{}/{}", authority, path),
            None => format!("http://{}", authority),
        }
    };

    let url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host name".to_string()));
    }
    Ok(url)
}

/// `[::1]:9201` and `es:9201` carry a port; `[::1]` and `es` do not.
fn has_port(authority: &str) -> bool {
    match authority.rfind(']') {
        Some(end) => authority[end + 1..].starts_with(':'),
        None => authority.contains(':'),
    }
}
