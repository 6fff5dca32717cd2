#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Filter error in step '{step}' at line {line}: {source}")]
    FilterError {
        step: String,
        line: usize,
        #[source]
        source: FilterError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Line too long: {length} > {max_length}")]
    LineTooLong { length: usize, max_length: usize },
}

/// Faults raised while enriching a single event.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("search failed for query '{query}': {source}")]
    Retrieval {
        query: String,
        #[source]
        source: SearchError,
    },

    #[error("query '{query}' matched {total} hits but {returned} were returned")]
    Truncated {
        query: String,
        total: u64,
        returned: usize,
    },

    #[error("query '{query}' matched at least {total} hits, exact count unknown")]
    TotalNotExact { query: String, total: u64 },

    #[error("hit {hit} ({id}): field '{path}' {reason}")]
    DataShape {
        hit: usize,
        id: String,
        path: String,
        reason: String,
    },

    #[error("query '{query}' matched {hits} hits but none has a numeric '{path}'")]
    NoLatencies {
        query: String,
        hits: usize,
        path: String,
    },

    #[error("cannot write field '{path}': {reason}")]
    OutputField { path: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no search hosts configured")]
    NoHosts,

    #[error("transport error talking to {host}: {message}")]
    Transport { host: String, message: String },

    #[error("{host} answered HTTP {status}: {body}")]
    Status {
        host: String,
        status: u16,
        body: String,
    },

    #[error("invalid search response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("percentage_limit must be in (0, 100], got {0}")]
    InvalidPercentage(f64),

    #[error("invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot read config file '{path}': {source}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
