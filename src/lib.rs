// src/lib.rs
pub mod aggregate;
pub mod config;
pub mod error;
pub mod field_path;
pub mod input_format;
pub mod logging;
pub mod pipeline;
pub mod processors;
pub mod search;
pub mod template;

pub use error::*;
pub use pipeline::*;

pub use aggregate::{AggregateResult, ResponseTimeAggregator};
pub use config::{FilterConfig, MissingLatency};
pub use field_path::FieldPath;
pub use input_format::InputFormat;
pub use processors::RespTimeFilter;
pub use search::{ElasticsearchClient, Hit, SearchBackend, SearchRequest, SearchResponse};
pub use template::EventTemplate;
