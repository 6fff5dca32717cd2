// src/pipeline.rs
pub mod config;
pub mod context;
pub mod stream;

pub use config::{ErrorStrategy, PipelineConfig};
pub use context::{ProcessResult, ProcessingStats, RecordContext, RecordData};
pub use stream::{RecordProcessor, StreamPipeline};
