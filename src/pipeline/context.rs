use crate::error::ProcessingError;
use std::time::Duration;

/// A record that flows through the pipeline - either text or structured data
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    /// Text content (lines that did not parse as events)
    Text(String),
    /// Structured event
    Structured(serde_json::Value),
}

impl RecordData {
    /// Create a text record
    pub fn text(content: String) -> Self {
        RecordData::Text(content)
    }

    /// Create a structured record
    pub fn structured(data: serde_json::Value) -> Self {
        RecordData::Structured(data)
    }
}

/// Context passed to each processor for a record
pub struct RecordContext<'a> {
    pub line_number: usize,
    pub file_name: Option<&'a str>,
}

/// Result of processing a single record
#[derive(Debug)]
pub enum ProcessResult {
    /// Transform record
    Transform(RecordData),
    /// Processing error; the pipeline's error strategy decides what is written
    Error(ProcessingError),
}

/// Parse error details for deferred reporting
#[derive(Debug, Clone)]
pub struct ParseErrorInfo {
    pub line_number: usize,
    pub format_name: String,
    pub error: String,
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records_processed: usize,
    pub records_output: usize,
    pub records_skipped: usize,
    /// Records written unchanged after a processor failed on them
    pub records_passed_through: usize,
    pub errors: usize,
    pub processing_time: Duration,
    pub parse_errors: Vec<ParseErrorInfo>,
}

/// Shared context across all processors
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub line_number: usize,
    pub file_name: Option<String>,
}
