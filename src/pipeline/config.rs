use crate::input_format::InputFormat;

/// Configuration for pipeline behavior
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub error_strategy: ErrorStrategy,
    pub buffer_size: usize,
    pub max_line_length: usize,
    pub progress_interval: usize,
    pub input_format: InputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            error_strategy: ErrorStrategy::Passthrough,
            buffer_size: 65536,       // 64KB
            max_line_length: 1048576, // 1MB
            progress_interval: 0,     // Disabled
            input_format: InputFormat::default(),
        }
    }
}

/// What happens to a record when a processor fails on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ErrorStrategy {
    /// Write the record as it was read and continue
    #[value(name = "passthrough")]
    Passthrough,
    /// Drop the record and continue
    #[value(name = "skip")]
    Skip,
    /// Stop processing on first error
    #[value(name = "fail-fast")]
    FailFast,
}
