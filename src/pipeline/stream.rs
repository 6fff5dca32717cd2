// src/pipeline/stream.rs
use std::io::{BufRead, Write};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ProcessingError;
use crate::input_format::LineParser;
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use crate::pipeline::context::{
    ParseErrorInfo, PipelineContext, ProcessResult, ProcessingStats, RecordContext, RecordData,
};

/// Main trait for record processing steps
pub trait RecordProcessor: Send + Sync {
    fn process(&mut self, record: &RecordData, ctx: &RecordContext) -> ProcessResult;
    fn name(&self) -> &str;
}

/// Main pipeline orchestrator
pub struct StreamPipeline {
    processors: Vec<Box<dyn RecordProcessor>>,
    parser: Box<dyn LineParser>,
    context: PipelineContext,
    config: PipelineConfig,
    stats: ProcessingStats,
}

impl StreamPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        StreamPipeline {
            processors: Vec::new(),
            parser: config.input_format.parser(),
            context: PipelineContext::default(),
            config,
            stats: ProcessingStats::default(),
        }
    }

    pub fn add_processor(&mut self, processor: Box<dyn RecordProcessor>) {
        self.processors.push(processor);
    }

    /// Process a single file/stream
    pub fn process_stream<R: BufRead, W: Write>(
        &mut self,
        input: R,
        output: &mut W,
        filename: Option<&str>,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();

        // Update context for new file
        self.context.file_name = filename.map(|s| s.to_string());
        self.context.line_number = 0;

        // Reset local stats for this file
        let mut file_stats = ProcessingStats::default();

        debug!(
            input = filename.unwrap_or("<stdin>"),
            format = self.config.input_format.name(),
            "reading events"
        );

        for line_result in input.lines() {
            let line = match line_result {
                Ok(line) => line,
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        break;
                    }
                    return Err(ProcessingError::IoError(e));
                }
            };

            self.context.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            file_stats.records_processed += 1;

            // Check line length
            if line.len() > self.config.max_line_length {
                let error = ProcessingError::LineTooLong {
                    length: line.len(),
                    max_length: self.config.max_line_length,
                };
                match self.config.error_strategy {
                    ErrorStrategy::FailFast => return Err(error),
                    ErrorStrategy::Skip | ErrorStrategy::Passthrough => {
                        file_stats.errors += 1;
                        file_stats.records_skipped += 1;
                        warn!(line = self.context.line_number, "line too long, skipping");
                        continue;
                    }
                }
            }

            let record = match self.parser.parse_line(&line) {
                Ok(data) => RecordData::structured(data),
                Err(error) => {
                    debug!(line = self.context.line_number, error = %error, "passing unparsed line through");
                    file_stats.parse_errors.push(ParseErrorInfo {
                        line_number: self.context.line_number,
                        format_name: self.config.input_format.name().to_string(),
                        error,
                    });
                    RecordData::text(line)
                }
            };

            match self.process_record(&record) {
                ProcessResult::Transform(output_record) => {
                    if !self.emit(output, &output_record)? {
                        break;
                    }
                    file_stats.records_output += 1;
                }
                ProcessResult::Error(err) => {
                    file_stats.errors += 1;
                    match self.config.error_strategy {
                        ErrorStrategy::FailFast => return Err(err),
                        ErrorStrategy::Skip => {
                            debug!(line = self.context.line_number, error = %err, "dropping record");
                            file_stats.records_skipped += 1;
                        }
                        ErrorStrategy::Passthrough => {
                            debug!(line = self.context.line_number, error = %err, "passing record through unchanged");
                            if !self.emit(output, &record)? {
                                break;
                            }
                            file_stats.records_output += 1;
                            file_stats.records_passed_through += 1;
                        }
                    }
                }
            }

            // Progress reporting
            if self.config.progress_interval > 0
                && file_stats.records_processed % self.config.progress_interval == 0
            {
                info!(records = file_stats.records_processed, "progress");
            }
        }

        file_stats.processing_time = start_time.elapsed();

        // Update global stats
        self.stats.records_processed += file_stats.records_processed;
        self.stats.records_output += file_stats.records_output;
        self.stats.records_skipped += file_stats.records_skipped;
        self.stats.records_passed_through += file_stats.records_passed_through;
        self.stats.errors += file_stats.errors;
        self.stats.processing_time += file_stats.processing_time;
        self.stats
            .parse_errors
            .extend(file_stats.parse_errors.iter().cloned());

        debug!(
            processed = file_stats.records_processed,
            output = file_stats.records_output,
            passed_through = file_stats.records_passed_through,
            skipped = file_stats.records_skipped,
            errors = file_stats.errors,
            elapsed = ?file_stats.processing_time,
            "stream complete"
        );

        Ok(file_stats)
    }

    fn process_record(&mut self, record: &RecordData) -> ProcessResult {
        let mut current_record = record.clone();

        let ctx = RecordContext {
            line_number: self.context.line_number,
            file_name: self.context.file_name.as_deref(),
        };

        // Process through all processors in sequence
        for processor in &mut self.processors {
            match processor.process(&current_record, &ctx) {
                ProcessResult::Transform(new_record) => {
                    current_record = new_record;
                }
                ProcessResult::Error(err) => {
                    debug!(processor = processor.name(), line = ctx.line_number, "processor failed");
                    return ProcessResult::Error(err);
                }
            }
        }

        ProcessResult::Transform(current_record)
    }

    /// Write one record. `Ok(false)` means the reader went away.
    fn emit<W: Write>(&self, output: &mut W, record: &RecordData) -> Result<bool, ProcessingError> {
        match self.write_record(output, record) {
            Ok(()) => Ok(true),
            // Handle broken pipe gracefully
            Err(ProcessingError::IoError(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn write_record<W: Write>(
        &self,
        output: &mut W,
        record: &RecordData,
    ) -> Result<(), ProcessingError> {
        match record {
            RecordData::Text(text) => {
                writeln!(output, "{}", text)?;
            }
            RecordData::Structured(data) => {
                writeln!(
                    output,
                    "{}",
                    serde_json::to_string(data).unwrap_or_else(|_| "null".to_string())
                )?;
            }
        }
        Ok(())
    }

    /// Get current accumulated stats
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }
}
