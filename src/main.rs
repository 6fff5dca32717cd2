use anyhow::{bail, Context};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use resptime::logging::init_logging;
use resptime::{
    ErrorStrategy, FilterConfig, InputFormat, MissingLatency, PipelineConfig, RespTimeFilter,
    StreamPipeline,
};

#[derive(Parser)]
#[command(name = "resptime")]
#[command(
    about = "Enrich JSON events with best/worst response times looked up in Elasticsearch"
)]
#[command(version)]
struct Args {
    /// YAML file with filter settings; flags below override it
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Elasticsearch host (repeatable)
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Index or index pattern to search (default: all indices)
    #[arg(long)]
    index: Option<String>,

    /// Query string, with %{field} placeholders filled from each event
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Sort order, comma-delimited <field>:<direction> pairs
    #[arg(long)]
    sort: Option<String>,

    /// _source filter for the matched documents
    #[arg(long)]
    source_filter: Option<String>,

    /// Maximum number of hits to retrieve per event
    #[arg(long)]
    size: Option<usize>,

    /// Percentage of the result set treated as the worst slice
    #[arg(short = 'p', long)]
    percentage_limit: Option<f64>,

    /// Field path of the latency inside matched documents
    #[arg(long)]
    latency_field: Option<String>,

    /// Event field receiving the best response time
    #[arg(long)]
    best_field: Option<String>,

    /// Event field receiving the worst response time
    #[arg(long)]
    worst_field: Option<String>,

    /// What to do with hits lacking a numeric latency
    #[arg(long, value_enum)]
    on_missing_latency: Option<MissingLatency>,

    /// Tag added to successfully enriched events (repeatable)
    #[arg(long = "add-tag", value_name = "TAG")]
    add_tag: Vec<String>,

    /// User for HTTP basic auth
    #[arg(long)]
    user: Option<String>,

    /// Password for HTTP basic auth
    #[arg(long)]
    password: Option<String>,

    /// Request timeout, e.g. "10s" or "1m 30s"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Input format
    #[arg(long, value_enum, default_value = "jsonl")]
    input_format: InputFormat,

    /// What to write when an event cannot be enriched
    #[arg(long, value_enum, default_value = "passthrough")]
    on_error: ErrorStrategy,

    /// Abort on the first event that cannot be enriched (same as --on-error fail-fast)
    #[arg(long)]
    fail_fast: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Log progress every N records
    #[arg(long, value_name = "N")]
    progress: Option<usize>,

    /// Maximum line length
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,

    /// Print the effective filter settings as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Input file (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,
}

impl Args {
    /// File settings (or defaults) with command line overrides applied
    fn filter_config(&self) -> anyhow::Result<FilterConfig> {
        let mut config = match &self.config_file {
            Some(path) => FilterConfig::from_yaml_file(path)?,
            None => FilterConfig::default(),
        };

        if !self.hosts.is_empty() {
            config.hosts = self.hosts.clone();
        }
        if let Some(index) = &self.index {
            config.index = Some(index.clone());
        }
        if let Some(query) = &self.query {
            config.query = query.clone();
        }
        if let Some(sort) = &self.sort {
            config.sort = sort.clone();
        }
        if let Some(filter) = &self.source_filter {
            config.source_filter = Some(filter.clone());
        }
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(p) = self.percentage_limit {
            config.percentage_limit = p;
        }
        if let Some(field) = &self.latency_field {
            config.latency_field = field.clone();
        }
        if let Some(field) = &self.best_field {
            config.best_response_time_field_name = field.clone();
        }
        if let Some(field) = &self.worst_field {
            config.worst_response_time_field_name = field.clone();
        }
        if let Some(policy) = self.on_missing_latency {
            config.on_missing_latency = policy;
        }
        if !self.add_tag.is_empty() {
            config.add_tag = self.add_tag.clone();
        }
        if let Some(user) = &self.user {
            config.user = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }

        Ok(config)
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            error_strategy: if self.fail_fast {
                ErrorStrategy::FailFast
            } else {
                self.on_error
            },
            buffer_size: self.buffer_size,
            max_line_length: self.max_line_length,
            progress_interval: self.progress.unwrap_or(0),
            input_format: self.input_format,
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args) {
        eprintln!("resptime: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let filter_config = args.filter_config()?;

    if args.print_config {
        print!("{}", filter_config.to_yaml()?);
        return Ok(());
    }

    if filter_config.query.trim().is_empty() {
        bail!("no query given; use --query or set `query` in the config file");
    }

    let filter = RespTimeFilter::from_config("resp_time", &filter_config)
        .context("invalid filter configuration")?;

    let pipeline_config = args.pipeline_config();
    let buffer_size = pipeline_config.buffer_size;
    let mut pipeline = StreamPipeline::new(pipeline_config);
    pipeline.add_processor(Box::new(filter));

    // Set up input
    let input_filename = args
        .input_file
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    let input: Box<dyn BufRead> = if let Some(input_path) = &args.input_file {
        let file = File::open(input_path)
            .with_context(|| format!("failed to open input file '{}'", input_path.display()))?;
        Box::new(BufReader::with_capacity(buffer_size, file))
    } else {
        Box::new(BufReader::with_capacity(buffer_size, io::stdin()))
    };

    // Set up output
    let mut output: Box<dyn Write> = if let Some(output_path) = &args.output_file {
        let file = File::create(output_path).with_context(|| {
            format!("failed to create output file '{}'", output_path.display())
        })?;
        Box::new(io::BufWriter::with_capacity(buffer_size, file))
    } else {
        Box::new(io::BufWriter::with_capacity(buffer_size, io::stdout()))
    };

    let stats = pipeline
        .process_stream(input, &mut output, input_filename.as_deref())
        .context("processing failed")?;

    match output.flush() {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => return Err(e).context("failed to flush output"),
    }

    info!(
        processed = stats.records_processed,
        written = stats.records_output,
        passed_through = stats.records_passed_through,
        skipped = stats.records_skipped,
        unparsed = stats.parse_errors.len(),
        elapsed = ?stats.processing_time,
        "done"
    );
    if stats.records_processed > 0 {
        let rate = stats.records_processed as f64 / stats.processing_time.as_secs_f64().max(1e-9);
        debug!("processing rate: {:.0} records/second", rate);
    }

    Ok(())
}
