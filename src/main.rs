//! CLI entry point for the live KV6 vehicle tracker.
//!
//! Subscribes to the NDOV realtime feed, runs every message through the
//! pipeline and periodically logs the state of the vehicle ledger.

use anyhow::{Result, bail};
use clap::Parser;
use kv6_live::{
    config::FieldCandidates,
    error::PipelineError,
    geo::RdToWgs84,
    ledger::{Bucket, DEFAULT_MAX_FINISHED, VehicleLedger},
    operator::{DEFAULT_MESSAGE_TYPE, all_topics, topic_for},
    output::{append_record, log_json, log_summary, log_vehicles},
    pipeline::Pipeline,
    reference::{
        DEFAULT_REFRESH_INTERVAL, FileSource, HttpSource, ReferenceData, ReferenceSnapshot,
        ReferenceSource, spawn_refresh,
    },
    stats::{ErrorLog, ErrorRecorder},
    transport::{DEFAULT_ENDPOINT, Receiver, ZmqReceiver},
    vehicle::VehicleBuilder,
};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "kv6_live")]
#[command(about = "Live vehicle positions from the NDOV KV6 feed", long_about = None)]
struct Cli {
    /// Only show vehicles on this line
    #[arg(long)]
    line: Option<String>,

    /// Maximum number of vehicles shown per bucket (0 = all)
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Bucket to list: initialized, active or finished
    #[arg(long, default_value = "active")]
    bucket: Bucket,

    /// Seconds between status summaries
    #[arg(long, default_value_t = 1.0)]
    refresh: f64,

    /// Operators to subscribe to
    #[arg(long, num_args = 1.., default_value = "arriva")]
    operators: Vec<String>,

    /// Subscribe to every known operator
    #[arg(long, default_value_t = false)]
    all_operators: bool,

    /// Custom topics, replacing the operator subscriptions
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Feed endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Finished vehicles kept after cleanup
    #[arg(long, default_value_t = DEFAULT_MAX_FINISHED)]
    max_finished: usize,

    /// JSON reference snapshot on disk
    #[arg(long, conflicts_with = "reference_url")]
    reference_file: Option<String>,

    /// JSON reference snapshot over HTTP (gzip allowed)
    #[arg(long)]
    reference_url: Option<String>,

    /// JSON file overriding the field-name candidate tables
    #[arg(long)]
    fields_config: Option<String>,

    /// Append-only error log
    #[arg(long, default_value = "ndov_client_errors.log")]
    error_log: String,

    /// CSV file to append a stats row to on every summary
    #[arg(long)]
    stats_csv: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/kv6_live.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("kv6_live.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    if !(cli.refresh > 0.0) {
        bail!("--refresh must be a positive number of seconds");
    }

    let topics = subscription_topics(&cli)?;

    let fields = match &cli.fields_config {
        Some(path) => FieldCandidates::load(path)?,
        None => FieldCandidates::default(),
    };

    let errors = ErrorRecorder::new(Some(ErrorLog::new(&cli.error_log)));
    let mut pipeline = Pipeline::new(
        VehicleBuilder::new(fields, RdToWgs84),
        VehicleLedger::new(cli.max_finished),
        errors,
    );

    let refresh_task = match reference_source(&cli) {
        Some(source) => {
            let data = Arc::new(ReferenceData::new(initial_snapshot(source.as_ref()).await));
            pipeline = pipeline.with_reference(data.clone());
            Some(spawn_refresh(data, source, DEFAULT_REFRESH_INTERVAL))
        }
        None => {
            info!("No reference data configured, stop and line names disabled");
            None
        }
    };

    let mut receiver = ZmqReceiver::connect(&cli.endpoint, topics).await?;
    run(&mut receiver, &mut pipeline, &cli).await;

    if let Some(task) = refresh_task {
        task.abort();
    }

    log_json(pipeline.ledger(), cli.bucket)?;
    info!(vehicles = pipeline.ledger().len(), "Stopped");
    Ok(())
}

/// Resolves the CLI subscription options to topic strings.
fn subscription_topics(cli: &Cli) -> Result<Vec<String>> {
    if !cli.topics.is_empty() {
        return Ok(cli.topics.clone());
    }
    if cli.all_operators {
        return Ok(all_topics(DEFAULT_MESSAGE_TYPE));
    }

    let mut topics = Vec::with_capacity(cli.operators.len());
    for operator in &cli.operators {
        match topic_for(operator, DEFAULT_MESSAGE_TYPE) {
            Some(topic) => topics.push(topic),
            None => warn!(operator = %operator, "Unknown operator, skipping"),
        }
    }
    if topics.is_empty() {
        bail!("no known operators to subscribe to");
    }
    Ok(topics)
}

fn reference_source(cli: &Cli) -> Option<Arc<dyn ReferenceSource>> {
    if let Some(path) = &cli.reference_file {
        return Some(Arc::new(FileSource::new(path)));
    }
    cli.reference_url
        .as_ref()
        .map(|url| Arc::new(HttpSource::new(url)) as Arc<dyn ReferenceSource>)
}

/// Loads the first snapshot; a failure leaves enrichment empty until the next
/// refresh succeeds.
#[tracing::instrument(skip(source), fields(source = %source.describe()))]
async fn initial_snapshot(source: &dyn ReferenceSource) -> ReferenceSnapshot {
    match source.load().await {
        Ok(snapshot) => {
            let stats = snapshot.stats();
            info!(
                stops = stats.stops,
                operators = stats.lines_by_operator.len(),
                "Reference data loaded"
            );
            snapshot
        }
        Err(e) => {
            error!(error = %e, "Reference data load failed, continuing without it");
            ReferenceSnapshot::default()
        }
    }
}

/// Ingestion loop. Runs until Ctrl-C.
async fn run<R: Receiver>(receiver: &mut R, pipeline: &mut Pipeline, cli: &Cli) {
    let summary_every = Duration::from_secs_f64(cli.refresh);
    let mut last_summary = Instant::now();
    let mut received_since_summary: u64 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(summary_every_secs = cli.refresh, "Listening, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
            polled = receiver.poll(POLL_TIMEOUT) => match polled {
                Ok(Some(message)) => {
                    received_since_summary += 1;
                    let outcome = pipeline.handle(&message);
                    debug!(?outcome, "Message handled");
                }
                Ok(None) => {}
                Err(e) => pipeline.record_error(&PipelineError::from(e)),
            }
        }

        if last_summary.elapsed() >= summary_every {
            summarize(pipeline, cli, received_since_summary);
            received_since_summary = 0;
            last_summary = Instant::now();
        }
    }
}

fn summarize(pipeline: &mut Pipeline, cli: &Cli, received: u64) {
    let evicted = pipeline.ledger_mut().cleanup_finished();
    if evicted > 0 {
        debug!(evicted, "Finished vehicles evicted");
    }

    if received == 0 {
        warn!(interval_secs = cli.refresh, "No messages received during the last interval");
    }

    let line = cli.line.as_deref();
    log_vehicles(pipeline.ledger(), line, cli.limit, cli.bucket);
    log_summary(pipeline.ledger(), pipeline.stats(), &pipeline.recent_errors());

    if let Some(path) = &cli.stats_csv {
        if let Err(e) = append_record(path, &pipeline.stats().summary()) {
            error!(path = %path, error = %e, "Failed to write stats row");
        }
    }
}
