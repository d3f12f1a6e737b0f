//! Logbridge CLI
//!
//! Command-line interface for the Logbridge log datasource: local step,
//! interval and timestamp tooling, a stream decoder, and a client for the
//! API server.
//!
//! # Usage
//!
//! ```bash
//! logbridge --help
//! logbridge health --datasource
//! logbridge query '_stream:{app="api"} error' --from now-6h
//! logbridge step --from now-2d --to now --max-data-points 100
//! logbridge rate-interval 20s --scrape-interval 10s
//! logbridge time 2024-05-01T12:00:00+02:00
//! logbridge decode --file response.ndjson --max-lines 10
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shared::frame::StreamDecoder;
use shared::query::{
    DataQuery, LogsqlSelectorParser, QueryBatch, RawTimeRange, TimeRange, DEFAULT_MAX_LINES,
    MAX_LINES_LIMIT,
};
use shared::step::{calculate_rate_interval, calculate_step, resolve_interval, DEFAULT_MAX_DATA_POINTS};
use shared::time::{format_duration, parse_duration, parse_instant};
use std::io::Read;
use std::path::PathBuf;

/// Logbridge CLI - log datasource tooling
#[derive(Parser)]
#[command(name = "logbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "LOGBRIDGE_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API server health
    Health {
        /// Check the log backend through the datasource instead
        #[arg(short, long)]
        datasource: bool,
    },

    /// Run a log query through the API server
    Query {
        /// Query expression
        expr: String,

        /// Query identifier
        #[arg(long, default_value = "A")]
        ref_id: String,

        /// Start of the time range
        #[arg(long, default_value = "now-1h")]
        from: String,

        /// End of the time range
        #[arg(long, default_value = "now")]
        to: String,

        /// Maximum number of log lines
        #[arg(
            short = 'n',
            long,
            default_value_t = DEFAULT_MAX_LINES,
            value_parser = clap::value_parser!(u64).range(1..=MAX_LINES_LIMIT)
        )]
        max_lines: u64,

        /// Query-level minimum interval, e.g. 30s
        #[arg(short, long, default_value = "")]
        interval: String,
    },

    /// Print the step chosen for a time range
    Step {
        /// Start of the time range
        #[arg(long, default_value = "now-1h")]
        from: String,

        /// End of the time range
        #[arg(long, default_value = "now")]
        to: String,

        /// Minimum interval
        #[arg(short, long, default_value = "15s")]
        interval: String,

        /// Points budget of the panel
        #[arg(short, long, default_value_t = DEFAULT_MAX_DATA_POINTS)]
        max_data_points: u64,
    },

    /// Print the rate window for an interval and scrape interval
    RateInterval {
        /// Query interval
        interval: String,

        /// Backend scrape interval; empty means 15s
        #[arg(short, long, default_value = "")]
        scrape_interval: String,
    },

    /// Resolve a timestamp expression to RFC3339
    Time {
        /// Timestamp, e.g. now-1h, 2024-05-01 or 1714564800
        input: String,
    },

    /// Normalise a duration expression
    Duration {
        /// Duration, e.g. 1h30m or 90
        input: String,
    },

    /// Decode a newline-delimited log response into a frame
    Decode {
        /// File to read; standard input when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Rows each label column is filled to
        #[arg(
            short = 'n',
            long,
            default_value_t = DEFAULT_MAX_LINES,
            value_parser = clap::value_parser!(u64).range(..=MAX_LINES_LIMIT)
        )]
        max_lines: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Some(Commands::Health { datasource }) => health(&cli.api_url, datasource).await?,
        Some(Commands::Query {
            expr,
            ref_id,
            from,
            to,
            max_lines,
            interval,
        }) => {
            let query = DataQuery::new(ref_id, expr)
                .with_max_lines(max_lines)
                .with_interval(interval);
            let batch = QueryBatch::new(RawTimeRange::new(from, to), vec![query]);
            run_query(&cli.api_url, &batch).await?
        }
        Some(Commands::Step {
            from,
            to,
            interval,
            max_data_points,
        }) => step(&from, &to, &interval, max_data_points)?,
        Some(Commands::RateInterval {
            interval,
            scrape_interval,
        }) => rate_interval(&interval, &scrape_interval)?,
        Some(Commands::Time { input }) => time(&input)?,
        Some(Commands::Duration { input }) => duration(&input)?,
        Some(Commands::Decode { file, max_lines }) => decode(file.as_deref(), max_lines)?,
        None => format!(
            "Logbridge CLI v{}\nUse --help for usage information",
            env!("CARGO_PKG_VERSION")
        ),
    };

    println!("{output}");
    Ok(())
}

async fn health(api_url: &str, datasource: bool) -> Result<String> {
    let path = if datasource {
        "/api/v1/datasource/health"
    } else {
        "/health"
    };
    let url = format!("{}{path}", api_url.trim_end_matches('/'));
    tracing::debug!(%url, "Checking health");

    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = response.status();
    let body: Value = response.json().await.context("invalid health response")?;

    Ok(format!("{status}\n{}", serde_json::to_string_pretty(&body)?))
}

async fn run_query(api_url: &str, batch: &QueryBatch) -> Result<String> {
    let url = format!("{}/api/v1/query", api_url.trim_end_matches('/'));
    tracing::debug!(%url, queries = batch.queries.len(), "Sending query batch");

    let response = reqwest::Client::new()
        .post(&url)
        .json(batch)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()?;
    let body: Value = response.json().await.context("invalid query response")?;

    Ok(serde_json::to_string_pretty(&body)?)
}

fn step(from: &str, to: &str, interval: &str, max_data_points: u64) -> Result<String> {
    let range = TimeRange::parse(from, to, Utc::now())?;
    let floor = resolve_interval(interval, "", 0, std::time::Duration::ZERO)?;
    Ok(format_duration(calculate_step(
        floor,
        range.from,
        range.to,
        max_data_points,
    )))
}

fn rate_interval(interval: &str, scrape_interval: &str) -> Result<String> {
    let interval = parse_duration(interval)?;
    Ok(format_duration(calculate_rate_interval(
        interval,
        scrape_interval,
    )))
}

fn time(input: &str) -> Result<String> {
    let instant = parse_instant(input, Utc::now())?;
    Ok(instant.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn duration(input: &str) -> Result<String> {
    Ok(format_duration(parse_duration(input)?))
}

fn decode(file: Option<&std::path::Path>, max_lines: u64) -> Result<String> {
    let decoder = StreamDecoder::new(&LogsqlSelectorParser, usize::try_from(max_lines)?);
    let frame = match file {
        Some(path) => {
            let reader = std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            decoder.decode_reader(std::io::BufReader::new(reader))?
        }
        None => {
            let mut input = Vec::new();
            std::io::stdin().read_to_end(&mut input)?;
            decoder.decode_slice(&input)?
        }
    };
    Ok(serde_json::to_string_pretty(&frame)?)
}
