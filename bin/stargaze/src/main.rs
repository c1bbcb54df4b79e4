//! Stargaze - scan a GitHub user's starred repositories as rows.
//!
//! # Usage
//!
//! ```bash
//! # All stars of a user, newest first, as JSON lines
//! GITHUB_TOKEN=ghp_... stargaze octocat --order-by starred_at --desc --format json
//!
//! # First 20 rows, two requests per second
//! stargaze octocat --limit 20 --rate-interval-ms 500
//! ```

use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt};

use stargaze_core::error::{LimiterError, ScanError};
use stargaze_core::metrics::init_metrics;
use stargaze_core::ports::{Advance, RateLimiter, RowSource, Shutdown};
use stargaze_core::schema::{Column, TABLE_NAME, Value};
use stargaze_core::services::{
    Constraint, OrderBy, RateLimiterConfig, ScanConfig, StarredReposIterator, TokenBucket,
    Unlimited, plan_scan,
};
use stargaze_github::{DEFAULT_ENDPOINT, GitHubClient, GitHubClientConfig};

/// Output format for rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// Tab-separated with a header line.
    Table,
    /// One JSON object per row.
    Json,
}

/// Stargaze CLI - GitHub starred repositories as a table.
#[derive(Parser, Debug)]
#[command(name = "stargaze")]
#[command(about = "Scan a GitHub user's starred repositories as rows")]
#[command(version)]
struct Cli {
    /// Login whose starred repositories are scanned.
    #[arg(env = "GITHUB_LOGIN")]
    login: String,

    /// GitHub personal access token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub GraphQL endpoint.
    #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Edges requested per page (1-100).
    #[arg(long, default_value_t = 100)]
    per_page: u32,

    /// Minimum spacing between page requests in milliseconds (0 disables
    /// rate limiting).
    #[arg(long, env = "RATE_INTERVAL_MS", default_value_t = 1000)]
    rate_interval_ms: u64,

    /// Requests allowed back to back before spacing applies.
    #[arg(long, env = "RATE_BURST", default_value_t = 1)]
    burst: u32,

    /// Column to order by. Only a single `starred_at` is pushed down;
    /// anything else keeps the remote default order.
    #[arg(long, value_parser = parse_column)]
    order_by: Vec<Column>,

    /// Sort descending.
    #[arg(long)]
    desc: bool,

    /// Stop after this many rows.
    #[arg(long)]
    limit: Option<usize>,

    /// Output format: table or json.
    #[arg(long, default_value = "table", value_parser = parse_format)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

/// Parse a column name.
fn parse_column(s: &str) -> Result<Column, String> {
    Column::from_name(s).ok_or_else(|| {
        let names: Vec<_> = Column::ALL.iter().map(|c| c.name()).collect();
        format!("Unknown column '{}'. Use one of: {}.", s, names.join(", "))
    })
}

/// Parse output format from string.
fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "table" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!("Invalid format '{}'. Use 'table' or 'json'.", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    if let Some(port) = cli.metrics_port {
        let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
        match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => {
                init_metrics();
                info!("📊 Metrics exporter listening on http://{}/metrics", addr);
            }
            Err(e) => warn!("⚠️  Failed to start metrics exporter: {}. Continuing without metrics.", e),
        }
    }

    let client = GitHubClient::new(GitHubClientConfig {
        endpoint: cli.endpoint.clone(),
        token: cli.token.clone(),
        ..Default::default()
    })
    .context("Failed to build GitHub client")?;
    if cli.token.is_none() {
        warn!("⚠️  No GITHUB_TOKEN set, GitHub will reject unauthenticated GraphQL requests");
    }

    let limiter: Arc<dyn RateLimiter> = if cli.rate_interval_ms == 0 {
        Arc::new(Unlimited)
    } else {
        Arc::new(
            TokenBucket::new(RateLimiterConfig {
                interval: Duration::from_millis(cli.rate_interval_ms),
                burst: cli.burst,
            })
            .context("Invalid rate limiter settings")?,
        )
    };

    info!("📡 Scanning stars of {} via {}", cli.login, client.endpoint());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        debug!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = scan(&cli, Arc::new(client), limiter, Shutdown::new(shutdown_rx), &mut out).await;
    out.flush()?;

    match result {
        Ok(rows) => {
            info!("✅ Scan complete: {} row(s)", rows);
            Ok(())
        }
        Err(e) if is_cancelled(&e) => {
            info!("🛑 Scan cancelled");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Plan the scan the way a host engine would, then pull rows until the
/// source ends or the limit is reached.
#[instrument(skip_all, fields(login = %cli.login))]
async fn scan<W: Write>(
    cli: &Cli,
    client: Arc<GitHubClient>,
    limiter: Arc<dyn RateLimiter>,
    shutdown: Shutdown,
    out: &mut W,
) -> Result<usize> {
    if cli.login.is_empty() {
        bail!("login cannot be empty");
    }

    let constraints = [Constraint::eq(Column::Login, Value::Text(cli.login.clone()))];
    let order_bys: Vec<_> = cli
        .order_by
        .iter()
        .map(|&column| OrderBy::new(column, cli.desc))
        .collect();

    let plan = plan_scan(&constraints, &order_bys)?;
    if !order_bys.is_empty() && !plan.order_satisfied {
        warn!("⚠️  Requested ordering cannot be pushed down; rows follow the remote default order");
    }

    let mut rows = StarredReposIterator::new(
        plan,
        ScanConfig {
            per_page: cli.per_page,
        },
        client,
        limiter,
        shutdown,
    )?;

    let columns: Vec<Column> = rows
        .schema()
        .iter()
        .filter(|def| !def.hidden)
        .map(|def| def.column)
        .collect();

    if cli.format == OutputFormat::Table {
        let header: Vec<_> = columns.iter().map(|c| c.name()).collect();
        writeln!(out, "{}", header.join("\t"))?;
    }

    let mut count = 0;
    while cli.limit.is_none_or(|limit| count < limit) {
        if rows.advance().await? == Advance::End {
            break;
        }
        write_row(out, cli.format, &rows, &columns)?;
        count += 1;
    }

    debug!(table = TABLE_NAME, rows = count, pages = rows.pages_fetched(), "Scan finished");
    Ok(count)
}

/// Write the current row.
fn write_row<W: Write, R: RowSource + ?Sized>(
    out: &mut W,
    format: OutputFormat,
    rows: &R,
    columns: &[Column],
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let cells = columns
                .iter()
                .map(|&c| rows.value_at(c).map(|v| table_cell(&v)))
                .collect::<Result<Vec<_>, _>>()?;
            writeln!(out, "{}", cells.join("\t"))?;
        }
        OutputFormat::Json => {
            let mut object = serde_json::Map::new();
            for &column in columns {
                let value = serde_json::to_value(rows.value_at(column)?)?;
                object.insert(column.name().to_string(), value);
            }
            writeln!(out, "{}", serde_json::Value::Object(object))?;
        }
    }
    Ok(())
}

/// Render a cell for tab-separated output.
fn table_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string().replace(['\t', '\n', '\r'], " "),
    }
}

/// Whether an error chain ends in a cancelled rate-limit wait.
fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::RateLimit(LimiterError::Cancelled))
    )
}

/// Initialize tracing subscriber. Logs go to stderr so stdout carries rows.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
