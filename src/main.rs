use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rusty_archive_query::constants::VERSION;
use rusty_archive_query::{
    execute_query, ArchiverClient, ArchiverError, Config, DataFormat, QueryModel, Result, TimeRange,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "archive-query")]
#[command(version)]
#[command(about = "Query EPICS Archiver Appliance PVs and print the resulting series as JSON", long_about = None)]
struct Cli {
    /// Datasource settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Retrieval base URL, overrides the settings file
    #[arg(long)]
    url: Option<String>,

    /// Target expression, e.g. `PV:(A|B):1`
    #[arg(short, long)]
    target: String,

    /// Start of the time range (RFC 3339), defaults to one hour before `--to`
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// End of the time range (RFC 3339), defaults to now
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    #[arg(long)]
    operator: Option<String>,

    /// Resolve the target through the archiver's PV name search
    #[arg(long)]
    regex: bool,

    #[arg(long, default_value = "")]
    alias: String,

    #[arg(long, default_value = "")]
    alias_pattern: String,

    /// Function list as JSON, `[{"def": {...}, "params": [...]}]`
    #[arg(long)]
    functions: Option<String>,

    /// Response format: raw (PB) or json
    #[arg(long)]
    format: Option<DataFormat>,

    #[arg(long)]
    interval_ms: Option<i64>,

    /// Attach live channel paths to the series
    #[arg(long)]
    live: bool,
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json(&tokio::fs::read_to_string(path).await?)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    Ok(config)
}

fn build_query(cli: &Cli, config: &Config) -> Result<QueryModel> {
    let to = cli.to.unwrap_or_else(Utc::now);
    let from = cli.from.unwrap_or(to - Duration::hours(1));
    if from > to {
        return Err(ArchiverError::invalid_request(
            "Invalid time range".to_string(),
            format!("from: {}, to: {}", from, to),
            vec!["from must not be after to".to_string()],
        ));
    }

    let functions: serde_json::Value = match &cli.functions {
        Some(raw) => serde_json::from_str(raw)?,
        None => json!([]),
    };

    let mut request = json!({
        "target": cli.target,
        "alias": cli.alias,
        "aliasPattern": cli.alias_pattern,
        "operator": cli.operator.clone().unwrap_or_default(),
        "regex": cli.regex,
        "live": cli.live || config.use_live_update,
        "functions": functions,
        "refId": "A",
    });
    if let Some(interval_ms) = cli.interval_ms {
        request["intervalMs"] = json!(interval_ms);
    }

    QueryModel::from_value(request, TimeRange::new(from, to), config)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli).await?;
    debug!(url = %config.url, format = ?config.format, "configuration loaded");

    let query = build_query(&cli, &config)?;
    let client = Arc::new(ArchiverClient::new(&config)?);

    let result = execute_query(client, query, config.query_timeout).await;
    println!("{}", serde_json::to_string_pretty(&result.data)?);

    match result.error {
        Some(e) => {
            error!(error = %e, "some targets have failed");
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("Starting archive-query v{}", VERSION);

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "query has failed");
            ExitCode::FAILURE
        }
    }
}
