//! maf-resolver command-line front end
//!
//! Reads a JSON array of `{artist, track?, album?}` lookups, resolves them,
//! and writes the JSON array of results to stdout in input order. Logs go to
//! stderr. Ctrl-C stops dispatching new lookups; in-flight ones finish.

use anyhow::{Context, Result};
use clap::Parser;
use maf_common::human_time::format_optional_duration;
use maf_resolver::{LookupRequest, ResolverConfig};
use std::io::Read;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for maf-resolver
#[derive(Parser, Debug)]
#[command(name = "maf-resolver")]
#[command(about = "Resolve music artwork candidates from two catalogs")]
#[command(version)]
struct Args {
    /// Config file (overrides MAF_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of lookups; "-" or absent reads stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Concurrent lookups (overrides [batch] max_concurrency)
    #[arg(short = 'j', long, env = "MAF_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn read_requests(input: Option<&PathBuf>) -> Result<Vec<LookupRequest>> {
    let raw = match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("Input must be a JSON array of lookups")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ResolverConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    maf_common::logging::init_tracing(&config.logging)?;

    info!("Starting maf-resolver {}", env!("CARGO_PKG_VERSION"));

    let requests = read_requests(args.input.as_ref())?;
    let runtime = config.build_runtime().context("Failed to build resolver")?;
    let max_concurrency = args
        .max_concurrency
        .map(maf_resolver::orchestrator::effective_concurrency)
        .unwrap_or(runtime.max_concurrency);

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight lookups");
            ctrl_c_token.cancel();
        }
    });

    let results = runtime
        .orchestrator
        .resolve_all_cancellable(&requests, max_concurrency, &cancel_token)
        .await;

    for snapshot in runtime.health.snapshot() {
        info!(
            source = %snapshot.source,
            consecutive_failures = snapshot.consecutive_failures,
            suppressed_for = %format_optional_duration(snapshot.suppressed_for),
            permanently_suppressed = snapshot.permanently_suppressed,
            "Source health"
        );
    }

    let output = if args.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", output);

    Ok(())
}
