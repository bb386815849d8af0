use anyhow::Context;
use dotenv::dotenv;
use sharpe_allocator::handlers::{handle_optimization_request, OptimizationRequest};
use sharpe_allocator::RunControl;
use std::fs::File;
use std::io::BufReader;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sharpe-allocator-bin <request.json> [result.json]";

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let request_path = args.next().context(USAGE)?;
    let output_path = args.next();

    let file = File::open(&request_path)
        .with_context(|| format!("Failed to open request file {request_path}"))?;
    let request: OptimizationRequest = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse request file {request_path}"))?;

    // optional wall-clock budget, e.g. from .env
    let mut control = RunControl::new();
    if let Ok(raw) = std::env::var("SHARPE_ALLOCATOR_TIME_LIMIT_SECS") {
        let seconds: f64 = raw
            .parse()
            .with_context(|| format!("SHARPE_ALLOCATOR_TIME_LIMIT_SECS is not a number: {raw}"))?;
        let time_limit = Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("SHARPE_ALLOCATOR_TIME_LIMIT_SECS is out of range: {raw}"))?;
        control = control.with_time_limit(time_limit);
    }

    let start = Instant::now();
    let report = handle_optimization_request(&request, control)?;
    info!(
        status = ?report.outcome.evolution.status,
        best_sharpe = report.outcome.best_fitness(),
        generations = report.outcome.evolution.generations_run,
        "Optimization took {:.2?}",
        start.elapsed()
    );

    let json = serde_json::to_string_pretty(&report)?;
    match output_path {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {path}"))?;
            info!("Result written to {path}");
        }
        None => println!("{json}"),
    }

    Ok(())
}
