use std::sync::Arc;

use clap::Parser;
use metrics::MetricsHandle;
use providers::{EvmProvider, SolanaProvider};
use storage::init_sqlite;
use tokio::task;
use tracing::{info, warn, Level};
use tracker::{Scheduler, TrackedAccount, Tracker};
use uuid::Uuid;

mod config;

use config::{ensure_sqlite_parent_dir, Args};

fn log_startup(args: &Args, run_id: &str) {
    info!(path = %args.sqlite_path, "sqlite path configured");
    info!(address = %args.eth_address, rpc = %args.eth_rpc_url, "ethereum account tracked");
    info!(address = %args.sol_address, rpc = %args.sol_rpc_url, "solana account tracked");
    info!(addr = %args.http_addr, "http bind planned");
    info!(addr = %args.metrics_addr, "metrics bind planned");
    info!(interval_secs = args.poll_interval_secs, "poll interval configured");
    info!(%run_id, "run initialized");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, finishing current tick");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    args.validate()?;
    info!(sqlite = %args.sqlite_path, http = %args.http_addr, "booting trackerd");

    ensure_sqlite_parent_dir(&args.sqlite_path)?;

    let run_id = Uuid::new_v4().to_string();
    let store = init_sqlite(&args.sqlite_path).await?;
    log_startup(&args, &run_id);

    let missing = store.validate_required_tables().await?;
    if !missing.is_empty() {
        warn!(objects = ?missing, "sqlite missing required schema objects");
    }

    let ethereum = EvmProvider::new(&args.eth_rpc_url, args.rpc_timeout())?;
    let solana = SolanaProvider::new(&args.sol_rpc_url, args.rpc_timeout());
    let tracker = Tracker::new(
        store,
        TrackedAccount::new(args.eth_address.clone(), Arc::new(ethereum)),
        TrackedAccount::new(args.sol_address.clone(), Arc::new(solana)),
    );

    let metrics = MetricsHandle::new();
    let metrics_addr = args.metrics_addr;
    let metrics_task = metrics.clone();
    task::spawn(async move {
        if let Err(err) = metrics_task.serve(metrics_addr).await {
            tracing::error!(error = ?err, "metrics server error");
        }
    });

    let queries = tracker.queries();
    let http_addr = args.http_addr;
    task::spawn(async move {
        if let Err(err) = api::serve(queries, http_addr).await {
            tracing::error!(error = ?err, "http api server error");
        }
    });

    let mut recorder = tracker.recorder();
    if let Some(timeout) = args.tick_timeout() {
        recorder = recorder.with_tick_timeout(timeout);
    }
    let scheduler = Scheduler::new(recorder, args.poll_interval()).with_metrics(metrics);

    info!(%run_id, "ready");
    scheduler.run_until(shutdown_signal()).await;
    info!(%run_id, "stopped");
    Ok(())
}
