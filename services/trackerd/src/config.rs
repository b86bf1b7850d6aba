use std::{fs, net::SocketAddr, path::Path, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;

const MEMORY_PREFIX: &str = "sqlite::memory:";
const URL_PREFIX: &str = "sqlite://";

#[derive(Parser, Debug, Clone)]
#[command(name = "trackerd", about = "Records account balance snapshots and serves them over HTTP")]
pub struct Args {
    #[arg(long, env = "SQLITE_PATH", default_value = "sqlite://data/balances.db")]
    pub sqlite_path: String,

    #[arg(long, env = "ETH_RPC_URL", default_value = "https://ethereum-rpc.publicnode.com")]
    pub eth_rpc_url: String,

    #[arg(long, env = "SOL_RPC_URL", default_value = "https://api.mainnet-beta.solana.com")]
    pub sol_rpc_url: String,

    #[arg(long, env = "ETH_ADDRESS")]
    pub eth_address: String,

    #[arg(long, env = "SOL_ADDRESS")]
    pub sol_address: String,

    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = tracker::DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval_secs: u64,

    /// Upper bound on one tick's balance queries; 0 disables it.
    #[arg(long, env = "TICK_TIMEOUT_SECS", default_value_t = 60)]
    pub tick_timeout_secs: u64,

    #[arg(long, env = "RPC_TIMEOUT_SECS", default_value_t = 20)]
    pub rpc_timeout_secs: u64,

    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:3000")]
    pub http_addr: SocketAddr,

    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9109")]
    pub metrics_addr: SocketAddr,
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_sqlite_path(&self.sqlite_path)?;
        providers::evm::parse_address(&self.eth_address).context("--eth-address")?;
        providers::solana::parse_address(&self.sol_address).context("--sol-address")?;
        if self.poll_interval_secs == 0 {
            bail!("poll interval must be at least one second");
        }
        if self.rpc_timeout_secs == 0 {
            bail!("rpc timeout must be at least one second");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn tick_timeout(&self) -> Option<Duration> {
        (self.tick_timeout_secs > 0).then(|| Duration::from_secs(self.tick_timeout_secs))
    }
}

/// Filesystem part of a `sqlite://` URL, without query parameters.
fn sqlite_file_part(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(URL_PREFIX)?;
    Some(rest.split_once('?').map(|(path, _)| path).unwrap_or(rest))
}

pub fn validate_sqlite_path(url: &str) -> anyhow::Result<()> {
    if url.starts_with(MEMORY_PREFIX) {
        return Ok(());
    }
    match sqlite_file_part(url) {
        None => bail!("sqlite path must start with `sqlite://` or use `sqlite::memory:`"),
        Some("") => bail!("sqlite path is missing a filesystem component after `sqlite://`"),
        Some(_) => Ok(()),
    }
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let Some(file) = sqlite_file_part(url) else {
        return Ok(());
    };
    if let Some(parent) = Path::new(file).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating sqlite directory {}", parent.display()))?;
        }
    }
    Ok(())
}
