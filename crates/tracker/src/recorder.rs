use std::time::Duration;

use providers::{Amount, ProviderError};
use storage::SnapshotId;
use tracing::{info, warn};

use crate::{now_ms, Tracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Recorded(SnapshotId),
    ProviderFailed,
    StorageFailed,
}

#[derive(Debug)]
struct Readings {
    ethereum: Amount,
    solana: Amount,
    gas_price: Option<Amount>,
}

/// Turns one tick into at most one snapshot row.
///
/// All remote reads are gathered first; the row is written only when every
/// read succeeded, so a snapshot never carries one balance without the other.
#[derive(Clone)]
pub struct Recorder {
    tracker: Tracker,
    tick_timeout: Option<Duration>,
}

impl Recorder {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            tick_timeout: None,
        }
    }

    /// Bounds the gather phase; a tick that overruns counts as a provider failure.
    pub fn with_tick_timeout(mut self, timeout: Duration) -> Self {
        self.tick_timeout = Some(timeout);
        self
    }

    pub async fn record_snapshot(&self) -> TickOutcome {
        let gathered = match self.tick_timeout {
            Some(limit) => tokio::time::timeout(limit, self.gather())
                .await
                .unwrap_or(Err(ProviderError::Timeout(limit))),
            None => self.gather().await,
        };

        let readings = match gathered {
            Ok(readings) => readings,
            Err(err) => {
                warn!(error = %err, "tick aborted, snapshot skipped");
                return TickOutcome::ProviderFailed;
            }
        };

        let ts_ms = now_ms();
        let eth = readings.ethereum.as_f64();
        let sol = readings.solana.as_f64();
        match self.tracker.store.append(ts_ms, eth, sol).await {
            Ok(id) => {
                info!(
                    id = id.0,
                    ts_ms,
                    ethereum = %readings.ethereum,
                    solana = %readings.solana,
                    gas_gwei = ?readings.gas_price.map(|g| g.to_string()),
                    "snapshot recorded"
                );
                TickOutcome::Recorded(id)
            }
            Err(err) => {
                warn!(error = %err, ts_ms, "failed to persist snapshot");
                TickOutcome::StorageFailed
            }
        }
    }

    async fn gather(&self) -> Result<Readings, ProviderError> {
        let ethereum = &self.tracker.ethereum;
        let solana = &self.tracker.solana;
        let (eth, sol, gas) = tokio::join!(
            ethereum.provider.balance(&ethereum.address),
            solana.provider.balance(&solana.address),
            ethereum.provider.gas_price(),
        );

        Ok(Readings {
            ethereum: eth?,
            solana: sol?,
            gas_price: gas?,
        })
    }
}
