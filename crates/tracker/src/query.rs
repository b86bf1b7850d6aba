use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::{now_ms, Tracker, TrackerError};

pub const DEFAULT_HISTORY_HOURS: f64 = 24.0;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumStats {
    pub balance: String,
    pub gas_price: Option<String>,
    pub change: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolanaStats {
    pub balance: String,
    pub change: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentBalances {
    pub ethereum: EthereumStats,
    pub solana: SolanaStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingMetrics {
    pub snapshots_recorded: i64,
    pub tracking_since: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentStats {
    pub current: CurrentBalances,
    pub metrics: TrackingMetrics,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub date: String,
    pub ethereum: f64,
    pub solana: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub history: Vec<HistoryPoint>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub last24h: i64,
    pub last7d: i64,
    pub total: i64,
    pub avg_ethereum: Option<f64>,
    pub avg_solana: Option<f64>,
}

/// Read-only views over the balance log and the live providers.
#[derive(Clone)]
pub struct QueryService {
    tracker: Tracker,
}

impl QueryService {
    pub fn new(tracker: Tracker) -> Self {
        Self { tracker }
    }

    /// Live balances and gas price, with change measured between the oldest
    /// and newest stored snapshots.
    pub async fn current_stats(&self) -> Result<CurrentStats, TrackerError> {
        let ethereum = &self.tracker.ethereum;
        let solana = &self.tracker.solana;
        let (eth, sol, gas) = tokio::join!(
            ethereum.provider.balance(&ethereum.address),
            solana.provider.balance(&solana.address),
            ethereum.provider.gas_price(),
        );
        let (eth, sol, gas) = (eth?, sol?, gas?);

        let store = &self.tracker.store;
        let first = store.first().await?;
        let latest = store.latest().await?;
        let total = store.count().await?;

        let (eth_change, sol_change) = match (&first, &latest) {
            (Some(first), Some(latest)) => (
                percentage_change(first.eth_balance, latest.eth_balance),
                percentage_change(first.sol_balance, latest.sol_balance),
            ),
            _ => (0.0, 0.0),
        };

        Ok(CurrentStats {
            current: CurrentBalances {
                ethereum: EthereumStats {
                    balance: eth.to_decimal_string(),
                    gas_price: gas.map(|g| g.to_decimal_string()),
                    change: format_change(eth_change),
                },
                solana: SolanaStats {
                    balance: sol.to_decimal_string(),
                    change: format_change(sol_change),
                },
            },
            metrics: TrackingMetrics {
                snapshots_recorded: total,
                tracking_since: first.map(|s| iso_date(s.timestamp)),
            },
            timestamp: iso_date(now_ms()),
        })
    }

    /// `hours` is the raw query value; anything that is not a positive
    /// number means the last 24 hours.
    pub async fn history(&self, hours: Option<&str>) -> Result<HistoryView, TrackerError> {
        self.history_at(now_ms(), parse_hours(hours)).await
    }

    pub async fn history_at(&self, now_ms: i64, hours: f64) -> Result<HistoryView, TrackerError> {
        let window_ms = (hours * HOUR_MS as f64) as i64;
        let rows = self
            .tracker
            .store
            .range_since(now_ms.saturating_sub(window_ms))
            .await?;
        let history: Vec<HistoryPoint> = rows
            .into_iter()
            .map(|row| HistoryPoint {
                timestamp: row.timestamp,
                date: iso_date(row.timestamp),
                ethereum: row.eth_balance,
                solana: row.sol_balance,
            })
            .collect();
        Ok(HistoryView {
            count: history.len(),
            history,
        })
    }

    pub async fn activity(&self) -> Result<ActivitySummary, TrackerError> {
        self.activity_at(now_ms()).await
    }

    pub async fn activity_at(&self, now_ms: i64) -> Result<ActivitySummary, TrackerError> {
        let store = &self.tracker.store;
        let averages = store.average_since(now_ms - WEEK_MS).await?;
        Ok(ActivitySummary {
            last24h: store.count_since(now_ms - DAY_MS).await?,
            last7d: store.count_since(now_ms - WEEK_MS).await?,
            total: store.count().await?,
            avg_ethereum: averages.map(|a| a.eth),
            avg_solana: averages.map(|a| a.sol),
        })
    }
}

/// Percent change from `baseline`; a zero baseline yields 0 rather than
/// an infinite or NaN result.
pub fn percentage_change(baseline: f64, latest: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    let change = (latest - baseline) / baseline * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

pub fn format_change(change: f64) -> String {
    format!("{change:.2}")
}

pub fn parse_hours(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|hours| hours.is_finite() && *hours > 0.0)
        .unwrap_or(DEFAULT_HISTORY_HOURS)
}

/// Milliseconds since the epoch as `2024-01-01T00:00:00.000Z`.
pub fn iso_date(ts_ms: i64) -> String {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}
