//! Snapshot recording and the read-side views over the balance log.
//!
//! A [`Tracker`] is built once at startup and shared by the [`Scheduler`]
//! (the only writer) and the [`QueryService`] (readers).

use std::sync::Arc;

use providers::{BalanceProvider, ProviderError};
use storage::{StorageError, Store};
use thiserror::Error;

pub mod query;
pub mod recorder;
pub mod scheduler;

pub use query::{ActivitySummary, CurrentStats, HistoryPoint, HistoryView, QueryService};
pub use recorder::{Recorder, TickOutcome};
pub use scheduler::Scheduler;

pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One watched address and the provider that can price it.
#[derive(Clone)]
pub struct TrackedAccount {
    pub address: String,
    pub provider: Arc<dyn BalanceProvider>,
}

impl TrackedAccount {
    pub fn new(address: impl Into<String>, provider: Arc<dyn BalanceProvider>) -> Self {
        Self {
            address: address.into(),
            provider,
        }
    }
}

/// Process-wide context: the store plus both tracked accounts. Ethereum is
/// the gas-price source.
#[derive(Clone)]
pub struct Tracker {
    pub store: Store,
    pub ethereum: TrackedAccount,
    pub solana: TrackedAccount,
}

impl Tracker {
    pub fn new(store: Store, ethereum: TrackedAccount, solana: TrackedAccount) -> Self {
        Self {
            store,
            ethereum,
            solana,
        }
    }

    pub fn recorder(&self) -> Recorder {
        Recorder::new(self.clone())
    }

    pub fn queries(&self) -> QueryService {
        QueryService::new(self.clone())
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
