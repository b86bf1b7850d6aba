//! Remote balance sources for the tracked accounts.
//!
//! Ethereum goes through an alloy HTTP provider, Solana through the
//! nonblocking `solana-client`. Amounts come back as integer base units and
//! are rendered in the chain's native unit with alloy's `format_units`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use alloy::primitives::utils::format_units;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod evm;
pub mod solana;

pub use alloy::primitives::U256;
pub use evm::EvmProvider;
pub use solana::SolanaProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Solana,
}

impl Chain {
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Solana => "solana",
        }
    }

    /// Decimals between the smallest unit and the native unit.
    pub fn decimals(self) -> u8 {
        match self {
            Chain::Ethereum => 18,
            Chain::Solana => 9,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{chain} rpc request failed: {message}")]
    Rpc { chain: Chain, message: String },
    #[error("invalid {chain} address `{address}`: {reason}")]
    InvalidAddress {
        chain: Chain,
        address: String,
        reason: String,
    },
    #[error("invalid {chain} rpc url `{url}`: {reason}")]
    InvalidUrl {
        chain: Chain,
        url: String,
        reason: String,
    },
    #[error("balance query timed out after {0:?}")]
    Timeout(Duration),
}

/// An amount held as integer base units (wei, lamports, gwei-scaled fees).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    raw: U256,
    decimals: u8,
}

impl Amount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn from_u128(raw: u128, decimals: u8) -> Self {
        Self::new(U256::from(raw), decimals)
    }

    /// Exact decimal rendering padded to the full unit width,
    /// e.g. `1.500000000` for 1.5 SOL.
    pub fn to_decimal_string(&self) -> String {
        // format_units only rejects decimals above 77
        format_units(self.raw, self.decimals).unwrap_or_else(|_| self.raw.to_string())
    }

    /// Lossy conversion for storage and averaging.
    pub fn as_f64(&self) -> f64 {
        self.to_decimal_string().parse().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn balance(&self, address: &str) -> Result<Amount, ProviderError>;

    /// Current fee estimate, for chains that have one worth reporting.
    async fn gas_price(&self) -> Result<Option<Amount>, ProviderError> {
        Ok(None)
    }
}

/// Runs one remote call under `limit`, mapping client errors onto `chain`.
pub(crate) async fn with_deadline<T, E, F>(
    chain: Chain,
    limit: Duration,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ProviderError::Rpc {
            chain,
            message: err.to_string(),
        }),
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}
