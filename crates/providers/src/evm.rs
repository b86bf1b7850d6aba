use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::debug;

use crate::{with_deadline, Amount, BalanceProvider, Chain, ProviderError};

const GWEI_DECIMALS: u8 = 9;

/// Ethereum-compatible node reached through an alloy HTTP provider.
pub struct EvmProvider {
    provider: DynProvider,
    timeout: Duration,
}

impl EvmProvider {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let url = rpc_url
            .parse::<Url>()
            .map_err(|err| ProviderError::InvalidUrl {
                chain: Chain::Ethereum,
                url: rpc_url.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            provider: ProviderBuilder::new().connect_http(url).erased(),
            timeout,
        })
    }
}

#[async_trait]
impl BalanceProvider for EvmProvider {
    async fn balance(&self, address: &str) -> Result<Amount, ProviderError> {
        let address = parse_address(address)?;
        let wei = with_deadline(Chain::Ethereum, self.timeout, async {
            self.provider.get_balance(address).await
        })
        .await?;
        debug!(%address, %wei, "ethereum balance fetched");
        Ok(Amount::new(wei, Chain::Ethereum.decimals()))
    }

    /// Reported in gwei.
    async fn gas_price(&self) -> Result<Option<Amount>, ProviderError> {
        let wei = with_deadline(Chain::Ethereum, self.timeout, async {
            self.provider.get_gas_price().await
        })
        .await?;
        Ok(Some(Amount::from_u128(wei, GWEI_DECIMALS)))
    }
}

pub fn parse_address(address: &str) -> Result<Address, ProviderError> {
    address
        .parse::<Address>()
        .map_err(|err| ProviderError::InvalidAddress {
            chain: Chain::Ethereum,
            address: address.to_string(),
            reason: err.to_string(),
        })
}
