use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{with_deadline, Amount, BalanceProvider, Chain, ProviderError};

pub struct SolanaProvider {
    client: RpcClient,
    timeout: Duration,
}

impl SolanaProvider {
    pub fn new(rpc_url: &str, timeout: Duration) -> Self {
        Self {
            client: RpcClient::new_with_timeout(rpc_url.to_string(), timeout),
            timeout,
        }
    }
}

#[async_trait]
impl BalanceProvider for SolanaProvider {
    async fn balance(&self, address: &str) -> Result<Amount, ProviderError> {
        let pubkey = parse_address(address)?;
        let lamports = with_deadline(Chain::Solana, self.timeout, self.client.get_balance(&pubkey))
            .await?;
        debug!(%pubkey, lamports, "solana balance fetched");
        Ok(Amount::from_u128(u128::from(lamports), Chain::Solana.decimals()))
    }
}

/// Decodes a base58 public key; anything that is not exactly 32 bytes is rejected.
pub fn parse_address(address: &str) -> Result<Pubkey, ProviderError> {
    Pubkey::from_str(address).map_err(|err| ProviderError::InvalidAddress {
        chain: Chain::Solana,
        address: address.to_string(),
        reason: err.to_string(),
    })
}
