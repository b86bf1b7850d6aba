#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use providers::{Amount, BalanceProvider, Chain, ProviderError};
use storage::Store;
use tracker::{TrackedAccount, Tracker};

pub const ETH_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
pub const SOL_ADDRESS: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

/// Provider returning a configurable balance, or failing on demand.
pub struct ScriptedProvider {
    chain: Chain,
    balance: Mutex<u128>,
    gas: Option<u128>,
    fail_balance: AtomicBool,
    fail_gas: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(chain: Chain, raw_balance: u128) -> Self {
        Self {
            chain,
            balance: Mutex::new(raw_balance),
            gas: None,
            fail_balance: AtomicBool::new(false),
            fail_gas: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_gas(mut self, raw_gwei: u128) -> Self {
        self.gas = Some(raw_gwei);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_balance(&self, raw: u128) {
        *self.balance.lock().unwrap() = raw;
    }

    pub fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gas(&self, fail: bool) {
        self.fail_gas.store(fail, Ordering::SeqCst);
    }

    pub fn balance_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn rpc_failure(&self) -> ProviderError {
        ProviderError::Rpc {
            chain: self.chain,
            message: "node unavailable".into(),
        }
    }
}

#[async_trait]
impl BalanceProvider for ScriptedProvider {
    async fn balance(&self, _address: &str) -> Result<Amount, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(self.rpc_failure());
        }
        let raw = *self.balance.lock().unwrap();
        Ok(Amount::from_u128(raw, self.chain.decimals()))
    }

    async fn gas_price(&self) -> Result<Option<Amount>, ProviderError> {
        if self.fail_gas.load(Ordering::SeqCst) {
            return Err(self.rpc_failure());
        }
        Ok(self.gas.map(|raw| Amount::from_u128(raw, 9)))
    }
}

pub const ONE_ETH: u128 = 1_000_000_000_000_000_000;
pub const ONE_SOL: u128 = 1_000_000_000;

pub struct Harness {
    pub tracker: Tracker,
    pub eth: Arc<ScriptedProvider>,
    pub sol: Arc<ScriptedProvider>,
}

pub async fn harness() -> Harness {
    harness_with(
        ScriptedProvider::new(Chain::Ethereum, ONE_ETH).with_gas(20_000_000_000),
        ScriptedProvider::new(Chain::Solana, 2 * ONE_SOL),
    )
    .await
}

pub async fn harness_with(eth: ScriptedProvider, sol: ScriptedProvider) -> Harness {
    let store = Store::in_memory().await.expect("memory store");
    let eth = Arc::new(eth);
    let sol = Arc::new(sol);
    let tracker = Tracker::new(
        store,
        TrackedAccount::new(ETH_ADDRESS, eth.clone()),
        TrackedAccount::new(SOL_ADDRESS, sol.clone()),
    );
    Harness { tracker, eth, sol }
}
