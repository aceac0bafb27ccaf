//! Balance sourcing
//!
//! The engine never subscribes to a stream: callers decide when to refresh,
//! and every refresh produces a whole new [`BalanceSnapshot`] with a higher
//! version. The chain-backed source reads the wallet balances, the escrow
//! account and the operator approval record in one pass.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethereum_types::U256;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};

use super::contracts;
use super::snapshot::BalanceSnapshot;

/// Supplier of point-in-time balance snapshots
///
/// `fetch` is the explicit refresh trigger; `latest_version` is what the
/// executor checks a plan against before submitting anything.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Fetch a fresh snapshot, advancing the version counter
    async fn fetch(&self) -> Result<BalanceSnapshot>;

    /// Version of the most recently fetched snapshot (0 before the first)
    fn latest_version(&self) -> u64;
}

/// Chain-backed balance source reading over JSON-RPC
pub struct ChainBalanceSource {
    provider: Provider<Http>,
    /// Wallet whose balances and approvals are snapshotted
    owner: Address,
    usdfc: Address,
    payments: Address,
    operator: Address,
    version: AtomicU64,
}

impl ChainBalanceSource {
    pub fn new(
        provider: Provider<Http>,
        owner: Address,
        usdfc: Address,
        payments: Address,
        operator: Address,
    ) -> Self {
        Self {
            provider,
            owner,
            usdfc,
            payments,
            operator,
            version: AtomicU64::new(0),
        }
    }

    /// Read-only contract call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| anyhow!("contract call to {:?} failed: {}", to, e))
    }

    async fn usdfc_balance(&self) -> Result<U256> {
        let data = contracts::erc20().encode("balanceOf", self.owner)?;
        let raw = self.call(self.usdfc, data).await?;
        contracts::erc20()
            .decode_output("balanceOf", raw)
            .context("decoding balanceOf output")
    }

    /// Escrow account record: (funds, lockup_current, lockup_rate, lockup_last_settled_at)
    async fn escrow_account(&self) -> Result<(U256, U256, U256, U256)> {
        let data = contracts::payments().encode("accounts", (self.usdfc, self.owner))?;
        let raw = self.call(self.payments, data).await?;
        contracts::payments()
            .decode_output("accounts", raw)
            .context("decoding accounts output")
    }

    /// Operator approval record:
    /// (approved, rate_allowance, lockup_allowance, rate_usage, lockup_usage, max_lockup_period)
    async fn operator_approval(&self) -> Result<(bool, U256, U256, U256, U256, U256)> {
        let data = contracts::payments().encode(
            "operatorApprovals",
            (self.usdfc, self.owner, self.operator),
        )?;
        let raw = self.call(self.payments, data).await?;
        contracts::payments()
            .decode_output("operatorApprovals", raw)
            .context("decoding operatorApprovals output")
    }
}

#[async_trait]
impl BalanceSource for ChainBalanceSource {
    async fn fetch(&self) -> Result<BalanceSnapshot> {
        let fil_balance = self
            .provider
            .get_balance(self.owner, None)
            .await
            .context("fetching native balance")?;
        let usdfc_balance = self.usdfc_balance().await?;
        let (funds, _lockup_current, _lockup_rate, _settled_at) = self.escrow_account().await?;
        let (_approved, rate_allowance, lockup_allowance, rate_usage, lockup_usage, _max_period) =
            self.operator_approval().await?;

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = BalanceSnapshot {
            version,
            fetched_at: chrono::Utc::now().timestamp() as u64,
            fil_balance,
            usdfc_balance,
            warm_storage_balance: funds,
            current_rate_allowance: rate_allowance,
            current_rate_used: rate_usage,
            current_lockup_allowance: lockup_allowance,
            current_lockup_used: lockup_usage,
        };
        debug!(
            "fetched balance snapshot v{}: fil={} usdfc={} escrow={} rate={}/{} lockup={}/{}",
            snapshot.version,
            snapshot.fil_balance,
            snapshot.usdfc_balance,
            snapshot.warm_storage_balance,
            snapshot.current_rate_used,
            snapshot.current_rate_allowance,
            snapshot.current_lockup_used,
            snapshot.current_lockup_allowance,
        );
        Ok(snapshot)
    }

    fn latest_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
