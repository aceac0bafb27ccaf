//! Point-in-time balance and allowance snapshot
//!
//! A snapshot is fetched atomically by a [`BalanceSource`](super::source::BalanceSource)
//! and is immutable once produced: a refresh replaces it wholesale with a new
//! value carrying a higher version, never mutates it in place. Every
//! evaluation cycle recomputes its decisions from the freshest snapshot.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};

/// Wallet and contract-side balances at a single point in time
///
/// All amounts are base units (18 decimals). Rate fields are per-epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Strictly increasing per fetch; used to detect stale plans
    pub version: u64,
    /// Unix seconds at fetch time, diagnostics only
    pub fetched_at: u64,
    /// Native token held by the wallet (pays gas)
    pub fil_balance: U256,
    /// Storage stablecoin held by the wallet
    pub usdfc_balance: U256,
    /// Escrow deposited with the storage payments contract
    pub warm_storage_balance: U256,
    /// Per-epoch rate the operator is currently authorized to charge
    pub current_rate_allowance: U256,
    /// Per-epoch rate live deals currently consume
    pub current_rate_used: U256,
    /// Lockup the operator is currently authorized to reserve
    pub current_lockup_allowance: U256,
    /// Lockup currently reserved against live deals
    pub current_lockup_used: U256,
}

/// Storage capacity/retention target the engine maintains
///
/// Sourced from static configuration, not user-editable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTarget {
    /// Desired storage capacity in GB
    pub capacity_gb: u64,
    /// Desired retention window in days
    pub persistence_days: u64,
}

impl StorageTarget {
    pub fn new(capacity_gb: u64, persistence_days: u64) -> Self {
        Self {
            capacity_gb,
            persistence_days,
        }
    }
}

impl From<&crate::config::StorageConfig> for StorageTarget {
    fn from(config: &crate::config::StorageConfig) -> Self {
        Self {
            capacity_gb: config.capacity_gb,
            persistence_days: config.persistence_days,
        }
    }
}
