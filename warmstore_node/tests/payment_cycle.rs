//! Engine cycles against a scripted balance source
//!
//! Exercises the closed loop (fetch → evaluate → plan → execute → refresh)
//! without a chain: the source is scripted, and executor failures are forced
//! through the staleness gate so no network I/O ever happens.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethereum_types::U256;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use warmstore_node::payments::evaluator::rate_for_capacity;
use warmstore_node::payments::{
    evaluate, plan, BalanceSnapshot, BalanceSource, EnsureOutcome, PaymentError, PaymentExecutor,
    StorageManager, StorageTarget, Sufficiency, TokenKind, ValidationError,
};

/// Source replaying a fixed sequence of snapshots
///
/// `version_skew` pushes the advertised latest version ahead of every
/// fetched snapshot, which makes any plan computed from it provably stale.
struct ScriptedSource {
    snapshots: Mutex<VecDeque<BalanceSnapshot>>,
    latest: AtomicU64,
    fetches: AtomicU64,
    version_skew: u64,
}

impl ScriptedSource {
    fn new(snapshots: Vec<BalanceSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
            latest: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            version_skew: 0,
        }
    }

    fn with_version_skew(mut self, skew: u64) -> Self {
        self.version_skew = skew;
        self
    }

    fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for ScriptedSource {
    async fn fetch(&self) -> Result<BalanceSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let snapshot = self
            .snapshots
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted source exhausted"))?;
        self.latest
            .store(snapshot.version + self.version_skew, Ordering::SeqCst);
        Ok(snapshot)
    }

    fn latest_version(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

fn price() -> U256 {
    U256::exp10(18) * U256::from(2u64)
}

fn units(n: u64) -> U256 {
    U256::exp10(18) * U256::from(n)
}

fn target() -> StorageTarget {
    StorageTarget::new(10, 30)
}

fn sufficient_snapshot(version: u64) -> BalanceSnapshot {
    BalanceSnapshot {
        version,
        fetched_at: 1_700_000_000,
        fil_balance: units(5),
        usdfc_balance: units(100),
        warm_storage_balance: units(10),
        current_rate_allowance: rate_for_capacity(price(), 20).unwrap(),
        current_rate_used: rate_for_capacity(price(), 2).unwrap(),
        current_lockup_allowance: units(50),
        current_lockup_used: units(1),
    }
}

fn needs_both_snapshot(version: u64) -> BalanceSnapshot {
    let mut snapshot = sufficient_snapshot(version);
    snapshot.current_rate_allowance = U256::zero();
    snapshot.current_lockup_allowance = U256::zero();
    snapshot.warm_storage_balance = U256::zero();
    snapshot
}

fn offline_executor(source: Arc<dyn BalanceSource>) -> PaymentExecutor {
    let provider = Provider::<Http>::try_from("http://127.0.0.1:8545").unwrap();
    let wallet: LocalWallet = "4c0883a69102937d6231471b5dbb6204fe512961708279f2e3e8a5d4b8e3e5f4"
        .parse()
        .unwrap();
    PaymentExecutor::new(
        provider,
        wallet,
        source,
        "0xb3042734b608a1B16e9e86B374A3f3e389B4cDf0".parse().unwrap(),
        "0x0E690D3e60B0576D01352AB03b258115eb84A047".parse().unwrap(),
        "0x394feCa6bCB84502d93c0c5C03c620ba8897e8f4".parse().unwrap(),
        U256::from(86_400u64),
        1,
    )
}

#[tokio::test]
async fn test_sufficient_account_needs_no_action() {
    let source = Arc::new(ScriptedSource::new(vec![sufficient_snapshot(1)]));
    let mut manager = StorageManager::new(source.clone(), None, target(), price());
    match manager.ensure_storage().await.unwrap() {
        EnsureOutcome::AlreadySufficient(report) => {
            assert_eq!(report.sufficiency, Sufficiency::Sufficient);
            assert!(report.is_sufficient());
        }
        other => panic!("expected AlreadySufficient, got {other:?}"),
    }
    // no action, no post-action refresh
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_read_only_manager_refuses_to_pay() {
    let source = Arc::new(ScriptedSource::new(vec![needs_both_snapshot(1)]));
    let mut manager = StorageManager::new(source.clone(), None, target(), price());
    match manager.ensure_storage().await {
        Err(PaymentError::Validation(ValidationError::MissingSigner(_))) => {}
        other => panic!("expected MissingSigner, got {other:?}"),
    }
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_zero_fil_gates_payment() {
    let mut snapshot = needs_both_snapshot(1);
    snapshot.fil_balance = U256::zero();
    let source = Arc::new(ScriptedSource::new(vec![snapshot]));
    let mut manager = StorageManager::new(source, None, target(), price());
    match manager.ensure_storage().await {
        Err(PaymentError::InsufficientFunds { token, .. }) => assert_eq!(token, TokenKind::Fil),
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
}

#[tokio::test]
async fn test_usdfc_below_deposit_gates_payment() {
    let mut snapshot = needs_both_snapshot(1);
    // nonzero but below the required deposit
    snapshot.usdfc_balance = U256::from(1u64);
    let source = Arc::new(ScriptedSource::new(vec![snapshot]));
    let mut manager = StorageManager::new(source, None, target(), price());
    match manager.ensure_storage().await {
        Err(PaymentError::InsufficientFunds {
            token,
            needed,
            available,
        }) => {
            assert_eq!(token, TokenKind::Usdfc);
            assert_eq!(available, U256::from(1u64));
            assert!(needed > available);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_execution_still_refreshes_source() {
    // The skew makes every plan stale, so the executor fails without
    // touching the network; the manager must still close the loop with a
    // refresh before surfacing the error.
    let source = Arc::new(
        ScriptedSource::new(vec![needs_both_snapshot(1), needs_both_snapshot(2)])
            .with_version_skew(1),
    );
    let executor = offline_executor(source.clone());
    let mut manager = StorageManager::new(source.clone(), Some(executor), target(), price());
    match manager.ensure_storage().await {
        Err(PaymentError::StaleSnapshot { planned, latest }) => {
            assert_eq!(planned, 1);
            assert_eq!(latest, 2);
        }
        other => panic!("expected StaleSnapshot, got {other:?}"),
    }
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_partial_failure_recovery_replans_without_deposit() {
    // Round one: both allowances short, escrow empty; the combined action
    // carries a deposit. Pretend its deposit landed but the allowance
    // increase failed; round two must re-plan as lockup-only with no
    // deposit, never repeating the one that landed.
    let round_one = needs_both_snapshot(1);
    let mut round_two = sufficient_snapshot(2);
    round_two.current_lockup_allowance = units(1);
    round_two.warm_storage_balance = units(10);
    let source = Arc::new(ScriptedSource::new(vec![round_one, round_two]));

    let first = evaluate(&source.fetch().await.unwrap(), &target(), price()).unwrap();
    assert_eq!(first.sufficiency, Sufficiency::NeedsBoth);
    let first_action = plan(&first).unwrap();
    assert!(first_action.deposit_amount > U256::zero());

    let second = evaluate(&source.fetch().await.unwrap(), &target(), price()).unwrap();
    assert_eq!(second.sufficiency, Sufficiency::NeedsLockup);
    assert!(second.deposit_needed.is_zero());
    let second_action = plan(&second).unwrap();
    assert!(second_action.deposit_amount.is_zero());
    assert_eq!(second_action.lockup_allowance, second.total_lockup_needed);
    // the surviving rate allowance is echoed, not lowered
    assert_eq!(
        second_action.epoch_rate_allowance,
        second.current_rate_allowance
    );
}
