//! Sufficiency evaluation
//!
//! Pure derivation of a [`SufficiencyReport`] from a balance snapshot, a
//! storage target and the operator pricing schedule. All allowance math is
//! exact U256 arithmetic in base units; the two retention-horizon fields are
//! the only floating-point values and exist for display alone.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::snapshot::{BalanceSnapshot, StorageTarget};
use crate::types::{epochs, to_f64_lossy, EPOCHS_PER_DAY, EPOCHS_PER_MONTH, GB_PER_TIB};

/// Rejected target configuration or pricing input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target capacity must be nonzero")]
    ZeroCapacity,

    #[error("target retention period must be nonzero")]
    ZeroRetention,

    #[error("pricing schedule has zero price per TiB per month")]
    ZeroPrice,

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("payment execution requires a signing key: {0}")]
    MissingSigner(&'static str),
}

/// The four-state sufficiency matrix over rate and lockup allowances
///
/// Modeled as one tagged enum so unhandled boolean combinations are
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sufficiency {
    /// Both allowances meet the target
    Sufficient,
    /// Rate allowance short, lockup allowance adequate
    NeedsRate,
    /// Lockup allowance short, rate allowance adequate
    NeedsLockup,
    /// Both allowances short
    NeedsBoth,
}

/// Wallet token availability, independent of allowance state
///
/// A wallet missing either token cannot use its allowances at all: FIL pays
/// gas, USDFC backs the escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundsStatus {
    /// Both tokens present
    Available,
    /// No FIL for transaction fees
    MissingFil,
    /// No USDFC for storage
    MissingUsdfc,
    /// Neither token present
    MissingBoth,
}

/// Derived sufficiency state for one snapshot against one target
///
/// `rate_needed` and `total_lockup_needed` are absolute requirements (the
/// values submitted as new allowances when short); `deposit_needed` is the
/// incremental escrow deficit and is zero whenever existing escrow already
/// covers the required lockup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyReport {
    /// Version of the snapshot this report was derived from
    pub snapshot_version: u64,
    /// Target the snapshot was evaluated against
    pub target: StorageTarget,
    /// Absolute per-epoch rate allowance the target requires
    pub rate_needed: U256,
    /// Absolute lockup allowance the target requires
    pub total_lockup_needed: U256,
    /// Escrow still to be deposited; zero when already covered
    pub deposit_needed: U256,
    /// Rate allowance at evaluation time
    pub current_rate_allowance: U256,
    /// Lockup allowance at evaluation time
    pub current_lockup_allowance: U256,
    /// Wallet FIL at evaluation time
    pub fil_balance: U256,
    /// Wallet USDFC at evaluation time
    pub usdfc_balance: U256,
    /// Capacity the current rate allowance can carry, in GB
    pub current_rate_allowance_gb: u64,
    /// Capacity live deals currently consume, in GB
    pub current_storage_gb: u64,
    /// Days the free escrow lasts at the maximum allowed rate; `None` when unbounded
    pub persistence_days_left: Option<f64>,
    /// Days the free escrow lasts at the rate actually in use; `None` when unbounded
    pub persistence_days_left_at_current_rate: Option<f64>,
    /// Allowance sufficiency matrix state
    pub sufficiency: Sufficiency,
    /// Wallet token availability
    pub funds: FundsStatus,
}

impl SufficiencyReport {
    pub fn is_rate_sufficient(&self) -> bool {
        matches!(
            self.sufficiency,
            Sufficiency::Sufficient | Sufficiency::NeedsLockup
        )
    }

    pub fn is_lockup_sufficient(&self) -> bool {
        matches!(
            self.sufficiency,
            Sufficiency::Sufficient | Sufficiency::NeedsRate
        )
    }

    /// Overall sufficiency: both allowances adequate and both tokens present
    pub fn is_sufficient(&self) -> bool {
        self.sufficiency == Sufficiency::Sufficient && self.funds == FundsStatus::Available
    }
}

/// Per-epoch rate required to carry `capacity_gb` under the given schedule
///
/// `price * gb / 1024 / epochs_per_month`, multiplying before dividing so
/// sub-GB prices keep full precision.
pub fn rate_for_capacity(
    price_per_tib_per_month: U256,
    capacity_gb: u64,
) -> Result<U256, ValidationError> {
    let scaled = price_per_tib_per_month
        .checked_mul(U256::from(capacity_gb))
        .ok_or(ValidationError::Overflow("per-epoch rate"))?;
    Ok(scaled / U256::from(GB_PER_TIB) / U256::from(EPOCHS_PER_MONTH))
}

/// Capacity in GB a per-epoch rate can carry, rounded to the nearest GB
///
/// Display-denominated inverse of [`rate_for_capacity`]; saturates at
/// `u64::MAX` and returns zero for a zero price.
pub fn capacity_for_rate(price_per_tib_per_month: U256, rate_per_epoch: U256) -> u64 {
    if price_per_tib_per_month.is_zero() {
        return 0;
    }
    let numerator = match rate_per_epoch
        .checked_mul(U256::from(GB_PER_TIB))
        .and_then(|v| v.checked_mul(U256::from(EPOCHS_PER_MONTH)))
    {
        Some(v) => v,
        None => return u64::MAX,
    };
    let rounded = numerator
        .checked_add(price_per_tib_per_month / 2)
        .unwrap_or(numerator)
        / price_per_tib_per_month;
    rounded.min(U256::from(u64::MAX)).as_u64()
}

/// Evaluate one snapshot against the storage target
///
/// Pure and total apart from input validation: a zero target dimension or a
/// zero price is rejected, and overflow-scale targets surface as
/// [`ValidationError::Overflow`] instead of panicking. Re-evaluating an
/// unchanged snapshot always yields an identical report.
pub fn evaluate(
    snapshot: &BalanceSnapshot,
    target: &StorageTarget,
    price_per_tib_per_month: U256,
) -> Result<SufficiencyReport, ValidationError> {
    if target.capacity_gb == 0 {
        return Err(ValidationError::ZeroCapacity);
    }
    if target.persistence_days == 0 {
        return Err(ValidationError::ZeroRetention);
    }
    if price_per_tib_per_month.is_zero() {
        return Err(ValidationError::ZeroPrice);
    }

    // The operator's authorized rate can never drop below what live deals
    // already consume, so the requirement floors at current usage.
    let target_rate = rate_for_capacity(price_per_tib_per_month, target.capacity_gb)?;
    let rate_needed = target_rate.max(snapshot.current_rate_used);

    let lockup_for_target = rate_needed
        .checked_mul(epochs(target.persistence_days))
        .ok_or(ValidationError::Overflow("target lockup"))?;
    let total_lockup_needed = snapshot
        .current_lockup_used
        .checked_add(lockup_for_target)
        .ok_or(ValidationError::Overflow("total lockup"))?;

    let deposit_needed = total_lockup_needed.saturating_sub(snapshot.warm_storage_balance);

    let rate_sufficient = snapshot.current_rate_allowance >= rate_needed;
    let lockup_sufficient = snapshot.current_lockup_allowance >= total_lockup_needed;
    let sufficiency = match (rate_sufficient, lockup_sufficient) {
        (true, true) => Sufficiency::Sufficient,
        (false, true) => Sufficiency::NeedsRate,
        (true, false) => Sufficiency::NeedsLockup,
        (false, false) => Sufficiency::NeedsBoth,
    };

    let funds = match (
        snapshot.fil_balance.is_zero(),
        snapshot.usdfc_balance.is_zero(),
    ) {
        (false, false) => FundsStatus::Available,
        (true, false) => FundsStatus::MissingFil,
        (false, true) => FundsStatus::MissingUsdfc,
        (true, true) => FundsStatus::MissingBoth,
    };

    let free_escrow = snapshot
        .warm_storage_balance
        .saturating_sub(snapshot.current_lockup_used);
    let persistence_days_left =
        days_of_escrow(free_escrow, snapshot.current_rate_allowance.max(rate_needed));
    let persistence_days_left_at_current_rate =
        days_of_escrow(free_escrow, snapshot.current_rate_used);

    Ok(SufficiencyReport {
        snapshot_version: snapshot.version,
        target: *target,
        rate_needed,
        total_lockup_needed,
        deposit_needed,
        current_rate_allowance: snapshot.current_rate_allowance,
        current_lockup_allowance: snapshot.current_lockup_allowance,
        fil_balance: snapshot.fil_balance,
        usdfc_balance: snapshot.usdfc_balance,
        current_rate_allowance_gb: capacity_for_rate(
            price_per_tib_per_month,
            snapshot.current_rate_allowance,
        ),
        current_storage_gb: capacity_for_rate(price_per_tib_per_month, snapshot.current_rate_used),
        persistence_days_left,
        persistence_days_left_at_current_rate,
        sufficiency,
        funds,
    })
}

/// Days the free escrow sustains the given per-epoch burn rate, display only
fn days_of_escrow(free_escrow: U256, rate_per_epoch: U256) -> Option<f64> {
    if rate_per_epoch.is_zero() {
        return None;
    }
    let per_day = rate_per_epoch * U256::from(EPOCHS_PER_DAY);
    Some(to_f64_lossy(free_escrow) / to_f64_lossy(per_day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// 2 USDFC per TiB per month
    fn price() -> U256 {
        U256::exp10(18) * U256::from(2u64)
    }

    fn units(n: u64) -> U256 {
        U256::exp10(18) * U256::from(n)
    }

    /// Snapshot mirroring a healthy account: 5 FIL, 100 USDFC, 10 USDFC in
    /// escrow, rate allowance sized for 20 GB with 2 GB in use, 50 USDFC
    /// lockup allowance with 1 USDFC reserved.
    fn healthy_snapshot() -> BalanceSnapshot {
        BalanceSnapshot {
            version: 1,
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

    fn target() -> StorageTarget {
        StorageTarget::new(10, 30)
    }

    #[test]
    fn test_both_sufficient() {
        let report = evaluate(&healthy_snapshot(), &target(), price()).unwrap();
        assert_eq!(report.sufficiency, Sufficiency::Sufficient);
        assert_eq!(report.funds, FundsStatus::Available);
        assert!(report.is_sufficient());
        assert!(report.deposit_needed.is_zero());
        assert_eq!(report.current_rate_allowance_gb, 20);
        assert_eq!(report.current_storage_gb, 2);
    }

    #[test]
    fn test_rate_insufficient_only() {
        let mut snapshot = healthy_snapshot();
        snapshot.current_rate_allowance = rate_for_capacity(price(), 5).unwrap();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(report.sufficiency, Sufficiency::NeedsRate);
        assert!(!report.is_rate_sufficient());
        assert!(report.is_lockup_sufficient());
        assert!(!report.is_sufficient());
        // rate authorization reserves no funds
        assert!(report.deposit_needed.is_zero());
        assert_eq!(report.rate_needed, rate_for_capacity(price(), 10).unwrap());
    }

    #[test]
    fn test_lockup_insufficient_only() {
        let mut snapshot = healthy_snapshot();
        snapshot.current_lockup_allowance = units(1);
        snapshot.warm_storage_balance = U256::zero();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(report.sufficiency, Sufficiency::NeedsLockup);
        assert!(report.deposit_needed > U256::zero());
        assert_eq!(report.deposit_needed, report.total_lockup_needed);
    }

    #[test]
    fn test_both_insufficient() {
        let mut snapshot = healthy_snapshot();
        snapshot.current_rate_allowance = U256::zero();
        snapshot.current_lockup_allowance = U256::zero();
        snapshot.warm_storage_balance = U256::zero();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(report.sufficiency, Sufficiency::NeedsBoth);
        assert!(report.deposit_needed > U256::zero());
    }

    #[test]
    fn test_zero_fil_short_circuits_sufficiency() {
        let mut snapshot = healthy_snapshot();
        snapshot.fil_balance = U256::zero();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        // allowances are nominally adequate but unusable without gas
        assert_eq!(report.sufficiency, Sufficiency::Sufficient);
        assert_eq!(report.funds, FundsStatus::MissingFil);
        assert!(!report.is_sufficient());
    }

    #[test]
    fn test_zero_usdfc_short_circuits_sufficiency() {
        let mut snapshot = healthy_snapshot();
        snapshot.usdfc_balance = U256::zero();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(report.funds, FundsStatus::MissingUsdfc);
        assert!(!report.is_sufficient());
    }

    #[test]
    fn test_deposit_deficit_aware_after_partial_failure() {
        // A combined action's deposit landed (escrow now covers the lockup)
        // but the allowance increase failed: the fresh evaluation must report
        // NeedsLockup with a zero deposit.
        let mut snapshot = healthy_snapshot();
        snapshot.current_lockup_allowance = units(1);
        snapshot.warm_storage_balance = units(10);
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(report.sufficiency, Sufficiency::NeedsLockup);
        assert!(report.deposit_needed.is_zero());
    }

    #[test]
    fn test_rate_needed_floors_at_current_usage() {
        // 40 GB already in use while the target asks for 10: the requirement
        // cannot cut below live consumption.
        let mut snapshot = healthy_snapshot();
        snapshot.current_rate_used = rate_for_capacity(price(), 40).unwrap();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(report.rate_needed, snapshot.current_rate_used);
    }

    #[test]
    fn test_validation_rejects_zero_targets() {
        let snapshot = healthy_snapshot();
        assert_eq!(
            evaluate(&snapshot, &StorageTarget::new(0, 30), price()),
            Err(ValidationError::ZeroCapacity)
        );
        assert_eq!(
            evaluate(&snapshot, &StorageTarget::new(10, 0), price()),
            Err(ValidationError::ZeroRetention)
        );
        assert_eq!(
            evaluate(&snapshot, &target(), U256::zero()),
            Err(ValidationError::ZeroPrice)
        );
    }

    #[test]
    fn test_validation_rejects_overflow_scale_targets() {
        let snapshot = healthy_snapshot();
        let result = evaluate(&snapshot, &StorageTarget::new(u64::MAX, 30), U256::MAX);
        assert!(matches!(result, Err(ValidationError::Overflow(_))));
    }

    #[test]
    fn test_idempotent_evaluation() {
        let snapshot = healthy_snapshot();
        let first = evaluate(&snapshot, &target(), price()).unwrap();
        let second = evaluate(&snapshot, &target(), price()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_persistence_days_unbounded_when_idle() {
        let mut snapshot = healthy_snapshot();
        snapshot.current_rate_used = U256::zero();
        let report = evaluate(&snapshot, &target(), price()).unwrap();
        assert!(report.persistence_days_left_at_current_rate.is_none());
        assert!(report.persistence_days_left.is_some());
    }

    #[test]
    fn test_persistence_days_value() {
        // 9 USDFC free escrow burning at the 20 GB allowance rate:
        // 20 GB costs 2 * 20/1024 USDFC per month, so about 0.039/month.
        let report = evaluate(&healthy_snapshot(), &target(), price()).unwrap();
        let days = report.persistence_days_left.unwrap();
        assert!(days > 6_000.0 && days < 8_000.0, "got {days}");
    }

    #[test]
    fn test_capacity_roundtrip() {
        for gb in [1u64, 2, 10, 100, 1024, 4096] {
            let rate = rate_for_capacity(price(), gb).unwrap();
            assert_eq!(capacity_for_rate(price(), rate), gb);
        }
        assert_eq!(capacity_for_rate(price(), U256::zero()), 0);
        assert_eq!(capacity_for_rate(U256::zero(), U256::from(1u64)), 0);
    }

    proptest! {
        #[test]
        fn prop_capacity_monotone_in_rate_needed(
            gb in 1u64..50_000,
            extra in 1u64..10_000,
            days in 1u64..3650,
        ) {
            let snapshot = healthy_snapshot();
            let small = evaluate(&snapshot, &StorageTarget::new(gb, days), price()).unwrap();
            let large = evaluate(&snapshot, &StorageTarget::new(gb + extra, days), price()).unwrap();
            prop_assert!(large.rate_needed >= small.rate_needed);
            prop_assert!(large.deposit_needed >= small.deposit_needed);
            prop_assert!(large.total_lockup_needed >= small.total_lockup_needed);
        }

        #[test]
        fn prop_needed_fields_cover_escrow_deficit(
            gb in 1u64..10_000,
            days in 1u64..365,
            escrow in 0u64..1_000,
        ) {
            let mut snapshot = healthy_snapshot();
            snapshot.warm_storage_balance = units(escrow);
            let report = evaluate(&snapshot, &StorageTarget::new(gb, days), price()).unwrap();
            // deposit_needed is exactly the uncovered part of the lockup
            prop_assert_eq!(
                report.deposit_needed,
                report.total_lockup_needed.saturating_sub(snapshot.warm_storage_balance)
            );
        }
    }
}
