//! Allowance action planning
//!
//! Maps a sufficiency report onto zero or one payment action. Allowance
//! fields carry absolute new values; the deposit field is incremental. When
//! both allowances are short a single combined action is produced so the
//! user approves one transaction sequence, not two.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};

use super::evaluator::{Sufficiency, SufficiencyReport};

/// One payment request: consumed exactly once by the executor
///
/// `lockup_allowance` and `epoch_rate_allowance` are the absolute values to
/// authorize; `deposit_amount` is the incremental escrow top-up that must
/// land before the allowance increase is accepted by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAction {
    /// Absolute lockup allowance to set
    pub lockup_allowance: U256,
    /// Absolute per-epoch rate allowance to set
    pub epoch_rate_allowance: U256,
    /// Incremental escrow deposit; zero when lockup is already sufficient
    pub deposit_amount: U256,
    /// Version of the snapshot the plan was computed from
    pub snapshot_version: u64,
}

/// Plan the payment action a report calls for, if any
///
/// The insufficient axis receives its required absolute value; the
/// sufficient axis is echoed at its current value so an action never lowers
/// an authorization the account already holds. A lockup increase always
/// carries its backing deposit (which may be zero when escrow already
/// covers it); a bare rate increase reserves no funds and carries none.
pub fn plan(report: &SufficiencyReport) -> Option<PaymentAction> {
    let action = match report.sufficiency {
        Sufficiency::Sufficient => return None,
        Sufficiency::NeedsLockup => PaymentAction {
            lockup_allowance: report.total_lockup_needed,
            epoch_rate_allowance: report.current_rate_allowance,
            deposit_amount: report.deposit_needed,
            snapshot_version: report.snapshot_version,
        },
        Sufficiency::NeedsRate => PaymentAction {
            lockup_allowance: report.current_lockup_allowance,
            epoch_rate_allowance: report.rate_needed,
            deposit_amount: U256::zero(),
            snapshot_version: report.snapshot_version,
        },
        Sufficiency::NeedsBoth => PaymentAction {
            lockup_allowance: report.total_lockup_needed,
            epoch_rate_allowance: report.rate_needed,
            deposit_amount: report.deposit_needed,
            snapshot_version: report.snapshot_version,
        },
    };
    Some(action)
}
