//! Storage payment manager
//!
//! Drives the closed control loop: source → evaluate → plan → execute →
//! refresh → source. Each cycle is demand-driven (a user-triggered pay or
//! an explicit status read), never a background poll, and always recomputes
//! from the freshest snapshot rather than caching intermediate allowance
//! state.

use ethereum_types::U256;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::evaluator::{evaluate, FundsStatus, SufficiencyReport, ValidationError};
use super::executor::{PaymentError, PaymentExecutor, PaymentReceipt, TokenKind};
use super::planner::plan;
use super::snapshot::StorageTarget;
use super::source::BalanceSource;

/// Result of one `ensure_storage` cycle
#[derive(Debug, Serialize)]
pub enum EnsureOutcome {
    /// No action was needed; the report that proved it
    AlreadySufficient(SufficiencyReport),
    /// An action was submitted and confirmed
    Executed {
        receipt: PaymentReceipt,
        /// Post-action evaluation; `None` only if the follow-up refresh failed
        report: Option<SufficiencyReport>,
    },
}

/// Orchestrates sufficiency evaluation and payment for one wallet
///
/// Methods that can submit transactions take `&mut self`: exclusive access
/// is how overlapping pay cycles against the same on-chain account are
/// prevented, in place of a UI disabling its trigger control.
pub struct StorageManager {
    source: Arc<dyn BalanceSource>,
    /// Absent in read-only deployments (no signing key configured)
    executor: Option<PaymentExecutor>,
    target: StorageTarget,
    price_per_tib_per_month: U256,
}

impl StorageManager {
    pub fn new(
        source: Arc<dyn BalanceSource>,
        executor: Option<PaymentExecutor>,
        target: StorageTarget,
        price_per_tib_per_month: U256,
    ) -> Self {
        Self {
            source,
            executor,
            target,
            price_per_tib_per_month,
        }
    }

    pub fn target(&self) -> StorageTarget {
        self.target
    }

    /// Fetch a fresh snapshot and evaluate it (the read path)
    pub async fn status(&self) -> Result<SufficiencyReport, PaymentError> {
        let snapshot = self
            .source
            .fetch()
            .await
            .map_err(|e| PaymentError::Refresh(e.to_string()))?;
        Ok(evaluate(&snapshot, &self.target, self.price_per_tib_per_month)?)
    }

    /// Run one full payment cycle
    ///
    /// Evaluates the freshest snapshot; if the target is not covered, plans
    /// and executes the required action, then refreshes the source
    /// regardless of the executor outcome so the next cycle starts from
    /// post-transaction state. A failed action is never retried here: the
    /// fresh snapshot changes what the correct next action is.
    pub async fn ensure_storage(&mut self) -> Result<EnsureOutcome, PaymentError> {
        let snapshot = self
            .source
            .fetch()
            .await
            .map_err(|e| PaymentError::Refresh(e.to_string()))?;
        let report = evaluate(&snapshot, &self.target, self.price_per_tib_per_month)?;

        if report.is_sufficient() {
            info!(
                "storage target {}GB/{}d already covered (snapshot v{})",
                self.target.capacity_gb, self.target.persistence_days, report.snapshot_version
            );
            return Ok(EnsureOutcome::AlreadySufficient(report));
        }

        self.check_funds(&report)?;

        let Some(action) = plan(&report) else {
            // allowances adequate; only funds were in question and they passed
            return Ok(EnsureOutcome::AlreadySufficient(report));
        };

        let executor = self.executor.as_ref().ok_or(PaymentError::Validation(
            ValidationError::MissingSigner("no chain.private_key configured"),
        ))?;

        info!(
            "executing payment for snapshot v{}: deposit={} rate={} lockup={}",
            action.snapshot_version,
            action.deposit_amount,
            action.epoch_rate_allowance,
            action.lockup_allowance
        );
        let result = executor.execute(action).await;

        // Close the loop: the snapshot is refreshed whether or not the
        // action landed, since a partial failure still moved on-chain state.
        let refreshed = self.source.fetch().await;

        match result {
            Ok(receipt) => {
                let report_after = match refreshed {
                    Ok(snapshot) => {
                        Some(evaluate(&snapshot, &self.target, self.price_per_tib_per_month)?)
                    }
                    Err(e) => {
                        warn!("balance refresh after payment failed: {e:#}");
                        None
                    }
                };
                Ok(EnsureOutcome::Executed {
                    receipt,
                    report: report_after,
                })
            }
            Err(e) => {
                if let Err(re) = refreshed {
                    warn!("balance refresh after failed payment also failed: {re:#}");
                }
                Err(e)
            }
        }
    }

    /// Gate a pay attempt on wallet token availability
    ///
    /// Allowance deficits are report fields; missing tokens are the one
    /// condition whose remediation is acquiring funds, so they surface as a
    /// typed error before anything is submitted.
    fn check_funds(&self, report: &SufficiencyReport) -> Result<(), PaymentError> {
        match report.funds {
            FundsStatus::MissingFil | FundsStatus::MissingBoth => {
                Err(PaymentError::InsufficientFunds {
                    token: TokenKind::Fil,
                    needed: U256::one(),
                    available: U256::zero(),
                })
            }
            FundsStatus::MissingUsdfc => Err(PaymentError::InsufficientFunds {
                token: TokenKind::Usdfc,
                needed: report.deposit_needed.max(U256::one()),
                available: U256::zero(),
            }),
            FundsStatus::Available => {
                if report.usdfc_balance < report.deposit_needed {
                    Err(PaymentError::InsufficientFunds {
                        token: TokenKind::Usdfc,
                        needed: report.deposit_needed,
                        available: report.usdfc_balance,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}
