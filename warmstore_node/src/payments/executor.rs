//! On-chain payment execution
//!
//! Submits a planned [`PaymentAction`] as a serialized sequence of
//! transactions: ERC-20 spending approval when the escrow contract needs
//! one, the escrow deposit, then the operator approval carrying the new
//! absolute allowances. Each step is awaited to the configured number of
//! confirmations before the next begins, because the contract checks lockup
//! collateral against already-deposited balance, not pending deposits.
//!
//! There is no retry here: a failed step surfaces immediately and the
//! caller re-plans from a fresh snapshot, since partial completion changes
//! which action is correct next.

use ethereum_types::U256;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U64};
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::contracts;
use super::evaluator::ValidationError;
use super::planner::PaymentAction;
use super::source::BalanceSource;

/// Which on-chain operation an error surfaced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentOp {
    /// ERC-20 `approve` granting the escrow contract spending rights
    Approve,
    /// Escrow `deposit`
    Deposit,
    /// `setOperatorApproval` carrying the new allowances
    OperatorApproval,
}

impl fmt::Display for PaymentOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentOp::Approve => write!(f, "usdfc approval"),
            PaymentOp::Deposit => write!(f, "escrow deposit"),
            PaymentOp::OperatorApproval => write!(f, "operator approval"),
        }
    }
}

/// Token a funds shortfall refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Fil,
    Usdfc,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Fil => write!(f, "FIL"),
            TokenKind::Usdfc => write!(f, "USDFC"),
        }
    }
}

/// Payment engine error taxonomy
///
/// All of these are returned as values to the presentation layer; none are
/// used for normal control flow ("needs deposit" is a report field, never
/// an error).
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("plan was computed from snapshot v{planned} but v{latest} is current; re-evaluate before paying")]
    StaleSnapshot { planned: u64, latest: u64 },

    #[error("{op} rejected by signer: {reason}")]
    Rejected { op: PaymentOp, reason: String },

    #[error("{op} failed, not enough gas funds: {reason}")]
    InsufficientGas { op: PaymentOp, reason: String },

    #[error("{op} reverted on-chain: {reason}")]
    Reverted { op: PaymentOp, reason: String },

    #[error("network failure during {op}: {reason}")]
    Network { op: PaymentOp, reason: String },

    #[error("balance refresh failed: {0}")]
    Refresh(String),

    #[error("insufficient {token} balance: need {needed}, have {available}")]
    InsufficientFunds {
        token: TokenKind,
        needed: U256,
        available: U256,
    },
}

/// Transaction hashes of one executed action
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    /// ERC-20 approval, when one was needed
    pub approve_tx: Option<H256>,
    /// Escrow deposit, when the action carried one
    pub deposit_tx: Option<H256>,
    /// Operator approval setting the new allowances
    pub approval_tx: H256,
}

/// Submits payment actions for one wallet, one at a time
pub struct PaymentExecutor {
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
    source: Arc<dyn BalanceSource>,
    owner: Address,
    usdfc: Address,
    payments: Address,
    operator: Address,
    /// Longest lockup period the operator may hold, in epochs
    max_lockup_period: U256,
    confirmations: usize,
}

impl PaymentExecutor {
    pub fn new(
        provider: Provider<Http>,
        wallet: LocalWallet,
        source: Arc<dyn BalanceSource>,
        usdfc: Address,
        payments: Address,
        operator: Address,
        max_lockup_period: U256,
        confirmations: usize,
    ) -> Self {
        let owner = wallet.address();
        Self {
            client: SignerMiddleware::new(provider, wallet),
            source,
            owner,
            usdfc,
            payments,
            operator,
            max_lockup_period,
            confirmations,
        }
    }

    /// Execute one planned action, consuming it
    ///
    /// Refuses to run against a snapshot it can prove is stale. The caller
    /// is contractually required to refresh the balance source afterward,
    /// success or failure; the executor never does so itself.
    pub async fn execute(&self, action: PaymentAction) -> Result<PaymentReceipt, PaymentError> {
        let latest = self.source.latest_version();
        if action.snapshot_version != latest {
            return Err(PaymentError::StaleSnapshot {
                planned: action.snapshot_version,
                latest,
            });
        }

        let mut approve_tx = None;
        let mut deposit_tx = None;

        if !action.deposit_amount.is_zero() {
            if self.escrow_spending_allowance().await? < action.deposit_amount {
                let data = contracts::erc20()
                    .encode("approve", (self.payments, action.deposit_amount))
                    .map_err(|e| abi_error(PaymentOp::Approve, e))?;
                approve_tx = Some(self.submit(PaymentOp::Approve, self.usdfc, data).await?);
            }

            let data = contracts::payments()
                .encode("deposit", (self.usdfc, self.owner, action.deposit_amount))
                .map_err(|e| abi_error(PaymentOp::Deposit, e))?;
            deposit_tx = Some(self.submit(PaymentOp::Deposit, self.payments, data).await?);
        }

        let data = contracts::payments()
            .encode(
                "setOperatorApproval",
                (
                    self.usdfc,
                    self.operator,
                    true,
                    action.epoch_rate_allowance,
                    action.lockup_allowance,
                    self.max_lockup_period,
                ),
            )
            .map_err(|e| abi_error(PaymentOp::OperatorApproval, e))?;
        let approval_tx = self
            .submit(PaymentOp::OperatorApproval, self.payments, data)
            .await?;

        Ok(PaymentReceipt {
            approve_tx,
            deposit_tx,
            approval_tx,
        })
    }

    /// Current ERC-20 allowance granted to the escrow contract
    async fn escrow_spending_allowance(&self) -> Result<U256, PaymentError> {
        let data = contracts::erc20()
            .encode("allowance", (self.owner, self.payments))
            .map_err(|e| abi_error(PaymentOp::Approve, e))?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.usdfc)
            .data(data)
            .into();
        let raw = self.client.call(&tx, None).await.map_err(|e| {
            classify_submit_error(PaymentOp::Approve, &e.to_string())
        })?;
        contracts::erc20()
            .decode_output("allowance", raw)
            .map_err(|e| abi_error(PaymentOp::Approve, e))
    }

    /// Submit one transaction and await its confirmation
    async fn submit(
        &self,
        op: PaymentOp,
        to: Address,
        data: Bytes,
    ) -> Result<H256, PaymentError> {
        let tx = TransactionRequest::new().from(self.owner).to(to).data(data);
        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify_submit_error(op, &e.to_string()))?;
        let tx_hash = pending.tx_hash();
        info!("{} submitted: {:?}", op, tx_hash);

        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|e| PaymentError::Network {
                op,
                reason: e.to_string(),
            })?
            .ok_or_else(|| PaymentError::Network {
                op,
                reason: "transaction dropped from mempool".to_string(),
            })?;

        if receipt.status == Some(U64::from(1)) {
            info!("{} confirmed: {:?}", op, tx_hash);
            Ok(receipt.transaction_hash)
        } else {
            warn!("{} reverted: {:?}", op, tx_hash);
            Err(PaymentError::Reverted {
                op,
                reason: format!("transaction {:?} reverted", tx_hash),
            })
        }
    }
}

fn abi_error(op: PaymentOp, e: ethers::contract::AbiError) -> PaymentError {
    PaymentError::Network {
        op,
        reason: format!("abi encoding failed: {}", e),
    }
}

/// Map a provider/signer error message onto the payment error taxonomy
///
/// Distinguishes "user declined" from "chain rejected" from "network
/// unavailable" so remediation can differ upstream.
fn classify_submit_error(op: PaymentOp, message: &str) -> PaymentError {
    let lower = message.to_lowercase();
    if lower.contains("user rejected")
        || lower.contains("user denied")
        || lower.contains("rejected by user")
        || lower.contains("code: 4001")
    {
        return PaymentError::Rejected {
            op,
            reason: message.to_string(),
        };
    }
    if lower.contains("insufficient funds") {
        return PaymentError::InsufficientGas {
            op,
            reason: message.to_string(),
        };
    }
    if lower.contains("execution reverted") || lower.contains("revert") {
        let reason = message
            .split_once("execution reverted:")
            .map(|(_, tail)| tail.trim().to_string())
            .unwrap_or_else(|| message.to_string());
        return PaymentError::Reverted { op, reason };
    }
    PaymentError::Network {
        op,
        reason: message.to_string(),
    }
}
