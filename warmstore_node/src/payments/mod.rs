//! Storage payment engine
//!
//! The decision core of the marketplace: determines whether the wallet's
//! current payment authorization sustains the configured storage target and,
//! when it does not, plans and executes the minimal on-chain payment action.
//!
//! Data flows one way around a closed loop driven by explicit calls:
//! [`source::BalanceSource`] → [`evaluator::evaluate`] → [`planner::plan`] →
//! [`executor::PaymentExecutor`] → refresh → source again.

mod contracts;
pub mod evaluator;
pub mod executor;
pub mod manager;
pub mod planner;
pub mod snapshot;
pub mod source;

pub use evaluator::{evaluate, FundsStatus, Sufficiency, SufficiencyReport, ValidationError};
pub use executor::{PaymentError, PaymentExecutor, PaymentOp, PaymentReceipt, TokenKind};
pub use manager::{EnsureOutcome, StorageManager};
pub use planner::{plan, PaymentAction};
pub use snapshot::{BalanceSnapshot, StorageTarget};
pub use source::{BalanceSource, ChainBalanceSource};
