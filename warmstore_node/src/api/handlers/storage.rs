//! Storage payment endpoints
//!
//! The surface the marketplace front end consumes: a status read showing
//! balances, allowances and sufficiency, and a payment trigger running one
//! full engine cycle. Amounts are returned both as base-unit decimal
//! strings (exact) and as formatted token values (display).

use axum::{extract::Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::errors::ApiResult;
use crate::payments::{EnsureOutcome, StorageManager, SufficiencyReport};
use crate::types::{format_units, TOKEN_DECIMALS};

/// Liveness probe
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/v1/storage/status
pub async fn get_storage_status(
    Extension(manager): Extension<Arc<RwLock<StorageManager>>>,
) -> ApiResult<Json<Value>> {
    let manager = manager.read().await;
    let report = manager.status().await?;
    Ok(Json(status_body(&report)))
}

/// POST /api/v1/storage/payment
///
/// Holding the manager write guard for the whole cycle is what prevents
/// two pay requests from racing allowance transactions against the same
/// on-chain account.
pub async fn submit_storage_payment(
    Extension(manager): Extension<Arc<RwLock<StorageManager>>>,
) -> ApiResult<Json<Value>> {
    let mut manager = manager.write().await;
    let outcome = manager.ensure_storage().await?;
    let body = match outcome {
        EnsureOutcome::AlreadySufficient(report) => json!({
            "executed": false,
            "status": status_body(&report),
        }),
        EnsureOutcome::Executed { receipt, report } => json!({
            "executed": true,
            "receipt": {
                "approve_tx": receipt.approve_tx.map(|h| format!("{h:?}")),
                "deposit_tx": receipt.deposit_tx.map(|h| format!("{h:?}")),
                "approval_tx": format!("{:?}", receipt.approval_tx),
            },
            "status": report.as_ref().map(status_body),
        }),
    };
    Ok(Json(body))
}

fn amount_body(amount: ethereum_types::U256) -> Value {
    json!({
        "base_units": amount.to_string(),
        "formatted": format_units(amount, TOKEN_DECIMALS),
    })
}

fn status_body(report: &SufficiencyReport) -> Value {
    json!({
        "snapshot_version": report.snapshot_version,
        "target": {
            "capacity_gb": report.target.capacity_gb,
            "persistence_days": report.target.persistence_days,
        },
        "balances": {
            "fil": amount_body(report.fil_balance),
            "usdfc": amount_body(report.usdfc_balance),
        },
        "allowances": {
            "rate_needed": amount_body(report.rate_needed),
            "current_rate_allowance": amount_body(report.current_rate_allowance),
            "total_lockup_needed": amount_body(report.total_lockup_needed),
            "current_lockup_allowance": amount_body(report.current_lockup_allowance),
            "deposit_needed": amount_body(report.deposit_needed),
        },
        "usage": {
            "current_storage_gb": report.current_storage_gb,
            "current_rate_allowance_gb": report.current_rate_allowance_gb,
            "persistence_days_left": report.persistence_days_left,
            "persistence_days_left_at_current_rate": report.persistence_days_left_at_current_rate,
        },
        "sufficiency": {
            "state": report.sufficiency,
            "funds": report.funds,
            "is_rate_sufficient": report.is_rate_sufficient(),
            "is_lockup_sufficient": report.is_lockup_sufficient(),
            "is_sufficient": report.is_sufficient(),
        },
    })
}
