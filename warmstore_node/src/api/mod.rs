//! HTTP API for the storage payments surface

use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::payments::StorageManager;

pub mod errors;
pub mod handlers;

pub use errors::{ApiError, ApiResult};

/// Build the API router around a shared storage manager
pub fn router(manager: Arc<RwLock<StorageManager>>) -> Router {
    Router::new()
        .route("/api/v1/healthz", get(handlers::storage::healthz))
        .route("/api/v1/storage/status", get(handlers::storage::get_storage_status))
        .route(
            "/api/v1/storage/payment",
            post(handlers::storage::submit_storage_payment),
        )
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(Extension(manager)),
        )
}
