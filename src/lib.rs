pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod services;
pub mod validation;

use axum::{Router, routing::get, routing::post};
use tower_http::cors::CorsLayer;

use crate::services::TransferService;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub transfers: TransferService,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/transfers", post(handlers::create_transfer))
        .route("/transactions/:id", get(handlers::get_transaction))
        .route(
            "/accounts/:account_number/transactions",
            get(handlers::list_account_transactions),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
