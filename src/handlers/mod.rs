use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::services::TransferRequest;

#[derive(Debug, Deserialize)]
pub struct TransferPayload {
    pub source_account: String,
    pub destination_account: String,
    /// Decimal string; parsed exactly, never through a float.
    pub amount: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<TransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .transfers
        .transfer_funds(TransferRequest {
            source_account: payload.source_account,
            destination_account: payload.destination_account,
            amount: payload.amount,
            description: payload.description,
            metadata: payload.metadata,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state.transfers.get_transaction(id).await?;
    Ok(Json(transaction))
}

pub async fn list_account_transactions(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state
        .transfers
        .get_account_transactions(&account_number, params.limit, params.offset)
        .await?;

    Ok(Json(transactions))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "database": e.to_string() })),
        ),
    }
}
