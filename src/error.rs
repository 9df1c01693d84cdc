use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidTransfer(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AccountNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateTransaction(_) => StatusCode::CONFLICT,
            AppError::TransferFailed(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transfer_status_code() {
        let error = AppError::InvalidTransfer("cannot transfer to the same account".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_account_not_found_status_code() {
        let error = AppError::AccountNotFound("ACC-000000001".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_insufficient_funds_status_code() {
        let error = AppError::InsufficientFunds("balance too low".to_string());
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_duplicate_transaction_status_code() {
        let error = AppError::DuplicateTransaction("matching recent transfer".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_transfer_failed_status_code() {
        let error = AppError::TransferFailed("lock timeout".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_insufficient_funds_response() {
        let error = AppError::InsufficientFunds("balance too low".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_response() {
        let error = AppError::DuplicateTransaction("matching recent transfer".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
