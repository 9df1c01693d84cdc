//! Transaction domain entity.
//! A transfer record with a finite-state lifecycle; the durable audit trail.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const REFERENCE_PREFIX: &str = "TXN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "transfer" => Ok(TransactionType::Transfer),
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            other => Err(AppError::Internal(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(TransactionStatus::Pending),
            "processing" => Ok(TransactionStatus::Processing),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(AppError::Internal(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Allowed lifecycle transitions. `completed` is only reachable
    /// through `processing`; terminal states accept nothing.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (*self, next),
            (
                TransactionStatus::Pending,
                TransactionStatus::Processing
                    | TransactionStatus::Failed
                    | TransactionStatus::Cancelled
            ) | (
                TransactionStatus::Processing,
                TransactionStatus::Completed | TransactionStatus::Failed
            )
        )
    }
}

/// Domain entity representing a transfer between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub tx_type: TransactionType,
    pub source_account_id: Option<i64>,
    pub destination_account_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new_transfer(
        source_account_id: i64,
        destination_account_id: i64,
        amount: BigDecimal,
        currency: String,
        description: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference: generate_reference(now),
            tx_type: TransactionType::Transfer,
            source_account_id: Some(source_account_id),
            destination_account_id,
            amount,
            currency,
            status: TransactionStatus::Pending,
            description,
            failure_reason: None,
            metadata,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// Guarded status transition. Stamps `processed_at` exactly once, on
    /// entering a terminal state.
    pub fn transition_to(&mut self, next: TransactionStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "illegal transaction status transition {} -> {} for {}",
                self.status.as_str(),
                next.as_str(),
                self.reference
            )));
        }

        self.status = next;
        self.updated_at = Utc::now();
        if next.is_terminal() && self.processed_at.is_none() {
            self.processed_at = Some(self.updated_at);
        }
        Ok(())
    }

}

/// Human-auditable transaction reference: fixed prefix, a random 64-bit
/// component, and the creation timestamp in millis. The combination makes
/// collisions practically impossible; a unique index backs it up.
pub fn generate_reference(created_at: DateTime<Utc>) -> String {
    let random: u64 = rand::thread_rng().gen();
    format!(
        "{}-{:016X}-{}",
        REFERENCE_PREFIX,
        random,
        created_at.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn transfer() -> Transaction {
        Transaction::new_transfer(
            1,
            2,
            BigDecimal::from_str("200.00").unwrap(),
            "USD".to_string(),
            Some("rent".to_string()),
            None,
        )
    }

    #[test]
    fn new_transfer_starts_pending() {
        let tx = transfer();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.tx_type, TransactionType::Transfer);
        assert!(tx.processed_at.is_none());
        assert!(tx.failure_reason.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut tx = transfer();
        tx.transition_to(TransactionStatus::Processing).unwrap();
        tx.transition_to(TransactionStatus::Completed).unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.processed_at.is_some());
    }

    #[test]
    fn completed_cannot_be_reached_from_pending() {
        let mut tx = transfer();
        assert!(tx.transition_to(TransactionStatus::Completed).is_err());
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn terminal_states_accept_no_transition() {
        let mut tx = transfer();
        tx.transition_to(TransactionStatus::Processing).unwrap();
        tx.transition_to(TransactionStatus::Completed).unwrap();
        assert!(tx.transition_to(TransactionStatus::Failed).is_err());
        assert!(tx.transition_to(TransactionStatus::Processing).is_err());
    }

    #[test]
    fn pending_can_fail_directly() {
        // The sweeper and the failure-marking write both take this edge.
        let mut tx = transfer();
        tx.failure_reason = Some("timeout".to_string());
        tx.transition_to(TransactionStatus::Failed).unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.failure_reason.as_deref(), Some("timeout"));
        assert!(tx.processed_at.is_some());
    }

    #[test]
    fn processed_at_is_set_exactly_once() {
        let mut tx = transfer();
        tx.transition_to(TransactionStatus::Processing).unwrap();
        tx.transition_to(TransactionStatus::Completed).unwrap();
        let stamped = tx.processed_at;
        assert!(stamped.is_some());
        // Further transitions are rejected, so the stamp cannot change.
        assert!(tx.transition_to(TransactionStatus::Failed).is_err());
        assert_eq!(tx.processed_at, stamped);
    }

    #[test]
    fn reference_has_expected_shape() {
        let now = Utc::now();
        let reference = generate_reference(now);
        let parts: Vec<&str> = reference.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], REFERENCE_PREFIX);
        assert_eq!(parts[1].len(), 16);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], now.timestamp_millis().to_string());
    }

    #[test]
    fn references_are_unique_across_calls() {
        let now = Utc::now();
        let a = generate_reference(now);
        let b = generate_reference(now);
        assert_ne!(a, b);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TransactionStatus::parse("settled").is_err());
    }
}
