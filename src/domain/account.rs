//! Account domain entity.
//! Framework-agnostic representation of a ledger account.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Frozen,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Frozen => "frozen",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "frozen" => Ok(AccountStatus::Frozen),
            other => Err(AppError::Internal(format!(
                "unknown account status '{}'",
                other
            ))),
        }
    }
}

/// Domain entity representing a ledger account.
///
/// Balance only changes through [`Account::debit`] and [`Account::credit`];
/// the transfer orchestrator holds the row lock while calling either one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub account_number: String,
    pub holder_name: String,
    pub balance: BigDecimal,
    pub currency: String,
    pub status: AccountStatus,
    /// Incremented on every persisted mutation. Audit trail only; row
    /// locking is what enforces correctness.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn has_sufficient_balance(&self, amount: &BigDecimal) -> bool {
        self.balance >= *amount
    }

    /// Subtracts `amount` from the balance. Exact decimal arithmetic.
    pub fn debit(&mut self, amount: &BigDecimal) -> Result<(), AppError> {
        if !self.has_sufficient_balance(amount) {
            return Err(AppError::InsufficientFunds(format!(
                "account {} has balance {} but {} was requested",
                self.account_number, self.balance, amount
            )));
        }

        self.balance = &self.balance - amount;
        Ok(())
    }

    /// Adds `amount` to the balance. The orchestrator guarantees amount > 0.
    pub fn credit(&mut self, amount: &BigDecimal) {
        self.balance = &self.balance + amount;
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn account_with_balance(balance: &str) -> Account {
        let now = Utc::now();
        Account {
            id: 1,
            account_number: "FROM001-TEST".to_string(),
            holder_name: "Test Holder".to_string(),
            balance: BigDecimal::from_str(balance).unwrap(),
            currency: "USD".to_string(),
            status: AccountStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sufficient_balance_at_exact_amount() {
        let account = account_with_balance("100.00");
        assert!(account.has_sufficient_balance(&BigDecimal::from_str("100.00").unwrap()));
        assert!(!account.has_sufficient_balance(&BigDecimal::from_str("100.01").unwrap()));
    }

    #[test]
    fn debit_subtracts_exactly() {
        let mut account = account_with_balance("1000.00");
        account
            .debit(&BigDecimal::from_str("200.00").unwrap())
            .unwrap();
        assert_eq!(account.balance, BigDecimal::from_str("800.00").unwrap());
    }

    #[test]
    fn debit_insufficient_leaves_balance_unchanged() {
        let mut account = account_with_balance("100.00");
        let result = account.debit(&BigDecimal::from_str("200.00").unwrap());
        assert!(matches!(result, Err(AppError::InsufficientFunds(_))));
        assert_eq!(account.balance, BigDecimal::from_str("100.00").unwrap());
    }

    #[test]
    fn credit_adds_exactly() {
        let mut account = account_with_balance("500.00");
        account.credit(&BigDecimal::from_str("200.00").unwrap());
        assert_eq!(account.balance, BigDecimal::from_str("700.00").unwrap());
    }

    #[test]
    fn debit_to_zero_is_allowed() {
        let mut account = account_with_balance("50.00");
        account
            .debit(&BigDecimal::from_str("50.00").unwrap())
            .unwrap();
        assert_eq!(account.balance, BigDecimal::from_str("0.00").unwrap());
    }

    #[test]
    fn fractional_cents_round_trip_exactly() {
        // 0.1 + 0.2 style drift must not happen with BigDecimal.
        let mut account = account_with_balance("0.30");
        account
            .debit(&BigDecimal::from_str("0.10").unwrap())
            .unwrap();
        account
            .debit(&BigDecimal::from_str("0.20").unwrap())
            .unwrap();
        assert_eq!(account.balance, BigDecimal::from_str("0.00").unwrap());
    }

    #[test]
    fn inactive_and_frozen_are_not_active() {
        let mut account = account_with_balance("10.00");
        assert!(account.is_active());
        account.status = AccountStatus::Inactive;
        assert!(!account.is_active());
        account.status = AccountStatus::Frozen;
        assert!(!account.is_active());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Inactive,
            AccountStatus::Frozen,
        ] {
            assert_eq!(AccountStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(AccountStatus::parse("closed").is_err());
    }
}
