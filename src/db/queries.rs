//! Ledger store access. Locking reads and writes take a caller-supplied
//! `sqlx::Transaction` so the orchestrator controls the atomic scope;
//! read-side lookups run against the pool directly.

use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountStatus, Transaction, TransactionStatus, TransactionType,
};
use crate::error::AppError;

/// Row-lock statuses that make a later identical request a duplicate.
pub const DUPLICATE_STATUSES: &[&str] = &["pending", "processing", "completed"];

// --- Account queries ---

/// Exclusive-lock read of an account row. Blocks until any other holder's
/// transaction commits or rolls back.
pub async fn find_account_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account_number: &str,
) -> Result<Option<Account>, AppError> {
    let row = sqlx::query_as::<_, AccountRow>(
        "SELECT * FROM accounts WHERE account_number = $1 FOR UPDATE",
    )
    .bind(account_number)
    .fetch_optional(&mut **executor)
    .await?;

    row.map(AccountRow::into_domain).transpose()
}

pub async fn find_account_by_number(
    pool: &PgPool,
    account_number: &str,
) -> Result<Option<Account>, AppError> {
    let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE account_number = $1")
        .bind(account_number)
        .fetch_optional(pool)
        .await?;

    row.map(AccountRow::into_domain).transpose()
}

/// Persists a locked account's balance and bumps the audit version.
pub async fn update_account_balance(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account: &Account,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE accounts SET balance = $2, version = version + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(account.id)
    .bind(&account.balance)
    .execute(&mut **executor)
    .await?;

    Ok(())
}

// --- Transaction queries ---

pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction, AppError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO transactions (
            id, reference, tx_type, source_account_id, destination_account_id,
            amount, currency, status, description, failure_reason, metadata,
            created_at, updated_at, processed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(&tx.reference)
    .bind(tx.tx_type.as_str())
    .bind(tx.source_account_id)
    .bind(tx.destination_account_id)
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(tx.status.as_str())
    .bind(&tx.description)
    .bind(&tx.failure_reason)
    .bind(&tx.metadata)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .bind(tx.processed_at)
    .fetch_one(pool)
    .await?;

    row.into_domain()
}

/// Writes a status transition inside the caller's atomic scope.
pub async fn update_transaction_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2, failure_reason = $3, updated_at = $4, processed_at = $5
        WHERE id = $1
        "#,
    )
    .bind(tx.id)
    .bind(tx.status.as_str())
    .bind(&tx.failure_reason)
    .bind(tx.updated_at)
    .bind(tx.processed_at)
    .execute(&mut **executor)
    .await?;

    Ok(())
}

/// Best-effort failure marking, in its own short transaction. Guarded on
/// `status = 'pending'` so it never races the sweeper or clobbers a
/// terminal state. Returns whether a row was updated.
pub async fn mark_transaction_failed(
    pool: &PgPool,
    id: Uuid,
    reason: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'failed', failure_reason = $2, updated_at = NOW(), processed_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>, AppError> {
    let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(TransactionRow::into_domain).transpose()
}

pub async fn list_account_transactions(
    pool: &PgPool,
    account_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>, AppError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT * FROM transactions
        WHERE source_account_id = $1 OR destination_account_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TransactionRow::into_domain).collect()
}

/// Duplicate detector: any transaction between the exact ordered account
/// pair, for the exact amount, created within the lookback window, whose
/// status still counts as live or settled. The in-flight transfer's own
/// pending record is excluded.
pub async fn find_recent_duplicates(
    executor: &mut SqlxTransaction<'_, Postgres>,
    source_account_id: i64,
    destination_account_id: i64,
    amount: &BigDecimal,
    since: DateTime<Utc>,
    exclude_id: Uuid,
) -> Result<Vec<Transaction>, AppError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT * FROM transactions
        WHERE source_account_id = $1
        AND destination_account_id = $2
        AND amount = $3
        AND created_at >= $4
        AND status = ANY($5)
        AND id <> $6
        "#,
    )
    .bind(source_account_id)
    .bind(destination_account_id)
    .bind(amount)
    .bind(since)
    .bind(DUPLICATE_STATUSES)
    .bind(exclude_id)
    .fetch_all(&mut **executor)
    .await?;

    rows.into_iter().map(TransactionRow::into_domain).collect()
}

/// Candidates for the stale-pending sweep.
pub async fn find_pending_older_than(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Transaction>, AppError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT * FROM transactions WHERE status = 'pending' AND created_at < $1 ORDER BY created_at ASC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TransactionRow::into_domain).collect()
}

// --- Row types. Internal to the db layer; statuses live as text in
// Postgres and parse into the domain enums on the way out. ---

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    account_number: String,
    holder_name: String,
    balance: BigDecimal,
    currency: String,
    status: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> Result<Account, AppError> {
        Ok(Account {
            id: self.id,
            account_number: self.account_number,
            holder_name: self.holder_name,
            balance: self.balance,
            currency: self.currency.trim().to_string(),
            status: AccountStatus::parse(&self.status)?,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    tx_type: String,
    source_account_id: Option<i64>,
    destination_account_id: i64,
    amount: BigDecimal,
    currency: String,
    status: String,
    description: Option<String>,
    failure_reason: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> Result<Transaction, AppError> {
        Ok(Transaction {
            id: self.id,
            reference: self.reference,
            tx_type: TransactionType::parse(&self.tx_type)?,
            source_account_id: self.source_account_id,
            destination_account_id: self.destination_account_id,
            amount: self.amount,
            currency: self.currency.trim().to_string(),
            status: TransactionStatus::parse(&self.status)?,
            description: self.description,
            failure_reason: self.failure_reason,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            processed_at: self.processed_at,
        })
    }
}
