//! Transfer orchestrator. Acquires row locks in canonical order, validates
//! business rules against locked state, mutates balances, and commits the
//! whole move as one unit. Any failure after the pending record exists is
//! recorded on that record in a second, independent write.

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::CacheInvalidator;
use crate::config::TransferConfig;
use crate::db::queries;
use crate::domain::{Account, Transaction, TransactionStatus};
use crate::error::AppError;
use crate::validation;

const MAX_LIST_LIMIT: i64 = 100;
const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_account: String,
    pub destination_account: String,
    pub amount: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct TransferService {
    pool: PgPool,
    cache: Arc<dyn CacheInvalidator>,
    config: TransferConfig,
}

impl TransferService {
    pub fn new(pool: PgPool, cache: Arc<dyn CacheInvalidator>, config: TransferConfig) -> Self {
        Self {
            pool,
            cache,
            config,
        }
    }

    /// Moves `amount` from the source account to the destination account.
    ///
    /// Preconditions are checked before any record or lock exists. The
    /// pending record is then persisted on its own, so a crash before or
    /// during the locked phase leaves forensic evidence for the sweeper.
    /// The locked phase itself commits atomically or not at all.
    pub async fn transfer_funds(&self, request: TransferRequest) -> Result<Transaction, AppError> {
        let source_number = validation::sanitize_string(&request.source_account);
        let destination_number = validation::sanitize_string(&request.destination_account);

        validation::validate_account_number("source_account", &source_number)
            .map_err(|e| AppError::InvalidTransfer(e.to_string()))?;
        validation::validate_account_number("destination_account", &destination_number)
            .map_err(|e| AppError::InvalidTransfer(e.to_string()))?;

        if source_number == destination_number {
            return Err(AppError::InvalidTransfer(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let amount = validation::parse_amount(&request.amount)
            .map_err(|e| AppError::InvalidTransfer(e.to_string()))?;

        if amount < self.config.min_transfer_amount {
            return Err(AppError::InvalidTransfer(format!(
                "amount {} is below the minimum transfer amount {}",
                amount, self.config.min_transfer_amount
            )));
        }
        if amount > self.config.single_transfer_limit {
            return Err(AppError::InvalidTransfer(format!(
                "amount {} exceeds the single transfer limit {}",
                amount, self.config.single_transfer_limit
            )));
        }

        // Plain reads to resolve ids and currency for the audit record.
        // Fresh state is re-read under lock below.
        let source = queries::find_account_by_number(&self.pool, &source_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(source_number.clone()))?;
        let destination = queries::find_account_by_number(&self.pool, &destination_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(destination_number.clone()))?;

        let mut record = Transaction::new_transfer(
            source.id,
            destination.id,
            amount.clone(),
            source.currency.clone(),
            request.description.clone(),
            request.metadata.clone(),
        );
        record = queries::insert_transaction(&self.pool, &record).await?;

        match self
            .execute_locked(&mut record, &source_number, &destination_number, &amount)
            .await
        {
            Ok(()) => {
                info!(
                    reference = %record.reference,
                    source = %source_number,
                    destination = %destination_number,
                    amount = %amount,
                    "Transfer completed"
                );
                self.invalidate_accounts(&source_number, &destination_number);
                Ok(record)
            }
            Err(e) => {
                let error = match e {
                    AppError::Database(inner) => AppError::TransferFailed(inner.to_string()),
                    other => other,
                };
                self.record_failure(record.id, &error).await;
                Err(error)
            }
        }
    }

    /// The atomic phase: everything between BEGIN and COMMIT. Returning
    /// early drops the scope, which rolls back every write in it.
    async fn execute_locked(
        &self,
        record: &mut Transaction,
        source_number: &str,
        destination_number: &str,
        amount: &BigDecimal,
    ) -> Result<(), AppError> {
        let mut scope = self.pool.begin().await?;

        let (mut source, mut destination) =
            lock_account_pair(&mut scope, source_number, destination_number).await?;

        if !source.is_active() {
            return Err(AppError::InvalidTransfer(format!(
                "source account {} is {}",
                source.account_number,
                source.status.as_str()
            )));
        }
        if !destination.is_active() {
            return Err(AppError::InvalidTransfer(format!(
                "destination account {} is {}",
                destination.account_number,
                destination.status.as_str()
            )));
        }
        if source.currency != destination.currency {
            return Err(AppError::InvalidTransfer(format!(
                "currency mismatch: {} is in {}, {} is in {}",
                source.account_number,
                source.currency,
                destination.account_number,
                destination.currency
            )));
        }
        if !source.has_sufficient_balance(amount) {
            return Err(AppError::InsufficientFunds(format!(
                "account {} has balance {} but {} was requested",
                source.account_number, source.balance, amount
            )));
        }

        let since = Utc::now() - Duration::seconds(self.config.duplicate_window_secs as i64);
        let duplicates = queries::find_recent_duplicates(
            &mut scope,
            source.id,
            destination.id,
            amount,
            since,
            record.id,
        )
        .await?;
        if let Some(existing) = duplicates.first() {
            return Err(AppError::DuplicateTransaction(format!(
                "a matching transfer {} already exists between {} and {}",
                existing.reference, source.account_number, destination.account_number
            )));
        }

        // Persisted before balances move, so a crash mid-flight leaves a
        // processing row instead of silence.
        record.transition_to(TransactionStatus::Processing)?;
        queries::update_transaction_status(&mut scope, record).await?;

        source.debit(amount)?;
        destination.credit(amount);
        queries::update_account_balance(&mut scope, &source).await?;
        queries::update_account_balance(&mut scope, &destination).await?;

        record.transition_to(TransactionStatus::Completed)?;
        queries::update_transaction_status(&mut scope, record).await?;

        scope.commit().await?;
        Ok(())
    }

    /// Second, independent write marking the record failed, so the failure
    /// stays auditable even though the money never moved. Best-effort: its
    /// own failure is logged and left for the sweeper.
    async fn record_failure(&self, id: Uuid, error: &AppError) {
        match queries::mark_transaction_failed(&self.pool, id, &error.to_string()).await {
            Ok(true) => {}
            Ok(false) => warn!(
                transaction_id = %id,
                "Failure-marking write matched no pending row"
            ),
            Err(e) => error!(
                transaction_id = %id,
                "Failed to mark transaction as failed: {}", e
            ),
        }
    }

    fn invalidate_accounts(&self, source_number: &str, destination_number: &str) {
        let cache = Arc::clone(&self.cache);
        let source = source_number.to_string();
        let destination = destination_number.to_string();
        tokio::spawn(async move {
            cache.invalidate(&source).await;
            cache.invalidate(&destination).await;
        });
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        queries::get_transaction(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))
    }

    pub async fn get_account_transactions(
        &self,
        account_number: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Transaction>, AppError> {
        let account_number = validation::sanitize_string(account_number);
        let account = queries::find_account_by_number(&self.pool, &account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.clone()))?;

        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        queries::list_account_transactions(&self.pool, account.id, limit, offset).await
    }

    /// Marks transactions stuck in `pending` beyond the timeout as failed,
    /// each in its own write so one failure does not block the rest.
    /// Recovers transfers orphaned by a crash before any lock was taken.
    pub async fn sweep_stale_pending(&self, timeout: std::time::Duration) -> Result<usize, AppError> {
        let cutoff = Utc::now() - Duration::from_std(timeout)
            .map_err(|e| AppError::Internal(format!("invalid sweep timeout: {}", e)))?;

        let stale = queries::find_pending_older_than(&self.pool, cutoff).await?;
        let mut swept = 0;
        for tx in stale {
            match queries::mark_transaction_failed(&self.pool, tx.id, "timeout").await {
                Ok(true) => {
                    info!(reference = %tx.reference, "Swept stale pending transaction");
                    swept += 1;
                }
                // The orchestrator moved it out of pending in the meantime.
                Ok(false) => {}
                Err(e) => error!(reference = %tx.reference, "Sweep failed: {}", e),
            }
        }

        Ok(swept)
    }
}

/// Locks both account rows, always in lexical order of account number, so
/// two transfers over the same pair in opposite directions can never
/// deadlock. Returns them as (source, destination).
async fn lock_account_pair(
    scope: &mut SqlxTransaction<'_, Postgres>,
    source_number: &str,
    destination_number: &str,
) -> Result<(Account, Account), AppError> {
    let (first, second) = canonical_order(source_number, destination_number);

    let first_account = queries::find_account_for_update(scope, first)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(first.to_string()))?;
    let second_account = queries::find_account_for_update(scope, second)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(second.to_string()))?;

    if first == source_number {
        Ok((first_account, second_account))
    } else {
        Ok((second_account, first_account))
    }
}

/// Deterministic total order over a pair of account numbers.
fn canonical_order<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoopCacheInvalidator;
    use sqlx::postgres::PgPoolOptions;
    use std::str::FromStr;

    // Precondition checks run before any query, so a lazy pool that never
    // connects is enough to exercise them.
    fn service_with_bounds(min: &str, limit: &str) -> TransferService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/ledger_test")
            .expect("lazy pool");
        let config = TransferConfig {
            min_transfer_amount: BigDecimal::from_str(min).unwrap(),
            single_transfer_limit: BigDecimal::from_str(limit).unwrap(),
            ..TransferConfig::default()
        };
        TransferService::new(pool, Arc::new(NoopCacheInvalidator), config)
    }

    fn request(amount: &str) -> TransferRequest {
        TransferRequest {
            source_account: "ACC-0000000001".to_string(),
            destination_account: "ACC-0000000002".to_string(),
            amount: amount.to_string(),
            description: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn amount_below_minimum_names_the_bound() {
        let svc = service_with_bounds("10.00", "10000.00");
        let err = svc.transfer_funds(request("5.00")).await.unwrap_err();
        match err {
            AppError::InvalidTransfer(msg) => {
                assert!(msg.contains("minimum transfer amount"), "got: {}", msg);
                assert!(msg.contains("10.00"), "got: {}", msg);
            }
            other => panic!("expected InvalidTransfer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn amount_above_limit_names_the_bound() {
        let svc = service_with_bounds("0.01", "10000.00");
        let err = svc.transfer_funds(request("20000.00")).await.unwrap_err();
        match err {
            AppError::InvalidTransfer(msg) => {
                assert!(msg.contains("single transfer limit"), "got: {}", msg);
                assert!(msg.contains("10000.00"), "got: {}", msg);
            }
            other => panic!("expected InvalidTransfer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn amount_at_the_bounds_passes_precondition() {
        // Exactly at either bound is allowed; the lazy pool then fails the
        // account lookup, which proves the bound check let it through.
        let svc = service_with_bounds("10.00", "10000.00");
        for amount in ["10.00", "10000.00"] {
            let err = svc.transfer_funds(request(amount)).await.unwrap_err();
            assert!(
                !matches!(err, AppError::InvalidTransfer(_)),
                "amount {} was rejected by a precondition: {}",
                amount,
                err
            );
        }
    }

    #[test]
    fn canonical_order_is_symmetric() {
        assert_eq!(canonical_order("FROM001-ACC", "TO001-ACCNT"), ("FROM001-ACC", "TO001-ACCNT"));
        assert_eq!(canonical_order("TO001-ACCNT", "FROM001-ACC"), ("FROM001-ACC", "TO001-ACCNT"));
    }

    #[test]
    fn canonical_order_is_lexical() {
        let (first, second) = canonical_order("ZZZ-9999999999", "AAA-0000000001");
        assert!(first <= second);
    }
}
