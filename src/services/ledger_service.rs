//! Wallet ledger updates.
//!
//! Every balance change goes through `SqliteDatabase::update_wallet_balance`,
//! which adjusts the balance and writes the transaction row in one database
//! transaction. Errors from the store are returned as-is; nothing is retried.

use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::transaction::{LedgerReceipt, Transaction, TransactionType};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct LedgerService {
    database: Arc<SqliteDatabase>,
    feed: ChangeFeed,
}

impl LedgerService {
    pub fn new(database: Arc<SqliteDatabase>, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    /// Applies a signed delta: positive credits, negative debits.
    pub async fn apply(
        &self,
        user_id: &Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        reference: &str,
    ) -> Result<LedgerReceipt> {
        self.mutate(user_id, amount, transaction_type, reference, None).await
    }

    /// Applies the delta for an existing row and marks that row completed
    /// under `reference`.
    pub async fn settle(
        &self,
        user_id: &Uuid,
        transaction_id: &Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        reference: &str,
    ) -> Result<LedgerReceipt> {
        self.mutate(user_id, amount, transaction_type, reference, Some(*transaction_id))
            .await
    }

    async fn mutate(
        &self,
        user_id: &Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        reference: &str,
        settle: Option<Uuid>,
    ) -> Result<LedgerReceipt> {
        let receipt = self
            .database
            .update_wallet_balance(user_id, amount, transaction_type, reference, settle)
            .await
            .map_err(|e| {
                warn!(action = "ledger_update_failed", user_id = %user_id, amount = %amount, transaction_type = %transaction_type, error = %e);
                e
            })?;

        let op = if settle.is_some() { ChangeOp::Update } else { ChangeOp::Insert };
        self.feed.publish("transactions", op, receipt.transaction_id, Some(*user_id));
        self.feed.publish("profiles", ChangeOp::Update, user_id, Some(*user_id));

        info!(
            action = "ledger_applied",
            user_id = %user_id,
            amount = %amount,
            transaction_type = %transaction_type,
            transaction_id = %receipt.transaction_id,
            new_balance = %receipt.new_balance
        );
        Ok(receipt)
    }

    pub async fn balance(&self, user_id: &Uuid) -> Result<Decimal> {
        self.database
            .get_profile_by_id(user_id)
            .await?
            .map(|p| p.wallet_balance)
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
    }

    pub async fn history(&self, user_id: &Uuid, limit: Option<i64>) -> Result<Vec<Transaction>> {
        let limit = limit.unwrap_or(50).clamp(1, 500);
        self.database.list_user_transactions(user_id, limit).await
    }

    pub async fn all_transactions(&self, limit: Option<i64>) -> Result<Vec<Transaction>> {
        let limit = limit.unwrap_or(100).clamp(1, 1000);
        self.database.list_transactions(limit).await
    }

    /// Single transaction, visible only to its owner.
    pub async fn transaction_for(&self, user_id: &Uuid, transaction_id: &Uuid) -> Result<Transaction> {
        self.database
            .get_transaction(transaction_id)
            .await?
            .filter(|t| t.user_id == *user_id)
            .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))
    }
}
