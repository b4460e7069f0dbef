//! Bank withdrawals.
//!
//! A withdrawal row moves `pending -> completed` or `pending -> failed`. The
//! row is written before the transfer API is called, and the handler never
//! returns while it is still pending.

use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::gateways::transfer_api::{TransferGateway, TransferRequest};
use crate::models::notification::NotificationType;
use crate::models::profile::AccountStatus;
use crate::models::transaction::{Transaction, TransactionStatus, TransactionType, WithdrawalRequest};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use crate::services::ledger_service::LedgerService;
use crate::services::notification_service::NotificationService;
use crate::utils::validation::Validator;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

struct Payee {
    bank_code: String,
    account_number: String,
    account_name: String,
}

pub struct WithdrawalService {
    database: Arc<SqliteDatabase>,
    gateway: Arc<dyn TransferGateway>,
    ledger: Arc<LedgerService>,
    notifications: Arc<NotificationService>,
    feed: ChangeFeed,
    min_amount: Decimal,
}

impl WithdrawalService {
    pub fn new(
        database: Arc<SqliteDatabase>,
        gateway: Arc<dyn TransferGateway>,
        ledger: Arc<LedgerService>,
        notifications: Arc<NotificationService>,
        feed: ChangeFeed,
        min_amount: Decimal,
    ) -> Self {
        Self { database, gateway, ledger, notifications, feed, min_amount }
    }

    pub async fn withdraw(&self, user_id: &Uuid, request: &WithdrawalRequest) -> Result<Transaction> {
        let key = request.idempotency_key.trim();
        Validator::validate_required("Idempotency key", key)?;

        if let Some(existing) = self.database.find_transaction_by_idempotency_key(user_id, key).await? {
            info!(action = "withdrawal_replayed", user_id = %user_id, transaction_id = %existing.id);
            return Ok(existing);
        }

        let payee = self.validate(user_id, request).await?;
        let pending = self.open(user_id, request.amount, key).await?;

        let transfer = TransferRequest {
            amount: request.amount,
            bank_code: payee.bank_code,
            account_number: payee.account_number,
            account_name: payee.account_name,
            reference: pending.id.to_string(),
            narration: request
                .narration
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "TradeVault withdrawal".to_string()),
        };

        match self.gateway.transfer(&transfer).await {
            Ok(receipt) => self.complete(&pending, &receipt.transfer_id).await,
            Err(e) => {
                self.fail(&pending, &e).await;
                Err(e)
            }
        }
    }

    /// Runs before any row is written or any remote call is made.
    async fn validate(&self, user_id: &Uuid, request: &WithdrawalRequest) -> Result<Payee> {
        if request.amount < self.min_amount {
            return Err(AppError::ValidationError(format!(
                "Minimum withdrawal is ₦{}",
                self.min_amount
            )));
        }

        let payee = match request.payment_method_id {
            Some(method_id) => {
                let method = self
                    .database
                    .get_payment_method(user_id, &method_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Payment method not found".to_string()))?;
                Payee {
                    bank_code: method.bank_code,
                    account_number: method.account_number,
                    account_name: method.account_name,
                }
            }
            None => {
                let bank_code = request.bank_code.as_deref().unwrap_or_default().trim();
                let account_number = request.account_number.as_deref().unwrap_or_default().trim();
                Validator::validate_required("Bank code", bank_code)?;
                Validator::validate_required("Account number", account_number)?;
                Validator::validate_bank_code(bank_code)?;
                Validator::validate_account_number(account_number)?;
                Payee {
                    bank_code: bank_code.to_string(),
                    account_number: account_number.to_string(),
                    account_name: request.account_name.clone().unwrap_or_default().trim().to_string(),
                }
            }
        };

        let profile = self
            .database
            .get_profile_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        if profile.account_status != AccountStatus::Active {
            return Err(AppError::ValidationError("Account is not active".to_string()));
        }
        if profile.wallet_balance < request.amount {
            return Err(AppError::ValidationError("Insufficient balance".to_string()));
        }

        Ok(payee)
    }

    async fn open(&self, user_id: &Uuid, amount: Decimal, key: &str) -> Result<Transaction> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let transaction = Transaction {
            id,
            user_id: *user_id,
            amount: -amount,
            transaction_type: TransactionType::Withdrawal,
            status: TransactionStatus::Pending,
            reference: format!("withdrawal:{}", id),
            idempotency_key: Some(key.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.database.insert_transaction(&transaction).await?;
        self.feed.publish("transactions", ChangeOp::Insert, id, Some(*user_id));

        info!(action = "withdrawal_pending", user_id = %user_id, transaction_id = %id, amount = %amount);
        Ok(transaction)
    }

    async fn complete(&self, pending: &Transaction, transfer_id: &str) -> Result<Transaction> {
        let reference = format!("{}:{}", pending.reference, transfer_id);

        // Status, reference and balance land in one ledger transaction.
        let settled = self
            .ledger
            .settle(&pending.user_id, &pending.id, pending.amount, TransactionType::Withdrawal, &reference)
            .await;

        match settled {
            Ok(receipt) => {
                info!(
                    action = "withdrawal_completed",
                    user_id = %pending.user_id,
                    transaction_id = %pending.id,
                    transfer_id = %transfer_id,
                    new_balance = %receipt.new_balance
                );
                self.notifications
                    .notify(
                        &pending.user_id,
                        "Withdrawal successful",
                        &format!("₦{} has been sent to your bank account", -pending.amount),
                        NotificationType::Success,
                        Some("/transactions"),
                    )
                    .await;
            }
            Err(e) => {
                // Money has left; the row stays completed and is flagged.
                error!(
                    action = "withdrawal_ledger_mismatch",
                    user_id = %pending.user_id,
                    transaction_id = %pending.id,
                    transfer_id = %transfer_id,
                    error = %e
                );
                let flagged = format!("{}:unreconciled", reference);
                if let Err(e) = self
                    .database
                    .update_transaction_status(&pending.id, TransactionStatus::Completed, Some(&flagged))
                    .await
                {
                    error!(action = "withdrawal_flag_failed", transaction_id = %pending.id, error = %e);
                }
                self.feed.publish("transactions", ChangeOp::Update, pending.id, Some(pending.user_id));
            }
        }

        self.database
            .get_transaction(&pending.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", pending.id)))
    }

    async fn fail(&self, pending: &Transaction, cause: &AppError) {
        warn!(action = "withdrawal_failed", user_id = %pending.user_id, transaction_id = %pending.id, error = %cause);
        match self
            .database
            .update_transaction_status(&pending.id, TransactionStatus::Failed, None)
            .await
        {
            Ok(()) => self.feed.publish("transactions", ChangeOp::Update, pending.id, Some(pending.user_id)),
            Err(e) => error!(action = "withdrawal_fail_update_failed", transaction_id = %pending.id, error = %e),
        }
        self.notifications
            .notify(
                &pending.user_id,
                "Withdrawal failed",
                "Your withdrawal could not be processed. No funds were deducted.",
                NotificationType::Error,
                Some("/transactions"),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;
    use crate::gateways::transfer_api::TransferReceipt;
    use crate::models::payment_method::PaymentMethod;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the row status seen at call time, then succeeds or fails.
    struct ScriptedGateway {
        database: Arc<SqliteDatabase>,
        succeed: bool,
        observed: Mutex<Vec<TransactionStatus>>,
    }

    #[async_trait]
    impl TransferGateway for ScriptedGateway {
        async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
            let id = Uuid::parse_str(&request.reference).unwrap();
            let row = self.database.get_transaction(&id).await.unwrap().unwrap();
            self.observed.lock().unwrap().push(row.status);
            if self.succeed {
                Ok(TransferReceipt { transfer_id: "TRF_001".to_string() })
            } else {
                Err(AppError::ExternalServiceError("Transfer API returned 400".to_string()))
            }
        }
    }

    struct Harness {
        service: WithdrawalService,
        gateway: Arc<ScriptedGateway>,
        ledger: Arc<LedgerService>,
        database: Arc<SqliteDatabase>,
        user_id: Uuid,
    }

    async fn harness(succeed: bool, opening_balance: i64) -> Harness {
        let database = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("withdraw@example.com");
        database.create_profile(&profile).await.unwrap();
        let feed = ChangeFeed::default();
        let ledger = Arc::new(LedgerService::new(database.clone(), feed.clone()));
        if opening_balance > 0 {
            ledger
                .apply(&profile.id, Decimal::from(opening_balance), TransactionType::Fund, "seed")
                .await
                .unwrap();
        }
        let gateway = Arc::new(ScriptedGateway {
            database: database.clone(),
            succeed,
            observed: Mutex::new(vec![]),
        });
        let notifications = Arc::new(NotificationService::new(database.clone(), feed.clone()));
        let service = WithdrawalService::new(
            database.clone(),
            gateway.clone(),
            ledger.clone(),
            notifications,
            feed,
            Decimal::from(1000),
        );
        Harness { service, gateway, ledger, database, user_id: profile.id }
    }

    fn request(amount: i64, key: &str) -> WithdrawalRequest {
        WithdrawalRequest {
            amount: Decimal::from(amount),
            payment_method_id: None,
            bank_code: Some("058".to_string()),
            account_number: Some("0123456789".to_string()),
            account_name: Some("Ada Obi".to_string()),
            narration: None,
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn successful_transfer_completes_row_and_debits() {
        let h = harness(true, 10_000).await;

        let tx = h.service.withdraw(&h.user_id, &request(4_000, "k1")).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.amount, Decimal::from(-4_000));
        assert_eq!(tx.reference, format!("withdrawal:{}:TRF_001", tx.id));
        assert_eq!(h.gateway.observed.lock().unwrap().as_slice(), [TransactionStatus::Pending]);
        assert_eq!(h.ledger.balance(&h.user_id).await.unwrap(), Decimal::from(6_000));

        // Settlement reuses the pending row.
        let rows = h.ledger.history(&h.user_id, None).await.unwrap();
        assert_eq!(rows.iter().filter(|r| r.transaction_type == TransactionType::Withdrawal).count(), 1);
    }

    #[tokio::test]
    async fn failed_transfer_marks_row_failed_and_keeps_balance() {
        let h = harness(false, 10_000).await;

        let err = h.service.withdraw(&h.user_id, &request(4_000, "k1")).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
        assert_eq!(h.gateway.observed.lock().unwrap().as_slice(), [TransactionStatus::Pending]);

        let row = h.database.find_transaction_by_idempotency_key(&h.user_id, "k1").await.unwrap().unwrap();
        assert_eq!(row.status, TransactionStatus::Failed);
        assert_eq!(h.ledger.balance(&h.user_id).await.unwrap(), Decimal::from(10_000));
    }

    #[tokio::test]
    async fn no_row_is_left_pending_either_way() {
        for succeed in [true, false] {
            let h = harness(succeed, 5_000).await;
            let _ = h.service.withdraw(&h.user_id, &request(2_000, "k")).await;
            let rows = h.ledger.history(&h.user_id, None).await.unwrap();
            assert!(rows.iter().all(|r| r.status != TransactionStatus::Pending));
        }
    }

    #[tokio::test]
    async fn validation_failures_write_nothing_and_call_nothing() {
        let h = harness(true, 5_000).await;

        let below_minimum = request(999, "a");
        let overdraft = request(5_001, "b");
        let mut bad_account = request(2_000, "c");
        bad_account.account_number = Some("12345".to_string());
        let mut no_bank = request(2_000, "d");
        no_bank.bank_code = None;

        for req in [below_minimum, overdraft, bad_account, no_bank] {
            let err = h.service.withdraw(&h.user_id, &req).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)), "{:?}", err);
        }
        assert!(h.gateway.observed.lock().unwrap().is_empty());
        assert_eq!(h.ledger.history(&h.user_id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn suspended_account_is_rejected() {
        let h = harness(true, 5_000).await;
        h.database.update_account_status(&h.user_id, AccountStatus::Suspended).await.unwrap();

        let err = h.service.withdraw(&h.user_id, &request(2_000, "k")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(h.gateway.observed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_key_returns_original_without_second_transfer() {
        let h = harness(true, 10_000).await;

        let first = h.service.withdraw(&h.user_id, &request(2_000, "same")).await.unwrap();
        let second = h.service.withdraw(&h.user_id, &request(2_000, "same")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(h.gateway.observed.lock().unwrap().len(), 1);
        assert_eq!(h.ledger.balance(&h.user_id).await.unwrap(), Decimal::from(8_000));
    }

    #[tokio::test]
    async fn saved_payment_method_supplies_bank_details() {
        let h = harness(true, 10_000).await;
        let method = PaymentMethod {
            id: Uuid::new_v4(),
            user_id: h.user_id,
            bank_name: "GTBank".to_string(),
            bank_code: "058".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "Ada Obi".to_string(),
            created_at: Utc::now(),
        };
        h.database.create_payment_method(&method).await.unwrap();

        let mut req = request(1_500, "pm");
        req.bank_code = None;
        req.account_number = None;
        req.payment_method_id = Some(method.id);

        let tx = h.service.withdraw(&h.user_id, &req).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn ledger_failure_after_transfer_flags_row() {
        let h = harness(true, 10_000).await;
        // Drain the balance between validation and settlement.
        struct DrainingGateway {
            ledger: Arc<LedgerService>,
            user_id: Uuid,
        }

        #[async_trait]
        impl TransferGateway for DrainingGateway {
            async fn transfer(&self, _request: &TransferRequest) -> Result<TransferReceipt> {
                self.ledger
                    .apply(&self.user_id, Decimal::from(-9_500), TransactionType::Airtime, "race")
                    .await
                    .unwrap();
                Ok(TransferReceipt { transfer_id: "TRF_RACE".to_string() })
            }
        }

        let feed = ChangeFeed::default();
        let service = WithdrawalService::new(
            h.database.clone(),
            Arc::new(DrainingGateway { ledger: h.ledger.clone(), user_id: h.user_id }),
            h.ledger.clone(),
            Arc::new(NotificationService::new(h.database.clone(), feed.clone())),
            feed,
            Decimal::from(1000),
        );

        let tx = service.withdraw(&h.user_id, &request(2_000, "race")).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.reference, format!("withdrawal:{}:TRF_RACE:unreconciled", tx.id));
        assert_eq!(h.ledger.balance(&h.user_id).await.unwrap(), Decimal::from(500));

        let rows = h.ledger.history(&h.user_id, None).await.unwrap();
        assert!(rows.iter().all(|r| r.status != TransactionStatus::Pending));
        assert_eq!(rows.iter().filter(|r| r.transaction_type == TransactionType::Withdrawal).count(), 1);
    }

    #[tokio::test]
    async fn settlement_failure_is_flagged_in_a_single_write() {
        let h = harness(true, 10_000).await;
        // The row is still pending when settlement fails, so only the flag
        // write moves it out of pending.
        struct ObservingDrain {
            ledger: Arc<LedgerService>,
            database: Arc<SqliteDatabase>,
            user_id: Uuid,
        }

        #[async_trait]
        impl TransferGateway for ObservingDrain {
            async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
                self.ledger
                    .apply(&self.user_id, Decimal::from(-10_000), TransactionType::Airtime, "drain")
                    .await
                    .unwrap();
                let id = Uuid::parse_str(&request.reference).unwrap();
                let row = self.database.get_transaction(&id).await.unwrap().unwrap();
                assert_eq!(row.status, TransactionStatus::Pending);
                Ok(TransferReceipt { transfer_id: "TRF_LATE".to_string() })
            }
        }

        let feed = ChangeFeed::default();
        let mut rx = feed.subscribe();
        let service = WithdrawalService::new(
            h.database.clone(),
            Arc::new(ObservingDrain { ledger: h.ledger.clone(), database: h.database.clone(), user_id: h.user_id }),
            h.ledger.clone(),
            Arc::new(NotificationService::new(h.database.clone(), feed.clone())),
            feed,
            Decimal::from(1000),
        );

        let tx = service.withdraw(&h.user_id, &request(3_000, "late")).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.reference, format!("withdrawal:{}:TRF_LATE:unreconciled", tx.id));
        assert_eq!(h.ledger.balance(&h.user_id).await.unwrap(), Decimal::ZERO);

        let inserted = rx.recv().await.unwrap();
        assert_eq!(inserted.op, ChangeOp::Insert);
        let flagged = rx.recv().await.unwrap();
        assert_eq!(flagged.op, ChangeOp::Update);
        assert_eq!(flagged.row_id, tx.id.to_string());
    }
}
