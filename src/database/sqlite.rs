use crate::errors::{AppError, Result};
use crate::models::exchange_rate::ExchangeRate;
use crate::models::gift_card::GiftCardSubmission;
use crate::models::kyc::KycSubmission;
use crate::models::notification::{Notification, NotificationType};
use crate::models::payment_method::PaymentMethod;
use crate::models::profile::{AccountStatus, KycStatus, Profile, Role};
use crate::models::transaction::{LedgerReceipt, Transaction, TransactionStatus, TransactionType};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn new(database_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::DatabaseError(format!("Failed to create database directory: {}", e)))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", database_path))
            .map_err(|e| AppError::DatabaseError(format!("Invalid database path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;

        info!(action = "database_connected", path = %database_path);
        Ok(db)
    }

    /// Single-connection in-memory store. Every connection to `:memory:` is a
    /// separate database, so the pool is pinned to one connection for life.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Invalid database url: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                kyc_status TEXT NOT NULL DEFAULT 'not_submitted',
                wallet_balance TEXT NOT NULL DEFAULT '0',
                account_status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                token_id TEXT UNIQUE NOT NULL,
                token_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                is_active BOOLEAN DEFAULT TRUE
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                transaction_type TEXT NOT NULL, -- 'deposit', 'withdrawal', 'fund', 'giftcard', 'airtime'
                status TEXT NOT NULL DEFAULT 'pending', -- 'pending', 'completed', 'failed'
                reference TEXT NOT NULL,
                idempotency_key TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, idempotency_key),
                FOREIGN KEY (user_id) REFERENCES profiles (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS kyc_submissions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                full_name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                address TEXT NOT NULL,
                id_type TEXT NOT NULL,
                id_number TEXT NOT NULL,
                document_url TEXT NOT NULL,
                selfie_url TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                admin_notes TEXT,
                submitted_at TEXT NOT NULL,
                reviewed_at TEXT,
                FOREIGN KEY (user_id) REFERENCES profiles (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS exchange_rates (
                currency_code TEXT PRIMARY KEY,
                currency_name TEXT NOT NULL,
                buy_rate TEXT NOT NULL,
                sell_rate TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                is_read BOOLEAN DEFAULT FALSE,
                notification_type TEXT NOT NULL,
                action_link TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES profiles (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS gift_card_submissions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                brand TEXT NOT NULL,
                card_code TEXT NOT NULL,
                card_amount TEXT NOT NULL,
                card_currency TEXT NOT NULL,
                image_url TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                payout_amount TEXT,
                admin_notes TEXT,
                created_at TEXT NOT NULL,
                reviewed_at TEXT,
                FOREIGN KEY (user_id) REFERENCES profiles (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS payment_methods (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                bank_name TEXT NOT NULL,
                bank_code TEXT NOT NULL,
                account_number TEXT NOT NULL,
                account_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES profiles (id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_email ON profiles(email);
            CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject);
            CREATE INDEX IF NOT EXISTS idx_sessions_token_id ON sessions(token_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions(user_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_deposit_reference
                ON transactions(user_id, reference) WHERE transaction_type = 'deposit';
            CREATE INDEX IF NOT EXISTS idx_kyc_user_id ON kyc_submissions(user_id);
            CREATE INDEX IF NOT EXISTS idx_kyc_status ON kyc_submissions(status);
            CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_read ON notifications(is_read);
            CREATE INDEX IF NOT EXISTS idx_gift_cards_user_id ON gift_card_submissions(user_id);
            CREATE INDEX IF NOT EXISTS idx_payment_methods_user_id ON payment_methods(user_id);
        "#;

        sqlx::raw_sql(query)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    // Profiles

    pub async fn create_profile(&self, profile: &Profile) -> Result<()> {
        let query = r#"
            INSERT INTO profiles (id, email, display_name, password_hash, role, kyc_status, wallet_balance, account_status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#;

        sqlx::query(query)
            .bind(profile.id.to_string())
            .bind(&profile.email)
            .bind(&profile.display_name)
            .bind(&profile.password_hash)
            .bind(profile.role.as_str())
            .bind(profile.kyc_status.as_str())
            .bind(profile.wallet_balance.to_string())
            .bind(profile.account_status.as_str())
            .bind(profile.created_at.to_rfc3339())
            .bind(profile.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint failed") {
                    AppError::ValidationError("Email already exists".to_string())
                } else {
                    AppError::DatabaseError(format!("Failed to create profile: {}", e))
                }
            })?;

        Ok(())
    }

    pub async fn get_profile_by_id(&self, user_id: &Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch profile: {}", e)))?;

        row.as_ref().map(profile_from_row).transpose()
    }

    pub async fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch profile by email: {}", e)))?;

        row.as_ref().map(profile_from_row).transpose()
    }

    pub async fn list_profiles(&self, limit: i64) -> Result<Vec<Profile>> {
        let rows = sqlx::query("SELECT * FROM profiles ORDER BY created_at DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list profiles: {}", e)))?;

        rows.iter().map(profile_from_row).collect()
    }

    pub async fn update_account_status(&self, user_id: &Uuid, status: AccountStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE profiles SET account_status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update account status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_profile_kyc_status(&self, user_id: &Uuid, status: KycStatus) -> Result<()> {
        sqlx::query("UPDATE profiles SET kyc_status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update KYC status: {}", e)))?;

        Ok(())
    }

    pub async fn set_profile_role(&self, user_id: &Uuid, role: Role) -> Result<()> {
        sqlx::query("UPDATE profiles SET role = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(role.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update role: {}", e)))?;

        Ok(())
    }

    /// Admin-check procedure: true when the profile's role column is `admin`.
    pub async fn is_admin(&self, user_id: &Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT role FROM profiles WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to check admin role: {}", e)))?;

        Ok(row.map(|r| r.get::<String, _>("role") == Role::Admin.as_str()).unwrap_or(false))
    }

    // Sessions

    pub async fn store_session(&self, subject: &str, token_id: &str, token_hash: &str, role: Role, expires_at: DateTime<Utc>) -> Result<()> {
        let query = r#"
            INSERT INTO sessions (subject, token_id, token_hash, role, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#;

        sqlx::query(query)
            .bind(subject)
            .bind(token_id)
            .bind(token_hash)
            .bind(role.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(expires_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to store session: {}", e)))?;

        Ok(())
    }

    pub async fn is_session_active(&self, token_id: &str, token_hash: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) as count FROM sessions
            WHERE token_id = ?1 AND token_hash = ?2 AND is_active = TRUE AND expires_at > ?3
        "#;

        let row = sqlx::query(query)
            .bind(token_id)
            .bind(token_hash)
            .bind(Utc::now().to_rfc3339())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to validate session: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    pub async fn revoke_session(&self, token_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE sessions SET is_active = FALSE WHERE token_id = ?1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to revoke session: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::AuthenticationError("Session not found".to_string()));
        }
        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to cleanup expired sessions: {}", e)))?;

        Ok(result.rows_affected())
    }

    // Ledger

    /// Atomic balance-mutation procedure.
    ///
    /// Adjusts the profile balance by `amount` and, in the same database
    /// transaction, records a `completed` transaction row. When
    /// `settle_transaction` names an existing row owned by the user, that row
    /// is marked `completed` with `reference` instead of inserting a new one.
    /// A mutation that would leave the balance negative, or overflow it, is
    /// rejected and nothing is written.
    ///
    /// The write lock is taken at `BEGIN`, so concurrent callers queue on the
    /// busy timeout rather than failing on a read-to-write upgrade.
    pub async fn update_wallet_balance(
        &self,
        user_id: &Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        reference: &str,
        settle_transaction: Option<Uuid>,
    ) -> Result<LedgerReceipt> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let now = Utc::now().to_rfc3339();

        let row = sqlx::query("SELECT wallet_balance FROM profiles WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::DatabaseError("Profile not found".to_string()))?;

        let current = parse_decimal(&row.get::<String, _>("wallet_balance"))?;
        let new_balance = current
            .checked_add(amount)
            .ok_or_else(|| AppError::ValidationError("Amount too large".to_string()))?;
        if new_balance < Decimal::ZERO {
            return Err(AppError::DatabaseError("Insufficient balance".to_string()));
        }

        sqlx::query("UPDATE profiles SET wallet_balance = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(new_balance.to_string())
            .bind(&now)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        let transaction_id = match settle_transaction {
            Some(existing) => {
                let result = sqlx::query(
                    "UPDATE transactions SET status = ?1, reference = ?2, updated_at = ?3 WHERE id = ?4 AND user_id = ?5",
                )
                .bind(TransactionStatus::Completed.as_str())
                .bind(reference)
                .bind(&now)
                .bind(existing.to_string())
                .bind(user_id.to_string())
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(AppError::DatabaseError("Transaction not found".to_string()));
                }
                existing
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO transactions (id, user_id, amount, transaction_type, status, reference, idempotency_key, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)
                    "#,
                )
                .bind(id.to_string())
                .bind(user_id.to_string())
                .bind(amount.to_string())
                .bind(transaction_type.as_str())
                .bind(TransactionStatus::Completed.as_str())
                .bind(reference)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if e.to_string().contains("UNIQUE constraint failed") {
                        AppError::ValidationError("Deposit already recorded".to_string())
                    } else {
                        AppError::DatabaseError(format!("Failed to record transaction: {}", e))
                    }
                })?;
                id
            }
        };

        tx.commit().await?;

        Ok(LedgerReceipt { transaction_id, new_balance })
    }

    // Transactions

    pub async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let query = r#"
            INSERT INTO transactions (id, user_id, amount, transaction_type, status, reference, idempotency_key, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#;

        sqlx::query(query)
            .bind(transaction.id.to_string())
            .bind(transaction.user_id.to_string())
            .bind(transaction.amount.to_string())
            .bind(transaction.transaction_type.as_str())
            .bind(transaction.status.as_str())
            .bind(&transaction.reference)
            .bind(&transaction.idempotency_key)
            .bind(transaction.created_at.to_rfc3339())
            .bind(transaction.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint failed") {
                    AppError::ValidationError("Duplicate idempotency key".to_string())
                } else {
                    AppError::DatabaseError(format!("Failed to insert transaction: {}", e))
                }
            })?;

        Ok(())
    }

    pub async fn get_transaction(&self, transaction_id: &Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = ?1")
            .bind(transaction_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch transaction: {}", e)))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    pub async fn find_transaction_by_idempotency_key(&self, user_id: &Uuid, key: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query("SELECT * FROM transactions WHERE user_id = ?1 AND idempotency_key = ?2")
            .bind(user_id.to_string())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch transaction by idempotency key: {}", e)))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    pub async fn update_transaction_status(&self, transaction_id: &Uuid, status: TransactionStatus, reference: Option<&str>) -> Result<()> {
        let query = r#"
            UPDATE transactions
            SET status = ?1, reference = COALESCE(?2, reference), updated_at = ?3
            WHERE id = ?4
        "#;

        let result = sqlx::query(query)
            .bind(status.as_str())
            .bind(reference)
            .bind(Utc::now().to_rfc3339())
            .bind(transaction_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update transaction status: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Transaction {} not found", transaction_id)));
        }
        Ok(())
    }

    pub async fn list_user_transactions(&self, user_id: &Uuid, limit: i64) -> Result<Vec<Transaction>> {
        let rows = sqlx::query("SELECT * FROM transactions WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2")
            .bind(user_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch transactions: {}", e)))?;

        rows.iter().map(transaction_from_row).collect()
    }

    pub async fn list_transactions(&self, limit: i64) -> Result<Vec<Transaction>> {
        let rows = sqlx::query("SELECT * FROM transactions ORDER BY created_at DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list transactions: {}", e)))?;

        rows.iter().map(transaction_from_row).collect()
    }

    // KYC

    pub async fn create_kyc_submission(&self, kyc: &KycSubmission) -> Result<()> {
        let query = r#"
            INSERT INTO kyc_submissions (id, user_id, full_name, date_of_birth, address, id_type, id_number, document_url, selfie_url, status, admin_notes, submitted_at, reviewed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#;

        sqlx::query(query)
            .bind(kyc.id.to_string())
            .bind(kyc.user_id.to_string())
            .bind(&kyc.full_name)
            .bind(kyc.date_of_birth.to_string())
            .bind(&kyc.address)
            .bind(&kyc.id_type)
            .bind(&kyc.id_number)
            .bind(&kyc.document_url)
            .bind(&kyc.selfie_url)
            .bind(kyc.status.as_str())
            .bind(&kyc.admin_notes)
            .bind(kyc.submitted_at.to_rfc3339())
            .bind(kyc.reviewed_at.map(|dt| dt.to_rfc3339()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create KYC submission: {}", e)))?;

        Ok(())
    }

    pub async fn get_kyc_submission(&self, kyc_id: &Uuid) -> Result<Option<KycSubmission>> {
        let row = sqlx::query("SELECT * FROM kyc_submissions WHERE id = ?1")
            .bind(kyc_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch KYC submission: {}", e)))?;

        row.as_ref().map(kyc_from_row).transpose()
    }

    pub async fn get_kyc_submission_by_user(&self, user_id: &Uuid) -> Result<Option<KycSubmission>> {
        let row = sqlx::query("SELECT * FROM kyc_submissions WHERE user_id = ?1 ORDER BY submitted_at DESC LIMIT 1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch KYC submission: {}", e)))?;

        row.as_ref().map(kyc_from_row).transpose()
    }

    pub async fn list_kyc_submissions(&self, status: Option<KycStatus>, limit: i64) -> Result<Vec<KycSubmission>> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM kyc_submissions WHERE status = ?1 ORDER BY submitted_at DESC LIMIT ?2")
                    .bind(status.as_str())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM kyc_submissions ORDER BY submitted_at DESC LIMIT ?1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::DatabaseError(format!("Failed to list KYC submissions: {}", e)))?;

        rows.iter().map(kyc_from_row).collect()
    }

    pub async fn update_kyc_status(&self, kyc_id: &Uuid, status: KycStatus, reviewed_at: Option<DateTime<Utc>>, admin_notes: Option<&str>) -> Result<()> {
        let query = r#"
            UPDATE kyc_submissions SET status = ?1, reviewed_at = ?2, admin_notes = ?3 WHERE id = ?4
        "#;

        sqlx::query(query)
            .bind(status.as_str())
            .bind(reviewed_at.map(|dt| dt.to_rfc3339()))
            .bind(admin_notes)
            .bind(kyc_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update KYC status: {}", e)))?;

        Ok(())
    }

    // Exchange rates

    pub async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>> {
        let rows = sqlx::query("SELECT * FROM exchange_rates ORDER BY currency_code")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list exchange rates: {}", e)))?;

        rows.iter().map(rate_from_row).collect()
    }

    pub async fn get_exchange_rate(&self, currency_code: &str) -> Result<Option<ExchangeRate>> {
        let row = sqlx::query("SELECT * FROM exchange_rates WHERE currency_code = ?1")
            .bind(currency_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch exchange rate: {}", e)))?;

        row.as_ref().map(rate_from_row).transpose()
    }

    pub async fn upsert_exchange_rate(&self, rate: &ExchangeRate) -> Result<()> {
        let query = r#"
            INSERT INTO exchange_rates (currency_code, currency_name, buy_rate, sell_rate, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(currency_code) DO UPDATE SET
                currency_name = excluded.currency_name,
                buy_rate = excluded.buy_rate,
                sell_rate = excluded.sell_rate,
                last_updated = excluded.last_updated
        "#;

        sqlx::query(query)
            .bind(&rate.currency_code)
            .bind(&rate.currency_name)
            .bind(rate.buy_rate.to_string())
            .bind(rate.sell_rate.to_string())
            .bind(rate.last_updated.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert exchange rate: {}", e)))?;

        Ok(())
    }

    // Notifications

    pub async fn store_notification(&self, notification: &Notification) -> Result<()> {
        let query = r#"
            INSERT INTO notifications (id, user_id, title, message, is_read, notification_type, action_link, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#;

        sqlx::query(query)
            .bind(notification.id.to_string())
            .bind(notification.user_id.to_string())
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.is_read)
            .bind(notification.notification_type.as_str())
            .bind(&notification.action_link)
            .bind(notification.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to store notification: {}", e)))?;

        Ok(())
    }

    pub async fn get_user_notifications(&self, user_id: &Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query("SELECT * FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2")
            .bind(user_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch notifications: {}", e)))?;

        rows.iter().map(notification_from_row).collect()
    }

    pub async fn mark_notification_read(&self, user_id: &Uuid, notification_id: &Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ?1 AND user_id = ?2")
            .bind(notification_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark notification read: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_notifications_read(&self, user_id: &Uuid) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = ?1 AND is_read = FALSE")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark all notifications as read: {}", e)))?;

        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, user_id: &Uuid, notification_id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1 AND user_id = ?2")
            .bind(notification_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete notification: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    // Gift cards

    pub async fn create_gift_card_submission(&self, card: &GiftCardSubmission) -> Result<()> {
        let query = r#"
            INSERT INTO gift_card_submissions (id, user_id, brand, card_code, card_amount, card_currency, image_url, status, payout_amount, admin_notes, created_at, reviewed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#;

        sqlx::query(query)
            .bind(card.id.to_string())
            .bind(card.user_id.to_string())
            .bind(&card.brand)
            .bind(&card.card_code)
            .bind(card.card_amount.to_string())
            .bind(&card.card_currency)
            .bind(&card.image_url)
            .bind(card.status.as_str())
            .bind(card.payout_amount.map(|a| a.to_string()))
            .bind(&card.admin_notes)
            .bind(card.created_at.to_rfc3339())
            .bind(card.reviewed_at.map(|dt| dt.to_rfc3339()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create gift card submission: {}", e)))?;

        Ok(())
    }

    pub async fn get_gift_card_submission(&self, card_id: &Uuid) -> Result<Option<GiftCardSubmission>> {
        let row = sqlx::query("SELECT * FROM gift_card_submissions WHERE id = ?1")
            .bind(card_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch gift card submission: {}", e)))?;

        row.as_ref().map(gift_card_from_row).transpose()
    }

    pub async fn list_gift_card_submissions(&self, user_id: Option<&Uuid>, limit: i64) -> Result<Vec<GiftCardSubmission>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query("SELECT * FROM gift_card_submissions WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2")
                    .bind(user_id.to_string())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM gift_card_submissions ORDER BY created_at DESC LIMIT ?1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::DatabaseError(format!("Failed to list gift card submissions: {}", e)))?;

        rows.iter().map(gift_card_from_row).collect()
    }

    pub async fn review_gift_card_submission(
        &self,
        card_id: &Uuid,
        status: TransactionStatus,
        payout_amount: Option<Decimal>,
        admin_notes: Option<&str>,
    ) -> Result<()> {
        let query = r#"
            UPDATE gift_card_submissions
            SET status = ?1, payout_amount = ?2, admin_notes = ?3, reviewed_at = ?4
            WHERE id = ?5
        "#;

        sqlx::query(query)
            .bind(status.as_str())
            .bind(payout_amount.map(|a| a.to_string()))
            .bind(admin_notes)
            .bind(Utc::now().to_rfc3339())
            .bind(card_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to review gift card submission: {}", e)))?;

        Ok(())
    }

    // Payment methods

    pub async fn create_payment_method(&self, method: &PaymentMethod) -> Result<()> {
        let query = r#"
            INSERT INTO payment_methods (id, user_id, bank_name, bank_code, account_number, account_name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#;

        sqlx::query(query)
            .bind(method.id.to_string())
            .bind(method.user_id.to_string())
            .bind(&method.bank_name)
            .bind(&method.bank_code)
            .bind(&method.account_number)
            .bind(&method.account_name)
            .bind(method.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create payment method: {}", e)))?;

        Ok(())
    }

    pub async fn get_payment_method(&self, user_id: &Uuid, method_id: &Uuid) -> Result<Option<PaymentMethod>> {
        let row = sqlx::query("SELECT * FROM payment_methods WHERE id = ?1 AND user_id = ?2")
            .bind(method_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch payment method: {}", e)))?;

        row.as_ref().map(payment_method_from_row).transpose()
    }

    pub async fn list_payment_methods(&self, user_id: &Uuid) -> Result<Vec<PaymentMethod>> {
        let rows = sqlx::query("SELECT * FROM payment_methods WHERE user_id = ?1 ORDER BY created_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list payment methods: {}", e)))?;

        rows.iter().map(payment_method_from_row).collect()
    }

    pub async fn delete_payment_method(&self, user_id: &Uuid, method_id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = ?1 AND user_id = ?2")
            .bind(method_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete payment method: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::DatabaseError(format!("Invalid UUID '{}': {}", value, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::DatabaseError(format!("Invalid timestamp '{}': {}", value, e)))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| AppError::DatabaseError(format!("Invalid amount '{}': {}", value, e)))
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    Ok(Profile {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        role: Role::parse(&row.get::<String, _>("role")),
        kyc_status: KycStatus::parse(&row.get::<String, _>("kyc_status")),
        wallet_balance: parse_decimal(&row.get::<String, _>("wallet_balance"))?,
        account_status: AccountStatus::parse(&row.get::<String, _>("account_status")),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    let raw_type: String = row.get("transaction_type");
    let raw_status: String = row.get("status");
    Ok(Transaction {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        amount: parse_decimal(&row.get::<String, _>("amount"))?,
        transaction_type: TransactionType::parse(&raw_type)
            .ok_or_else(|| AppError::DatabaseError(format!("Unknown transaction type: {}", raw_type)))?,
        status: TransactionStatus::parse(&raw_status)
            .ok_or_else(|| AppError::DatabaseError(format!("Unknown transaction status: {}", raw_status)))?,
        reference: row.get("reference"),
        idempotency_key: row.get("idempotency_key"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn kyc_from_row(row: &SqliteRow) -> Result<KycSubmission> {
    let raw_dob: String = row.get("date_of_birth");
    Ok(KycSubmission {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        full_name: row.get("full_name"),
        date_of_birth: NaiveDate::from_str(&raw_dob)
            .map_err(|e| AppError::DatabaseError(format!("Invalid date of birth '{}': {}", raw_dob, e)))?,
        address: row.get("address"),
        id_type: row.get("id_type"),
        id_number: row.get("id_number"),
        document_url: row.get("document_url"),
        selfie_url: row.get("selfie_url"),
        status: KycStatus::parse(&row.get::<String, _>("status")),
        admin_notes: row.get("admin_notes"),
        submitted_at: parse_timestamp(&row.get::<String, _>("submitted_at"))?,
        reviewed_at: parse_optional_timestamp(row.get("reviewed_at"))?,
    })
}

fn rate_from_row(row: &SqliteRow) -> Result<ExchangeRate> {
    Ok(ExchangeRate {
        currency_code: row.get("currency_code"),
        currency_name: row.get("currency_name"),
        buy_rate: parse_decimal(&row.get::<String, _>("buy_rate"))?,
        sell_rate: parse_decimal(&row.get::<String, _>("sell_rate"))?,
        last_updated: parse_timestamp(&row.get::<String, _>("last_updated"))?,
    })
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        title: row.get("title"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        notification_type: NotificationType::parse(&row.get::<String, _>("notification_type")),
        action_link: row.get("action_link"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn gift_card_from_row(row: &SqliteRow) -> Result<GiftCardSubmission> {
    let raw_status: String = row.get("status");
    Ok(GiftCardSubmission {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        brand: row.get("brand"),
        card_code: row.get("card_code"),
        card_amount: parse_decimal(&row.get::<String, _>("card_amount"))?,
        card_currency: row.get("card_currency"),
        image_url: row.get("image_url"),
        status: TransactionStatus::parse(&raw_status)
            .ok_or_else(|| AppError::DatabaseError(format!("Unknown gift card status: {}", raw_status)))?,
        payout_amount: row
            .get::<Option<String>, _>("payout_amount")
            .as_deref()
            .map(parse_decimal)
            .transpose()?,
        admin_notes: row.get("admin_notes"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        reviewed_at: parse_optional_timestamp(row.get("reviewed_at"))?,
    })
}

fn payment_method_from_row(row: &SqliteRow) -> Result<PaymentMethod> {
    Ok(PaymentMethod {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        bank_name: row.get("bank_name"),
        bank_code: row.get("bank_code"),
        account_number: row.get("account_number"),
        account_name: row.get("account_name"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
