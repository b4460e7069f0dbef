use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Fund,
    Giftcard,
    Airtime,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Fund => "fund",
            TransactionType::Giftcard => "giftcard",
            TransactionType::Airtime => "airtime",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "fund" => Some(TransactionType::Fund),
            "giftcard" => Some(TransactionType::Giftcard),
            "airtime" => Some(TransactionType::Airtime),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Signed: credits are positive, debits negative.
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub reference: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one atomic balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerReceipt {
    pub transaction_id: Uuid,
    #[schema(value_type = String)]
    pub new_balance: Decimal,
}

/// Crypto deposit to convert into local currency.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepositRequest {
    #[schema(value_type = String, example = "0.015")]
    pub amount: Decimal,
    #[schema(example = "BTC")]
    pub currency: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepositReceipt {
    pub transaction_id: Uuid,
    #[schema(value_type = String)]
    pub usd_price: Decimal,
    #[schema(value_type = String)]
    pub local_amount: Decimal,
    #[schema(value_type = String)]
    pub new_balance: Decimal,
}

/// Bank payout request. Either a saved payment method or inline bank
/// details must be supplied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WithdrawalRequest {
    #[schema(value_type = String, example = "5000")]
    pub amount: Decimal,
    pub payment_method_id: Option<Uuid>,
    pub bank_code: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub narration: Option<String>,
    /// Client-generated; a repeated key returns the original withdrawal.
    pub idempotency_key: String,
}
