use crate::models::transaction::TransactionStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GiftCardSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub brand: String,
    pub card_code: String,
    /// Face value in the card's own currency.
    #[schema(value_type = String)]
    pub card_amount: Decimal,
    pub card_currency: String,
    pub image_url: Option<String>,
    pub status: TransactionStatus,
    #[schema(value_type = Option<String>)]
    pub payout_amount: Option<Decimal>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GiftCardSubmitRequest {
    pub brand: String,
    pub card_code: String,
    #[schema(value_type = String)]
    pub card_amount: Decimal,
    pub card_currency: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GiftCardReviewRequest {
    pub approve: bool,
    #[schema(value_type = Option<String>)]
    pub payout_amount: Option<Decimal>,
    pub admin_notes: Option<String>,
}
