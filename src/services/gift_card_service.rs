use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::gift_card::{GiftCardReviewRequest, GiftCardSubmission, GiftCardSubmitRequest};
use crate::models::notification::NotificationType;
use crate::models::transaction::{TransactionStatus, TransactionType};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use crate::services::ledger_service::LedgerService;
use crate::services::notification_service::NotificationService;
use crate::utils::validation::Validator;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub struct GiftCardService {
    database: Arc<SqliteDatabase>,
    ledger: Arc<LedgerService>,
    notifications: Arc<NotificationService>,
    feed: ChangeFeed,
}

impl GiftCardService {
    pub fn new(
        database: Arc<SqliteDatabase>,
        ledger: Arc<LedgerService>,
        notifications: Arc<NotificationService>,
        feed: ChangeFeed,
    ) -> Self {
        Self { database, ledger, notifications, feed }
    }

    pub async fn submit(&self, user_id: &Uuid, request: &GiftCardSubmitRequest) -> Result<GiftCardSubmission> {
        Validator::validate_required("Brand", &request.brand)?;
        Validator::validate_required("Card code", &request.card_code)?;
        Validator::validate_positive_amount(request.card_amount)?;
        let currency = request.card_currency.trim().to_uppercase();
        Validator::validate_currency_code(&currency)?;

        let card = GiftCardSubmission {
            id: Uuid::new_v4(),
            user_id: *user_id,
            brand: request.brand.trim().to_string(),
            card_code: request.card_code.trim().to_string(),
            card_amount: request.card_amount,
            card_currency: currency,
            image_url: request.image_url.clone().filter(|u| !u.trim().is_empty()),
            status: TransactionStatus::Pending,
            payout_amount: None,
            admin_notes: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        self.database.create_gift_card_submission(&card).await?;
        self.feed.publish("gift_card_submissions", ChangeOp::Insert, card.id, Some(*user_id));

        info!(action = "gift_card_submitted", user_id = %user_id, card_id = %card.id, brand = %card.brand);
        Ok(card)
    }

    pub async fn list_for_user(&self, user_id: &Uuid, limit: Option<i64>) -> Result<Vec<GiftCardSubmission>> {
        self.database
            .list_gift_card_submissions(Some(user_id), limit.unwrap_or(50).clamp(1, 200))
            .await
    }

    pub async fn list_all(&self, limit: Option<i64>) -> Result<Vec<GiftCardSubmission>> {
        self.database
            .list_gift_card_submissions(None, limit.unwrap_or(50).clamp(1, 200))
            .await
    }

    /// Approval credits the payout through the ledger before the card row is
    /// closed; rejection only closes the row.
    pub async fn review(&self, card_id: &Uuid, review: &GiftCardReviewRequest) -> Result<GiftCardSubmission> {
        let card = self
            .database
            .get_gift_card_submission(card_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gift card submission not found".to_string()))?;
        if card.status != TransactionStatus::Pending {
            return Err(AppError::ValidationError("Gift card has already been reviewed".to_string()));
        }
        let notes = review.admin_notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

        if review.approve {
            let payout = review
                .payout_amount
                .filter(|p| *p > Decimal::ZERO)
                .ok_or_else(|| AppError::ValidationError("Payout amount must be greater than 0".to_string()))?;

            self.ledger
                .apply(&card.user_id, payout, TransactionType::Giftcard, &format!("giftcard:{}", card.id))
                .await?;
            if let Err(e) = self
                .database
                .review_gift_card_submission(card_id, TransactionStatus::Completed, Some(payout), notes)
                .await
            {
                error!(action = "gift_card_close_failed", card_id = %card_id, error = %e);
                return Err(e);
            }
            self.notifications
                .notify(
                    &card.user_id,
                    "Gift card approved",
                    &format!("Your {} card was approved. ₦{} credited.", card.brand, payout),
                    NotificationType::Success,
                    Some("/wallet"),
                )
                .await;
            info!(action = "gift_card_approved", card_id = %card_id, payout = %payout);
        } else {
            self.database
                .review_gift_card_submission(card_id, TransactionStatus::Failed, None, notes)
                .await?;
            self.notifications
                .notify(
                    &card.user_id,
                    "Gift card rejected",
                    &format!("Your {} card was rejected: {}", card.brand, notes.unwrap_or("no reason given")),
                    NotificationType::Warning,
                    Some("/giftcards"),
                )
                .await;
            info!(action = "gift_card_rejected", card_id = %card_id);
        }

        self.feed.publish("gift_card_submissions", ChangeOp::Update, card_id, Some(card.user_id));
        self.database
            .get_gift_card_submission(card_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gift card submission not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;

    async fn setup() -> (GiftCardService, Arc<LedgerService>, Uuid) {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("cards@example.com");
        db.create_profile(&profile).await.unwrap();
        let feed = ChangeFeed::default();
        let ledger = Arc::new(LedgerService::new(db.clone(), feed.clone()));
        let notifications = Arc::new(NotificationService::new(db.clone(), feed.clone()));
        (GiftCardService::new(db, ledger.clone(), notifications, feed), ledger, profile.id)
    }

    fn amazon_card() -> GiftCardSubmitRequest {
        GiftCardSubmitRequest {
            brand: "Amazon".to_string(),
            card_code: "AMZ-1234-5678".to_string(),
            card_amount: Decimal::from(100),
            card_currency: "usd".to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn approval_credits_wallet_once() {
        let (service, ledger, user_id) = setup().await;
        let card = service.submit(&user_id, &amazon_card()).await.unwrap();
        assert_eq!(card.card_currency, "USD");

        let review = GiftCardReviewRequest { approve: true, payout_amount: Some(Decimal::from(120_000)), admin_notes: None };
        let reviewed = service.review(&card.id, &review).await.unwrap();
        assert_eq!(reviewed.status, TransactionStatus::Completed);
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::from(120_000));

        let history = ledger.history(&user_id, None).await.unwrap();
        assert_eq!(history[0].transaction_type, TransactionType::Giftcard);

        assert!(matches!(service.review(&card.id, &review).await, Err(AppError::ValidationError(_))));
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::from(120_000));
    }

    #[tokio::test]
    async fn approval_without_payout_is_rejected() {
        let (service, ledger, user_id) = setup().await;
        let card = service.submit(&user_id, &amazon_card()).await.unwrap();

        let review = GiftCardReviewRequest { approve: true, payout_amount: None, admin_notes: None };
        assert!(matches!(service.review(&card.id, &review).await, Err(AppError::ValidationError(_))));
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn rejection_closes_row_without_credit() {
        let (service, ledger, user_id) = setup().await;
        let card = service.submit(&user_id, &amazon_card()).await.unwrap();

        let review = GiftCardReviewRequest {
            approve: false,
            payout_amount: None,
            admin_notes: Some("Code already redeemed".to_string()),
        };
        let reviewed = service.review(&card.id, &review).await.unwrap();
        assert_eq!(reviewed.status, TransactionStatus::Failed);
        assert_eq!(reviewed.admin_notes.as_deref(), Some("Code already redeemed"));
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::ZERO);
        assert_eq!(service.list_for_user(&user_id, None).await.unwrap().len(), 1);
    }
}
