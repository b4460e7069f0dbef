use crate::errors::{AppError, Result};
use crate::gateways::price_api::{asset_id_for, PriceSource};
use crate::models::notification::NotificationType;
use crate::models::transaction::{DepositReceipt, DepositRequest, TransactionType};
use crate::services::ledger_service::LedgerService;
use crate::services::notification_service::NotificationService;
use crate::utils::validation::Validator;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Local-currency value of a crypto amount. Products past `Decimal::MAX`
/// are rejected instead of overflowing.
pub fn local_amount(amount: Decimal, usd_price: Decimal, ngn_per_usd: Decimal) -> Result<Decimal> {
    amount
        .checked_mul(usd_price)
        .and_then(|usd| usd.checked_mul(ngn_per_usd))
        .ok_or_else(|| AppError::ValidationError("Amount too large".to_string()))
}

pub struct DepositService {
    prices: Arc<dyn PriceSource>,
    ledger: Arc<LedgerService>,
    notifications: Arc<NotificationService>,
    ngn_per_usd: Decimal,
}

impl DepositService {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        ledger: Arc<LedgerService>,
        notifications: Arc<NotificationService>,
        ngn_per_usd: Decimal,
    ) -> Self {
        Self { prices, ledger, notifications, ngn_per_usd }
    }

    pub async fn convert(&self, user_id: &Uuid, request: &DepositRequest) -> Result<DepositReceipt> {
        Validator::validate_positive_amount(request.amount)?;
        Validator::validate_required("Currency", &request.currency)?;
        Validator::validate_required("Transaction hash", &request.tx_hash)?;

        let currency = request.currency.trim().to_uppercase();
        let usd_price = self.spot_price(&currency).await;
        let local = local_amount(request.amount, usd_price, self.ngn_per_usd)?;

        let receipt = self
            .ledger
            .apply(user_id, local, TransactionType::Deposit, request.tx_hash.trim())
            .await?;

        info!(
            action = "deposit_converted",
            user_id = %user_id,
            currency = %currency,
            amount = %request.amount,
            usd_price = %usd_price,
            local_amount = %local
        );
        self.notifications
            .notify(
                user_id,
                "Deposit received",
                &format!("{} {} converted to ₦{}", request.amount, currency, local.round_dp(2)),
                NotificationType::Success,
                Some("/wallet"),
            )
            .await;

        Ok(DepositReceipt {
            transaction_id: receipt.transaction_id,
            usd_price,
            local_amount: local,
            new_balance: receipt.new_balance,
        })
    }

    /// Lookup failures count as a zero price.
    async fn spot_price(&self, currency: &str) -> Decimal {
        let asset_id = asset_id_for(currency);
        match self.prices.usd_price(&asset_id).await {
            Ok(Some(price)) => price,
            Ok(None) => {
                warn!(action = "price_missing", asset_id = %asset_id);
                Decimal::ZERO
            }
            Err(e) => {
                warn!(action = "price_lookup_failed", asset_id = %asset_id, error = %e);
                Decimal::ZERO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;
    use crate::database::sqlite::SqliteDatabase;
    use crate::services::change_feed::ChangeFeed;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::Mutex;

    struct FixedPrice {
        price: Option<Decimal>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PriceSource for FixedPrice {
        async fn usd_price(&self, asset_id: &str) -> Result<Option<Decimal>> {
            self.seen.lock().unwrap().push(asset_id.to_string());
            Ok(self.price)
        }
    }

    struct DownPrice;

    #[async_trait]
    impl PriceSource for DownPrice {
        async fn usd_price(&self, _asset_id: &str) -> Result<Option<Decimal>> {
            Err(AppError::ExternalServiceError("connection refused".to_string()))
        }
    }

    async fn service(prices: Arc<dyn PriceSource>) -> (DepositService, Arc<LedgerService>, Uuid) {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("deposit@example.com");
        db.create_profile(&profile).await.unwrap();
        let feed = ChangeFeed::default();
        let ledger = Arc::new(LedgerService::new(db.clone(), feed.clone()));
        let notifications = Arc::new(NotificationService::new(db, feed));
        let svc = DepositService::new(prices, ledger.clone(), notifications, Decimal::from(1600));
        (svc, ledger, profile.id)
    }

    fn request(amount: &str, currency: &str) -> DepositRequest {
        DepositRequest {
            amount: Decimal::from_str(amount).unwrap(),
            currency: currency.to_string(),
            tx_hash: "0xabc123".to_string(),
        }
    }

    #[test]
    fn zero_price_gives_exactly_zero() {
        assert_eq!(local_amount(Decimal::from(5), Decimal::ZERO, Decimal::from(1600)).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected_without_crediting() {
        let prices = Arc::new(FixedPrice { price: Some(Decimal::from(65000)), seen: Mutex::new(vec![]) });
        let (svc, ledger, user_id) = service(prices).await;

        let err = svc
            .convert(&user_id, &request("1000000000000000000000000", "btc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Amount too large"), "{:?}", err);
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::ZERO);
        assert!(ledger.history(&user_id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn converts_at_spot_price_and_credits_ledger() {
        let prices = Arc::new(FixedPrice { price: Some(Decimal::from(60000)), seen: Mutex::new(vec![]) });
        let (svc, ledger, user_id) = service(prices.clone()).await;

        let receipt = svc.convert(&user_id, &request("0.5", "btc")).await.unwrap();
        assert_eq!(receipt.local_amount, Decimal::from(48_000_000));
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::from(48_000_000));
        assert_eq!(prices.seen.lock().unwrap().as_slice(), ["bitcoin"]);

        let history = ledger.history(&user_id, None).await.unwrap();
        assert_eq!(history[0].reference, "0xabc123");
        assert_eq!(history[0].transaction_type, TransactionType::Deposit);
    }

    #[tokio::test]
    async fn same_hash_is_credited_once() {
        let prices = Arc::new(FixedPrice { price: Some(Decimal::ONE), seen: Mutex::new(vec![]) });
        let (svc, ledger, user_id) = service(prices).await;

        svc.convert(&user_id, &request("1", "USDT")).await.unwrap();
        let err = svc.convert(&user_id, &request("1", "USDT")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "Deposit already recorded"), "{:?}", err);
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::from(1600));
    }

    #[tokio::test]
    async fn unreachable_price_api_credits_zero() {
        let (svc, ledger, user_id) = service(Arc::new(DownPrice)).await;

        let receipt = svc.convert(&user_id, &request("2", "ETH")).await.unwrap();
        assert_eq!(receipt.usd_price, Decimal::ZERO);
        assert_eq!(receipt.local_amount, Decimal::ZERO);
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn missing_hash_is_rejected_before_lookup() {
        let prices = Arc::new(FixedPrice { price: Some(Decimal::ONE), seen: Mutex::new(vec![]) });
        let (svc, _, user_id) = service(prices.clone()).await;

        let mut req = request("1", "USDT");
        req.tx_hash = "  ".to_string();
        assert!(matches!(svc.convert(&user_id, &req).await, Err(AppError::ValidationError(_))));
        assert!(prices.seen.lock().unwrap().is_empty());
    }
}
