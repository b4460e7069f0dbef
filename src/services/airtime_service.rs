use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::gateways::airtime_api::{AirtimeOrder, AirtimeVendor};
use crate::models::airtime::{AirtimePurchaseReceipt, AirtimePurchaseRequest, Network};
use crate::models::notification::NotificationType;
use crate::models::profile::AccountStatus;
use crate::models::transaction::TransactionType;
use crate::services::ledger_service::LedgerService;
use crate::services::notification_service::NotificationService;
use crate::utils::validation::Validator;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const MIN_AIRTIME: i64 = 50;
const MAX_AIRTIME: i64 = 50_000;

pub struct AirtimeService {
    database: Arc<SqliteDatabase>,
    vendor: Arc<dyn AirtimeVendor>,
    ledger: Arc<LedgerService>,
    notifications: Arc<NotificationService>,
}

impl AirtimeService {
    pub fn new(
        database: Arc<SqliteDatabase>,
        vendor: Arc<dyn AirtimeVendor>,
        ledger: Arc<LedgerService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self { database, vendor, ledger, notifications }
    }

    /// Buys from the vendor first and debits only once the vendor confirms.
    pub async fn purchase(&self, user_id: &Uuid, request: &AirtimePurchaseRequest) -> Result<AirtimePurchaseReceipt> {
        let network = Network::parse(&request.network).ok_or_else(|| {
            AppError::ValidationError("Network must be one of mtn, glo, airtel, 9mobile".to_string())
        })?;
        let phone = request.phone.trim().to_string();
        Validator::validate_phone(&phone)?;
        if request.amount < Decimal::from(MIN_AIRTIME) || request.amount > Decimal::from(MAX_AIRTIME) {
            return Err(AppError::ValidationError(format!(
                "Airtime amount must be between ₦{} and ₦{}",
                MIN_AIRTIME, MAX_AIRTIME
            )));
        }

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

        let order = AirtimeOrder {
            network: network.as_str().to_string(),
            phone: phone.clone(),
            amount: request.amount,
            request_id: Uuid::new_v4().simple().to_string(),
        };
        let vendor_reference = self.vendor.purchase(&order).await.map_err(|e| {
            warn!(action = "airtime_vendor_failed", user_id = %user_id, network = network.as_str(), error = %e);
            e
        })?;

        let receipt = self
            .ledger
            .apply(
                user_id,
                -request.amount,
                TransactionType::Airtime,
                &format!("airtime:{}", vendor_reference),
            )
            .await
            .map_err(|e| {
                error!(
                    action = "airtime_ledger_mismatch",
                    user_id = %user_id,
                    vendor_reference = %vendor_reference,
                    error = %e
                );
                e
            })?;

        info!(action = "airtime_purchased", user_id = %user_id, network = network.as_str(), amount = %request.amount);
        self.notifications
            .notify(
                user_id,
                "Airtime purchase successful",
                &format!("₦{} {} airtime sent to {}", request.amount, network.as_str().to_uppercase(), phone),
                NotificationType::Success,
                Some("/transactions"),
            )
            .await;

        Ok(AirtimePurchaseReceipt {
            transaction_id: receipt.transaction_id,
            vendor_reference,
            network,
            phone,
            amount: request.amount,
            new_balance: receipt.new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;
    use crate::services::change_feed::ChangeFeed;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeVendor {
        succeed: bool,
        orders: Mutex<Vec<AirtimeOrder>>,
    }

    #[async_trait]
    impl AirtimeVendor for FakeVendor {
        async fn purchase(&self, order: &AirtimeOrder) -> Result<String> {
            self.orders.lock().unwrap().push(order.clone());
            if self.succeed {
                Ok("VTU-778".to_string())
            } else {
                Err(AppError::ExternalServiceError("Airtime API returned 503".to_string()))
            }
        }
    }

    async fn setup(succeed: bool) -> (AirtimeService, Arc<FakeVendor>, Arc<LedgerService>, Uuid) {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("vtu@example.com");
        db.create_profile(&profile).await.unwrap();
        let feed = ChangeFeed::default();
        let ledger = Arc::new(LedgerService::new(db.clone(), feed.clone()));
        ledger.apply(&profile.id, Decimal::from(2_000), TransactionType::Fund, "seed").await.unwrap();
        let vendor = Arc::new(FakeVendor { succeed, orders: Mutex::new(vec![]) });
        let notifications = Arc::new(NotificationService::new(db.clone(), feed));
        let service = AirtimeService::new(db, vendor.clone(), ledger.clone(), notifications);
        (service, vendor, ledger, profile.id)
    }

    fn request(network: &str, amount: i64) -> AirtimePurchaseRequest {
        AirtimePurchaseRequest {
            network: network.to_string(),
            phone: "08031234567".to_string(),
            amount: Decimal::from(amount),
        }
    }

    #[tokio::test]
    async fn vendor_success_debits_with_vendor_reference() {
        let (service, vendor, ledger, user_id) = setup(true).await;

        let receipt = service.purchase(&user_id, &request("MTN", 500)).await.unwrap();
        assert_eq!(receipt.vendor_reference, "VTU-778");
        assert_eq!(receipt.new_balance, Decimal::from(1_500));
        assert_eq!(vendor.orders.lock().unwrap()[0].network, "mtn");

        let history = ledger.history(&user_id, None).await.unwrap();
        let row = history.iter().find(|t| t.transaction_type == TransactionType::Airtime).unwrap();
        assert_eq!(row.reference, "airtime:VTU-778");
        assert_eq!(row.amount, Decimal::from(-500));
    }

    #[tokio::test]
    async fn vendor_failure_debits_nothing() {
        let (service, _, ledger, user_id) = setup(false).await;
        let err = service.purchase(&user_id, &request("glo", 500)).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
        assert_eq!(ledger.balance(&user_id).await.unwrap(), Decimal::from(2_000));
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_vendor() {
        let (service, vendor, _, user_id) = setup(true).await;

        for req in [request("vodafone", 500), request("mtn", 49), request("mtn", 50_001), request("airtel", 3_000)] {
            assert!(matches!(service.purchase(&user_id, &req).await, Err(AppError::ValidationError(_))));
        }
        let mut bad_phone = request("mtn", 100);
        bad_phone.phone = "12345".to_string();
        assert!(service.purchase(&user_id, &bad_phone).await.is_err());

        assert!(vendor.orders.lock().unwrap().is_empty());
    }
}
