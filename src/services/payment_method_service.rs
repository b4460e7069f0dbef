use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::payment_method::{NewPaymentMethod, PaymentMethod};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use crate::utils::validation::Validator;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct PaymentMethodService {
    database: Arc<SqliteDatabase>,
    feed: ChangeFeed,
}

impl PaymentMethodService {
    pub fn new(database: Arc<SqliteDatabase>, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    pub async fn add(&self, user_id: &Uuid, request: &NewPaymentMethod) -> Result<PaymentMethod> {
        Validator::validate_required("Bank name", &request.bank_name)?;
        Validator::validate_required("Account name", &request.account_name)?;
        Validator::validate_bank_code(&request.bank_code)?;
        Validator::validate_account_number(&request.account_number)?;

        let method = PaymentMethod {
            id: Uuid::new_v4(),
            user_id: *user_id,
            bank_name: request.bank_name.trim().to_string(),
            bank_code: request.bank_code.trim().to_string(),
            account_number: request.account_number.trim().to_string(),
            account_name: request.account_name.trim().to_string(),
            created_at: Utc::now(),
        };
        self.database.create_payment_method(&method).await?;
        self.feed.publish("payment_methods", ChangeOp::Insert, method.id, Some(*user_id));

        info!(action = "payment_method_added", user_id = %user_id, bank = %method.bank_name);
        Ok(method)
    }

    pub async fn list(&self, user_id: &Uuid) -> Result<Vec<PaymentMethod>> {
        self.database.list_payment_methods(user_id).await
    }

    pub async fn delete(&self, user_id: &Uuid, method_id: &Uuid) -> Result<()> {
        if !self.database.delete_payment_method(user_id, method_id).await? {
            return Err(AppError::NotFound("Payment method not found".to_string()));
        }
        self.feed.publish("payment_methods", ChangeOp::Delete, method_id, Some(*user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::sample_profile;

    fn gtbank(account_number: &str) -> NewPaymentMethod {
        NewPaymentMethod {
            bank_name: "GTBank".to_string(),
            bank_code: "058".to_string(),
            account_number: account_number.to_string(),
            account_name: "Ada Obi".to_string(),
        }
    }

    #[tokio::test]
    async fn add_list_delete() {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let profile = sample_profile("pm@example.com");
        db.create_profile(&profile).await.unwrap();
        let service = PaymentMethodService::new(db, ChangeFeed::default());

        let method = service.add(&profile.id, &gtbank("0123456789")).await.unwrap();
        assert_eq!(service.list(&profile.id).await.unwrap().len(), 1);

        let stranger = Uuid::new_v4();
        assert!(matches!(service.delete(&stranger, &method.id).await, Err(AppError::NotFound(_))));
        service.delete(&profile.id, &method.id).await.unwrap();
        assert!(service.list(&profile.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_account_number_is_rejected() {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let service = PaymentMethodService::new(db, ChangeFeed::default());
        let err = service.add(&Uuid::new_v4(), &gtbank("012345678")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
