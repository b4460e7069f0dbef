use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::exchange_rate::{ExchangeRate, UpsertRateRequest};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use crate::utils::validation::Validator;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct RateService {
    database: Arc<SqliteDatabase>,
    feed: ChangeFeed,
}

impl RateService {
    pub fn new(database: Arc<SqliteDatabase>, feed: ChangeFeed) -> Self {
        Self { database, feed }
    }

    pub async fn list(&self) -> Result<Vec<ExchangeRate>> {
        self.database.list_exchange_rates().await
    }

    pub async fn get(&self, currency_code: &str) -> Result<ExchangeRate> {
        let code = currency_code.trim().to_uppercase();
        self.database
            .get_exchange_rate(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No rate for {}", code)))
    }

    pub async fn upsert(&self, currency_code: &str, request: &UpsertRateRequest) -> Result<ExchangeRate> {
        let code = currency_code.trim().to_uppercase();
        Validator::validate_currency_code(&code)?;
        Validator::validate_required("Currency name", &request.currency_name)?;
        Validator::validate_positive_amount(request.buy_rate)?;
        Validator::validate_positive_amount(request.sell_rate)?;

        let rate = ExchangeRate {
            currency_code: code.clone(),
            currency_name: request.currency_name.trim().to_string(),
            buy_rate: request.buy_rate,
            sell_rate: request.sell_rate,
            last_updated: Utc::now(),
        };
        self.database.upsert_exchange_rate(&rate).await?;
        self.feed.publish("exchange_rates", ChangeOp::Update, &code, None);

        info!(action = "rate_upserted", currency = %code, buy = %rate.buy_rate, sell = %rate.sell_rate);
        Ok(rate)
    }
}
