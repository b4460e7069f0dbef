use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExchangeRate {
    pub currency_code: String,
    pub currency_name: String,
    #[schema(value_type = String)]
    pub buy_rate: Decimal,
    #[schema(value_type = String)]
    pub sell_rate: Decimal,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpsertRateRequest {
    pub currency_name: String,
    #[schema(value_type = String)]
    pub buy_rate: Decimal,
    #[schema(value_type = String)]
    pub sell_rate: Decimal,
}
