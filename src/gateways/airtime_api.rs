use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct AirtimeOrder {
    pub network: String,
    pub phone: String,
    pub amount: Decimal,
    pub request_id: String,
}

#[async_trait]
pub trait AirtimeVendor: Send + Sync {
    /// Returns the vendor's order reference.
    async fn purchase(&self, order: &AirtimeOrder) -> Result<String>;
}

pub struct HttpAirtimeVendor {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpAirtimeVendor {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl AirtimeVendor for HttpAirtimeVendor {
    async fn purchase(&self, order: &AirtimeOrder) -> Result<String> {
        let url = format!("{}/airtime", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "network_id": order.network,
                "phone": order.phone,
                "amount": order.amount.to_string(),
                "request_id": order.request_id,
            }))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::ExternalServiceError(format!("Airtime API returned {}: {}", status, body)));
        }

        let body: Value = res.json().await?;
        if body.get("code").and_then(Value::as_str).is_some_and(|c| c != "success") {
            let message = body.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(AppError::ExternalServiceError(format!("Airtime purchase declined: {}", message)));
        }

        Ok(body
            .get("data")
            .and_then(|d| d.get("order_id"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| order.request_id.clone()))
    }
}
