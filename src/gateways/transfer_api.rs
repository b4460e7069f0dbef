use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub amount: Decimal,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub reference: String,
    pub narration: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub transfer_id: String,
}

/// Bank payout provider used by withdrawals.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;
}

pub struct HttpTransferGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransferGateway {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TransferGateway for HttpTransferGateway {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let url = format!("{}/transfer", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "source": "balance",
                "amount": request.amount.to_string(),
                "currency": "NGN",
                "bank_code": request.bank_code,
                "account_number": request.account_number,
                "account_name": request.account_name,
                "reference": request.reference,
                "reason": request.narration,
            }))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::ExternalServiceError(format!("Transfer API returned {}: {}", status, body)));
        }

        let body: Value = res.json().await?;
        transfer_id_from(&body)
            .map(|transfer_id| TransferReceipt { transfer_id })
            .ok_or_else(|| AppError::ExternalServiceError("Transfer API response carried no transfer id".to_string()))
    }
}

fn transfer_id_from(body: &Value) -> Option<String> {
    let data = body.get("data").unwrap_or(body);
    ["transfer_code", "id", "transfer_id"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transfer_code_is_preferred() {
        let body = json!({ "status": true, "data": { "transfer_code": "TRF_1ptvuv321ahaa7q", "id": 9 } });
        assert_eq!(transfer_id_from(&body).as_deref(), Some("TRF_1ptvuv321ahaa7q"));
    }

    #[test]
    fn numeric_id_is_accepted() {
        let body = json!({ "data": { "id": 4417 } });
        assert_eq!(transfer_id_from(&body).as_deref(), Some("4417"));
    }

    #[test]
    fn flat_body_without_id_yields_none() {
        assert_eq!(transfer_id_from(&json!({ "status": true })), None);
    }
}
