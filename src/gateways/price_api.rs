use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Spot price lookup for a crypto asset, quoted in USD.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// `Ok(None)` when the API answered but carried no price for the asset.
    async fn usd_price(&self, asset_id: &str) -> Result<Option<Decimal>>;
}

/// Maps a ticker to the price API's asset id. Unknown tickers are passed
/// through lowercased.
pub fn asset_id_for(currency_code: &str) -> String {
    match currency_code.trim().to_uppercase().as_str() {
        "BTC" => "bitcoin".to_string(),
        "ETH" => "ethereum".to_string(),
        "USDT" => "tether".to_string(),
        "USDC" => "usd-coin".to_string(),
        "BNB" => "binancecoin".to_string(),
        "SOL" => "solana".to_string(),
        "LTC" => "litecoin".to_string(),
        "TRX" => "tron".to_string(),
        "XRP" => "ripple".to_string(),
        "DOGE" => "dogecoin".to_string(),
        other => other.to_lowercase(),
    }
}

pub struct CoinGeckoPriceSource {
    client: Client,
    base_url: String,
}

impl CoinGeckoPriceSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoPriceSource {
    async fn usd_price(&self, asset_id: &str) -> Result<Option<Decimal>> {
        let url = format!("{}/simple/price", self.base_url);
        let res = self
            .client
            .get(&url)
            .query(&[("ids", asset_id), ("vs_currencies", "usd")])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AppError::ExternalServiceError(format!("Price API returned {}", res.status())));
        }

        let body: Value = res.json().await?;
        Ok(extract_usd_price(&body, asset_id))
    }
}

fn extract_usd_price(body: &Value, asset_id: &str) -> Option<Decimal> {
    let raw = body.get(asset_id)?.get("usd")?;
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
}
