use crate::errors::{AppError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Bootstrap admin credentials. When configured, this pair is accepted by the
/// admin gate without consulting the credential store.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub rate_limit_per_sec: u64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub ngn_per_usd: Decimal,
    pub min_withdrawal_ngn: Decimal,
    pub price_api_url: String,
    pub transfer_api_url: String,
    pub transfer_api_key: String,
    pub airtime_api_url: String,
    pub airtime_api_key: String,
    pub upload_dir: String,
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Loads `.env` if present, then reads every setting from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::ConfigError("JWT_SECRET must be set".to_string()))?;
        if jwt_secret.len() < 16 {
            return Err(AppError::ConfigError("JWT_SECRET must be at least 16 characters".to_string()));
        }

        let bootstrap_admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email, password })
            }
            _ => None,
        };

        Ok(Self {
            database_path: env_or("DATABASE_PATH", "tradevault.db"),
            port: parse_env("PORT", 8080)?,
            jwt_secret,
            session_ttl_hours: parse_env("SESSION_TTL_HOURS", 24)?,
            rate_limit_per_sec: parse_env("RATE_LIMIT_PER_SEC", 5)?,
            bootstrap_admin,
            ngn_per_usd: parse_decimal_env("NGN_PER_USD", "1600")?,
            min_withdrawal_ngn: parse_decimal_env("MIN_WITHDRAWAL_NGN", "1000")?,
            price_api_url: env_or("PRICE_API_URL", "https://api.coingecko.com/api/v3"),
            transfer_api_url: env_or("TRANSFER_API_URL", "https://api.paystack.co"),
            transfer_api_key: env_or("TRANSFER_API_KEY", ""),
            airtime_api_url: env_or("AIRTIME_API_URL", "https://vtu.ng/wp-json/api/v1"),
            airtime_api_key: env_or("AIRTIME_API_KEY", ""),
            upload_dir: env_or("UPLOAD_DIR", "uploads"),
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", 15)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_decimal_env(key: &str, default: &str) -> Result<Decimal> {
    let raw = env_or(key, default);
    Decimal::from_str(raw.trim())
        .map_err(|_| AppError::ConfigError(format!("{} is not a decimal: {}", key, raw)))
}
