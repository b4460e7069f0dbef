use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::NotSubmitted => "not_submitted",
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => KycStatus::Pending,
            "approved" => KycStatus::Approved,
            "rejected" => KycStatus::Rejected,
            _ => KycStatus::NotSubmitted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "suspended" => AccountStatus::Suspended,
            _ => AccountStatus::Active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub kyc_status: KycStatus,
    pub wallet_balance: Decimal,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub kyc_status: KycStatus,
    #[schema(value_type = String)]
    pub wallet_balance: Decimal,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        ProfileResponse {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            role: profile.role,
            kyc_status: profile.kyc_status,
            wallet_balance: profile.wallet_balance,
            account_status: profile.account_status,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_defaults_to_user() {
        assert_eq!(Role::parse("superuser"), Role::User);
        assert_eq!(Role::parse("admin"), Role::Admin);
    }

    #[test]
    fn kyc_status_serializes_snake_case() {
        let json = serde_json::to_string(&KycStatus::NotSubmitted).unwrap();
        assert_eq!(json, "\"not_submitted\"");
        assert_eq!(KycStatus::parse("not_submitted"), KycStatus::NotSubmitted);
    }
}
