use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mtn,
    Glo,
    Airtel,
    #[serde(rename = "9mobile")]
    NineMobile,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "mtn",
            Network::Glo => "glo",
            Network::Airtel => "airtel",
            Network::NineMobile => "9mobile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mtn" => Some(Network::Mtn),
            "glo" => Some(Network::Glo),
            "airtel" => Some(Network::Airtel),
            "9mobile" | "etisalat" => Some(Network::NineMobile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AirtimePurchaseRequest {
    #[schema(example = "mtn")]
    pub network: String,
    #[schema(example = "08031234567")]
    pub phone: String,
    #[schema(value_type = String, example = "500")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AirtimePurchaseReceipt {
    pub transaction_id: Uuid,
    pub vendor_reference: String,
    pub network: Network,
    pub phone: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub new_balance: Decimal,
}
