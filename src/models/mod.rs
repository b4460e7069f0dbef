pub mod airtime;
pub mod exchange_rate;
pub mod gift_card;
pub mod kyc;
pub mod notification;
pub mod payment_method;
pub mod profile;
pub mod transaction;
