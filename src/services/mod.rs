pub mod admin_gate;
pub mod airtime_service;
pub mod auth;
pub mod change_feed;
pub mod deposit_service;
pub mod gift_card_service;
pub mod jwt;
pub mod kyc_service;
pub mod ledger_service;
pub mod notification_service;
pub mod payment_method_service;
pub mod rate_service;
pub mod withdrawal_service;
