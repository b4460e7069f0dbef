pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod gateways;
pub mod models;
pub mod services;
pub mod utils;
