use crate::config::AppConfig;
use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::gateways::airtime_api::{AirtimeVendor, HttpAirtimeVendor};
use crate::gateways::document_store::{DocumentStore, LocalDocumentStore};
use crate::gateways::price_api::{CoinGeckoPriceSource, PriceSource};
use crate::gateways::transfer_api::{HttpTransferGateway, TransferGateway};
use crate::gateways::http_client;
use crate::services::admin_gate::AdminGate;
use crate::services::airtime_service::AirtimeService;
use crate::services::auth::AuthService;
use crate::services::change_feed::ChangeFeed;
use crate::services::deposit_service::DepositService;
use crate::services::gift_card_service::GiftCardService;
use crate::services::jwt::JwtManager;
use crate::services::kyc_service::KycService;
use crate::services::ledger_service::LedgerService;
use crate::services::notification_service::NotificationService;
use crate::services::payment_method_service::PaymentMethodService;
use crate::services::rate_service::RateService;
use crate::services::withdrawal_service::WithdrawalService;
use crate::utils::middleware::{rate_limiter_middleware, request_id_middleware, RateLimiter};
use axum::{routing::get, Json, Router};
use hyper::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::{Modify, OpenApi};
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

pub mod admin_routes;
pub mod routes;
pub mod types;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        routes::register,
        routes::login,
        routes::logout,
        routes::me,
        routes::wallet_balance,
        routes::wallet_transactions,
        routes::wallet_transaction,
        routes::deposit,
        routes::withdraw,
        routes::kyc_submit,
        routes::kyc_status,
        routes::list_rates,
        routes::get_rate,
        routes::submit_gift_card,
        routes::list_gift_cards,
        routes::add_payment_method,
        routes::list_payment_methods,
        routes::delete_payment_method,
        routes::purchase_airtime,
        routes::list_notifications,
        routes::mark_notification_read,
        routes::mark_all_notifications_read,
        routes::delete_notification,
        admin_routes::admin_login,
        admin_routes::admin_logout,
        admin_routes::admin_me,
        admin_routes::list_users,
        admin_routes::set_user_status,
        admin_routes::fund_user,
        admin_routes::list_all_transactions,
        admin_routes::list_kyc,
        admin_routes::review_kyc,
        admin_routes::upsert_rate,
        admin_routes::list_all_gift_cards,
        admin_routes::review_gift_card,
    ),
    components(
        schemas(
            types::RegisterRequest,
            types::LoginRequest,
            types::LoginResponse,
            types::MessageResponse,
            types::BalanceResponse,
            types::CountResponse,
            types::FundRequest,
            types::AccountStatusRequest,
            types::HealthResponse,
            crate::models::profile::ProfileResponse,
            crate::models::profile::Role,
            crate::models::profile::KycStatus,
            crate::models::profile::AccountStatus,
            crate::models::transaction::Transaction,
            crate::models::transaction::TransactionType,
            crate::models::transaction::TransactionStatus,
            crate::models::transaction::LedgerReceipt,
            crate::models::transaction::DepositRequest,
            crate::models::transaction::DepositReceipt,
            crate::models::transaction::WithdrawalRequest,
            crate::models::kyc::KycSubmission,
            crate::models::kyc::KycSubmitRequest,
            crate::models::kyc::UploadedFile,
            crate::models::kyc::KycDecision,
            crate::models::kyc::KycReviewRequest,
            crate::models::exchange_rate::ExchangeRate,
            crate::models::exchange_rate::UpsertRateRequest,
            crate::models::gift_card::GiftCardSubmission,
            crate::models::gift_card::GiftCardSubmitRequest,
            crate::models::gift_card::GiftCardReviewRequest,
            crate::models::payment_method::PaymentMethod,
            crate::models::payment_method::NewPaymentMethod,
            crate::models::airtime::Network,
            crate::models::airtime::AirtimePurchaseRequest,
            crate::models::airtime::AirtimePurchaseReceipt,
            crate::models::notification::Notification,
            crate::models::notification::NotificationType,
            crate::services::admin_gate::AdminDescriptor,
            crate::services::admin_gate::AdminLogin,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Wallet", description = "Balance, deposits and withdrawals. Requires a bearer token."),
        (name = "KYC", description = "Identity verification"),
        (name = "Rates", description = "Exchange rates"),
        (name = "Gift Cards", description = "Gift card trade-ins"),
        (name = "Payment Methods", description = "Saved bank accounts"),
        (name = "Airtime", description = "Airtime top-up"),
        (name = "Notification", description = "In-app notifications"),
        (name = "Admin", description = "Back-office endpoints. Requires an admin session token.")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

/// Outbound integrations, swappable so tests can run offline.
pub struct Gateways {
    pub prices: Arc<dyn PriceSource>,
    pub transfers: Arc<dyn TransferGateway>,
    pub airtime: Arc<dyn AirtimeVendor>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Gateways {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = http_client(config.http_timeout_secs)?;
        Ok(Self {
            prices: Arc::new(CoinGeckoPriceSource::new(client.clone(), &config.price_api_url)),
            transfers: Arc::new(HttpTransferGateway::new(
                client.clone(),
                &config.transfer_api_url,
                &config.transfer_api_key,
            )),
            airtime: Arc::new(HttpAirtimeVendor::new(client, &config.airtime_api_url, &config.airtime_api_key)),
            documents: Arc::new(LocalDocumentStore::new(&config.upload_dir)),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Arc<SqliteDatabase>,
    pub feed: ChangeFeed,
    pub auth: Arc<AuthService>,
    pub admin_gate: Arc<AdminGate>,
    pub ledger: Arc<LedgerService>,
    pub deposits: Arc<DepositService>,
    pub withdrawals: Arc<WithdrawalService>,
    pub kyc: Arc<KycService>,
    pub rates: Arc<RateService>,
    pub gift_cards: Arc<GiftCardService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub airtime: Arc<AirtimeService>,
    pub notifications: Arc<NotificationService>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, database: Arc<SqliteDatabase>, gateways: Gateways) -> Self {
        let feed = ChangeFeed::default();
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.session_ttl_hours);
        let auth = Arc::new(AuthService::new(database.clone(), jwt, feed.clone()));
        let admin_gate = Arc::new(AdminGate::new(config.bootstrap_admin.clone(), auth.clone(), auth.clone()));
        let ledger = Arc::new(LedgerService::new(database.clone(), feed.clone()));
        let notifications = Arc::new(NotificationService::new(database.clone(), feed.clone()));

        Self {
            deposits: Arc::new(DepositService::new(
                gateways.prices,
                ledger.clone(),
                notifications.clone(),
                config.ngn_per_usd,
            )),
            withdrawals: Arc::new(WithdrawalService::new(
                database.clone(),
                gateways.transfers,
                ledger.clone(),
                notifications.clone(),
                feed.clone(),
                config.min_withdrawal_ngn,
            )),
            kyc: Arc::new(KycService::new(
                database.clone(),
                gateways.documents,
                notifications.clone(),
                feed.clone(),
            )),
            rates: Arc::new(RateService::new(database.clone(), feed.clone())),
            gift_cards: Arc::new(GiftCardService::new(
                database.clone(),
                ledger.clone(),
                notifications.clone(),
                feed.clone(),
            )),
            payment_methods: Arc::new(PaymentMethodService::new(database.clone(), feed.clone())),
            airtime: Arc::new(AirtimeService::new(
                database.clone(),
                gateways.airtime,
                ledger.clone(),
                notifications.clone(),
            )),
            limiter: Arc::new(RateLimiter::new(config.rate_limit_per_sec, Duration::from_secs(1))),
            config: Arc::new(config),
            database,
            feed,
            auth,
            admin_gate,
            ledger,
            notifications,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .nest("/api/auth", routes::auth_router())
        .nest("/api/wallet", routes::wallet_router())
        .nest("/api/kyc", routes::kyc_router())
        .nest("/api/rates", routes::rates_router())
        .nest("/api/giftcards", routes::gift_card_router())
        .nest("/api/payment-methods", routes::payment_method_router())
        .nest("/api/airtime", routes::airtime_router())
        .nest("/api/notifications", routes::notifications_router())
        .route("/api/events", get(routes::user_events))
        .nest("/api/admin", admin_routes::admin_router())
        .route("/health", get(health_check))
        .route("/api/openapi.json", get(openapi_json))
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", openapi.clone()))
        .merge(Redoc::with_url("/api/redoc", openapi))
        .layer(axum::middleware::from_fn_with_state(state.limiter.clone(), rate_limiter_middleware))
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

#[utoipa::path(get, path = "/health", tag = "Auth", responses((status = 200, body = types::HealthResponse)))]
pub async fn health_check() -> Json<types::HealthResponse> {
    Json(types::HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Opens the store, wires every service and serves until the process exits.
pub async fn start_http_server(config: AppConfig) -> Result<()> {
    let database = Arc::new(SqliteDatabase::new(&config.database_path).await?);
    let gateways = Gateways::from_config(&config)?;
    let port = config.port;
    let state = AppState::new(config, database, gateways);

    // Expired sessions and closed rate-limit windows are swept periodically.
    let janitor = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(300));
        loop {
            tick.tick().await;
            janitor.limiter.prune();
            if let Err(e) = janitor.database.cleanup_expired_sessions().await {
                tracing::warn!(action = "session_cleanup_failed", error = %e);
            }
        }
    });

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::ConfigError(format!("Failed to bind {}: {}", addr, e)))?;

    info!(action = "server_started", addr = %addr, docs = %format!("http://{}/api/docs", addr));
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::InternalError(format!("Server error: {}", e)))
}
