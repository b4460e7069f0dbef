use crate::api::routes::{stream_changes, BearerToken};
use crate::api::types::*;
use crate::api::AppState;
use crate::errors::{AppError, Result};
use crate::models::exchange_rate::{ExchangeRate, UpsertRateRequest};
use crate::models::gift_card::{GiftCardReviewRequest, GiftCardSubmission};
use crate::models::kyc::{KycReviewRequest, KycSubmission};
use crate::models::profile::ProfileResponse;
use crate::models::transaction::{LedgerReceipt, Transaction, TransactionType};
use crate::services::admin_gate::{AdminDescriptor, AdminLogin};
use crate::services::change_feed::ChangeOp;
use crate::services::jwt::AuthenticatedUser;
use axum::{
    extract::{ws::WebSocketUpgrade, FromRequestParts, Path, Query, State},
    http::request::Parts,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// A session that passed the admin gate.
pub struct AdminSession(pub AuthenticatedUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        Ok(AdminSession(state.admin_gate.authorize(&token).await?))
    }
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(admin_login))
        .route("/logout", post(admin_logout))
        .route("/me", get(admin_me))
        .route("/users", get(list_users))
        .route("/users/:id/status", put(set_user_status))
        .route("/users/:id/fund", post(fund_user))
        .route("/transactions", get(list_all_transactions))
        .route("/kyc", get(list_kyc))
        .route("/kyc/:id/review", post(review_kyc))
        .route("/rates/:code", put(upsert_rate))
        .route("/giftcards", get(list_all_gift_cards))
        .route("/giftcards/:id/review", post(review_gift_card))
        .route("/events", get(admin_events))
}

#[utoipa::path(post, path = "/api/admin/login", tag = "Admin", request_body = LoginRequest,
    responses((status = 200, body = AdminLogin), (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Not an admin")))]
pub async fn admin_login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<AdminLogin>> {
    Ok(Json(state.admin_gate.login(req.email.trim(), &req.password).await?))
}

#[utoipa::path(post, path = "/api/admin/logout", tag = "Admin", security(("bearerAuth" = [])),
    responses((status = 200, body = MessageResponse)))]
pub async fn admin_logout(
    State(state): State<AppState>,
    _admin: AdminSession,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>> {
    state.admin_gate.logout(&token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(get, path = "/api/admin/me", tag = "Admin", security(("bearerAuth" = [])),
    responses((status = 200, body = AdminDescriptor), (status = 403, description = "Not an admin")))]
pub async fn admin_me(AdminSession(admin): AdminSession) -> Json<AdminDescriptor> {
    Json(AdminDescriptor {
        id: admin.subject,
        email: admin.email,
        name: admin.name,
        role: admin.role,
    })
}

#[utoipa::path(get, path = "/api/admin/users", tag = "Admin", security(("bearerAuth" = [])),
    params(ListQuery), responses((status = 200, body = [ProfileResponse])))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProfileResponse>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let profiles = state.database.list_profiles(limit).await?;
    Ok(Json(profiles.into_iter().map(ProfileResponse::from).collect()))
}

#[utoipa::path(put, path = "/api/admin/users/{id}/status", tag = "Admin", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Profile id")), request_body = AccountStatusRequest,
    responses((status = 200, body = MessageResponse), (status = 404, description = "Unknown user")))]
pub async fn set_user_status(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<AccountStatusRequest>,
) -> Result<Json<MessageResponse>> {
    if !state.database.update_account_status(&id, req.status).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    state.feed.publish("profiles", ChangeOp::Update, id, Some(id));
    info!(action = "account_status_changed", user_id = %id, status = req.status.as_str(), admin = %admin.email);
    Ok(Json(MessageResponse::new(format!("Account is now {}", req.status.as_str()))))
}

#[utoipa::path(post, path = "/api/admin/users/{id}/fund", tag = "Admin", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Profile id")), request_body = FundRequest,
    responses((status = 200, body = LedgerReceipt), (status = 400, description = "Amount must be positive")))]
pub async fn fund_user(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<FundRequest>,
) -> Result<Json<LedgerReceipt>> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::ValidationError("Amount must be greater than zero".to_string()));
    }
    let reference = match req.reference.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => format!("admin-fund:{}", admin.email),
    };
    let receipt = state.ledger.apply(&id, req.amount, TransactionType::Fund, &reference).await?;
    info!(action = "admin_fund", user_id = %id, amount = %req.amount, admin = %admin.email);
    Ok(Json(receipt))
}

#[utoipa::path(get, path = "/api/admin/transactions", tag = "Admin", security(("bearerAuth" = [])),
    params(ListQuery), responses((status = 200, body = [Transaction])))]
pub async fn list_all_transactions(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.ledger.all_transactions(query.limit).await?))
}

#[utoipa::path(get, path = "/api/admin/kyc", tag = "Admin", security(("bearerAuth" = [])),
    params(KycListQuery), responses((status = 200, body = [KycSubmission])))]
pub async fn list_kyc(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<KycListQuery>,
) -> Result<Json<Vec<KycSubmission>>> {
    Ok(Json(state.kyc.list(query.status, query.limit).await?))
}

#[utoipa::path(post, path = "/api/admin/kyc/{id}/review", tag = "Admin", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "KYC submission id")), request_body = KycReviewRequest,
    responses((status = 200, body = KycSubmission), (status = 400, description = "Already reviewed")))]
pub async fn review_kyc(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<KycReviewRequest>,
) -> Result<Json<KycSubmission>> {
    Ok(Json(state.kyc.review(&id, &req, &admin.email).await?))
}

#[utoipa::path(put, path = "/api/admin/rates/{code}", tag = "Admin", security(("bearerAuth" = [])),
    params(("code" = String, Path, description = "Currency code")), request_body = UpsertRateRequest,
    responses((status = 200, body = ExchangeRate)))]
pub async fn upsert_rate(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(code): Path<String>,
    Json(req): Json<UpsertRateRequest>,
) -> Result<Json<ExchangeRate>> {
    Ok(Json(state.rates.upsert(&code, &req).await?))
}

#[utoipa::path(get, path = "/api/admin/giftcards", tag = "Admin", security(("bearerAuth" = [])),
    params(ListQuery), responses((status = 200, body = [GiftCardSubmission])))]
pub async fn list_all_gift_cards(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GiftCardSubmission>>> {
    Ok(Json(state.gift_cards.list_all(query.limit).await?))
}

#[utoipa::path(post, path = "/api/admin/giftcards/{id}/review", tag = "Admin", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Gift card submission id")), request_body = GiftCardReviewRequest,
    responses((status = 200, body = GiftCardSubmission)))]
pub async fn review_gift_card(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<Uuid>,
    Json(req): Json<GiftCardReviewRequest>,
) -> Result<Json<GiftCardSubmission>> {
    Ok(Json(state.gift_cards.review(&id, &req).await?))
}

/// `GET /api/admin/events`: every row change.
pub async fn admin_events(ws: WebSocketUpgrade, State(state): State<AppState>, AdminSession(admin): AdminSession) -> impl IntoResponse {
    let rx = state.feed.subscribe();
    info!(action = "admin_events_subscribed", admin = %admin.email);
    ws.on_upgrade(move |socket| stream_changes(socket, rx, None))
}
