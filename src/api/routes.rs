use crate::api::types::*;
use crate::api::AppState;
use crate::errors::{AppError, Result};
use crate::models::airtime::{AirtimePurchaseReceipt, AirtimePurchaseRequest};
use crate::models::exchange_rate::ExchangeRate;
use crate::models::gift_card::{GiftCardSubmission, GiftCardSubmitRequest};
use crate::models::kyc::{KycSubmission, KycSubmitRequest};
use crate::models::notification::Notification;
use crate::models::payment_method::{NewPaymentMethod, PaymentMethod};
use crate::models::profile::ProfileResponse;
use crate::models::transaction::{DepositReceipt, DepositRequest, Transaction, WithdrawalRequest};
use crate::services::change_feed::RowChange;
use crate::services::jwt::AuthenticatedUser;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

/// Raw session token from `Authorization: Bearer ...` or `?access_token=`.
pub struct BearerToken(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        if let Some(token) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        {
            return Ok(BearerToken(token.trim().to_string()));
        }
        if let Ok(Query(query)) = Query::<TokenQuery>::try_from_uri(&parts.uri) {
            if let Some(token) = query.access_token.filter(|t| !t.is_empty()) {
                return Ok(BearerToken(token));
            }
        }
        Err(AppError::AuthenticationError("Missing or invalid Authorization header".to_string()))
    }
}

/// A live user session.
pub struct AuthUser(pub AuthenticatedUser);

impl AuthUser {
    pub fn user_id(&self) -> Result<Uuid> {
        self.0.user_id()
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        Ok(AuthUser(state.auth.validate_session(&token).await?))
    }
}

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

pub fn wallet_router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(wallet_balance))
        .route("/transactions", get(wallet_transactions))
        .route("/transactions/:id", get(wallet_transaction))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
}

pub fn kyc_router() -> Router<AppState> {
    Router::new()
        .route("/submit", post(kyc_submit))
        .route("/status", get(kyc_status))
}

pub fn rates_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rates))
        .route("/:code", get(get_rate))
}

pub fn gift_card_router() -> Router<AppState> {
    Router::new().route("/", post(submit_gift_card).get(list_gift_cards))
}

pub fn payment_method_router() -> Router<AppState> {
    Router::new()
        .route("/", post(add_payment_method).get(list_payment_methods))
        .route("/:id", delete(delete_payment_method))
}

pub fn airtime_router() -> Router<AppState> {
    Router::new().route("/purchase", post(purchase_airtime))
}

pub fn notifications_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_notifications_read))
        .route("/:id/read", post(mark_notification_read))
        .route("/:id", delete(delete_notification))
}

// Auth

#[utoipa::path(post, path = "/api/auth/register", tag = "Auth", request_body = RegisterRequest,
    responses((status = 201, body = ProfileResponse), (status = 400, description = "Invalid input or email taken")))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>)> {
    let profile = state.auth.register(&req.email, &req.password, &req.display_name).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

#[utoipa::path(post, path = "/api/auth/login", tag = "Auth", request_body = LoginRequest,
    responses((status = 200, body = LoginResponse), (status = 401, description = "Invalid credentials")))]
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let (issued, profile) = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        profile: profile.into(),
    }))
}

#[utoipa::path(post, path = "/api/auth/logout", tag = "Auth", security(("bearerAuth" = [])),
    responses((status = 200, body = MessageResponse)))]
pub async fn logout(State(state): State<AppState>, BearerToken(token): BearerToken) -> Result<Json<MessageResponse>> {
    state.auth.logout(&token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(get, path = "/api/auth/me", tag = "Auth", security(("bearerAuth" = [])),
    responses((status = 200, body = ProfileResponse)))]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Json<ProfileResponse>> {
    let profile = state.auth.current_profile(&user.user_id()?).await?;
    Ok(Json(profile.into()))
}

// Wallet

#[utoipa::path(get, path = "/api/wallet/balance", tag = "Wallet", security(("bearerAuth" = [])),
    responses((status = 200, body = BalanceResponse)))]
pub async fn wallet_balance(State(state): State<AppState>, user: AuthUser) -> Result<Json<BalanceResponse>> {
    let balance = state.ledger.balance(&user.user_id()?).await?;
    Ok(Json(BalanceResponse { balance, currency: "NGN".to_string() }))
}

#[utoipa::path(get, path = "/api/wallet/transactions", tag = "Wallet", security(("bearerAuth" = [])),
    params(ListQuery), responses((status = 200, body = [Transaction])))]
pub async fn wallet_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.ledger.history(&user.user_id()?, query.limit).await?))
}

#[utoipa::path(get, path = "/api/wallet/transactions/{id}", tag = "Wallet", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses((status = 200, body = Transaction), (status = 404, description = "Not found")))]
pub async fn wallet_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>> {
    Ok(Json(state.ledger.transaction_for(&user.user_id()?, &id).await?))
}

#[utoipa::path(post, path = "/api/wallet/deposit", tag = "Wallet", security(("bearerAuth" = [])),
    request_body = DepositRequest, responses((status = 200, body = DepositReceipt)))]
pub async fn deposit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositReceipt>> {
    Ok(Json(state.deposits.convert(&user.user_id()?, &req).await?))
}

#[utoipa::path(post, path = "/api/wallet/withdraw", tag = "Wallet", security(("bearerAuth" = [])),
    request_body = WithdrawalRequest,
    responses((status = 200, body = Transaction), (status = 400, description = "Validation failed"),
        (status = 502, description = "Transfer provider rejected the payout")))]
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<WithdrawalRequest>,
) -> Result<Json<Transaction>> {
    Ok(Json(state.withdrawals.withdraw(&user.user_id()?, &req).await?))
}

// KYC

#[utoipa::path(post, path = "/api/kyc/submit", tag = "KYC", security(("bearerAuth" = [])),
    request_body = KycSubmitRequest, responses((status = 201, body = KycSubmission)))]
pub async fn kyc_submit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<KycSubmitRequest>,
) -> Result<(StatusCode, Json<KycSubmission>)> {
    let submission = state.kyc.submit(&user.user_id()?, &req).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

#[utoipa::path(get, path = "/api/kyc/status", tag = "KYC", security(("bearerAuth" = [])),
    responses((status = 200, body = KycSubmission), (status = 404, description = "Nothing submitted yet")))]
pub async fn kyc_status(State(state): State<AppState>, user: AuthUser) -> Result<Json<KycSubmission>> {
    state
        .kyc
        .status(&user.user_id()?)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No KYC submission".to_string()))
}

// Rates

#[utoipa::path(get, path = "/api/rates", tag = "Rates", responses((status = 200, body = [ExchangeRate])))]
pub async fn list_rates(State(state): State<AppState>) -> Result<Json<Vec<ExchangeRate>>> {
    Ok(Json(state.rates.list().await?))
}

#[utoipa::path(get, path = "/api/rates/{code}", tag = "Rates",
    params(("code" = String, Path, description = "Currency code, e.g. USDT")),
    responses((status = 200, body = ExchangeRate), (status = 404, description = "Unknown currency")))]
pub async fn get_rate(State(state): State<AppState>, Path(code): Path<String>) -> Result<Json<ExchangeRate>> {
    Ok(Json(state.rates.get(&code).await?))
}

// Gift cards

#[utoipa::path(post, path = "/api/giftcards", tag = "Gift Cards", security(("bearerAuth" = [])),
    request_body = GiftCardSubmitRequest, responses((status = 201, body = GiftCardSubmission)))]
pub async fn submit_gift_card(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<GiftCardSubmitRequest>,
) -> Result<(StatusCode, Json<GiftCardSubmission>)> {
    let card = state.gift_cards.submit(&user.user_id()?, &req).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

#[utoipa::path(get, path = "/api/giftcards", tag = "Gift Cards", security(("bearerAuth" = [])),
    params(ListQuery), responses((status = 200, body = [GiftCardSubmission])))]
pub async fn list_gift_cards(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GiftCardSubmission>>> {
    Ok(Json(state.gift_cards.list_for_user(&user.user_id()?, query.limit).await?))
}

// Payment methods

#[utoipa::path(post, path = "/api/payment-methods", tag = "Payment Methods", security(("bearerAuth" = [])),
    request_body = NewPaymentMethod, responses((status = 201, body = PaymentMethod)))]
pub async fn add_payment_method(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<NewPaymentMethod>,
) -> Result<(StatusCode, Json<PaymentMethod>)> {
    let method = state.payment_methods.add(&user.user_id()?, &req).await?;
    Ok((StatusCode::CREATED, Json(method)))
}

#[utoipa::path(get, path = "/api/payment-methods", tag = "Payment Methods", security(("bearerAuth" = [])),
    responses((status = 200, body = [PaymentMethod])))]
pub async fn list_payment_methods(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<PaymentMethod>>> {
    Ok(Json(state.payment_methods.list(&user.user_id()?).await?))
}

#[utoipa::path(delete, path = "/api/payment-methods/{id}", tag = "Payment Methods", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Payment method id")),
    responses((status = 200, body = MessageResponse), (status = 404, description = "Not found")))]
pub async fn delete_payment_method(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.payment_methods.delete(&user.user_id()?, &id).await?;
    Ok(Json(MessageResponse::new("Payment method removed")))
}

// Airtime

#[utoipa::path(post, path = "/api/airtime/purchase", tag = "Airtime", security(("bearerAuth" = [])),
    request_body = AirtimePurchaseRequest,
    responses((status = 200, body = AirtimePurchaseReceipt), (status = 502, description = "Vendor failed; nothing debited")))]
pub async fn purchase_airtime(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AirtimePurchaseRequest>,
) -> Result<Json<AirtimePurchaseReceipt>> {
    Ok(Json(state.airtime.purchase(&user.user_id()?, &req).await?))
}

// Notifications

#[utoipa::path(get, path = "/api/notifications", tag = "Notification", security(("bearerAuth" = [])),
    params(ListQuery), responses((status = 200, body = [Notification])))]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.notifications.get_user_notifications(&user.user_id()?, query.limit).await?))
}

#[utoipa::path(post, path = "/api/notifications/{id}/read", tag = "Notification", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, body = MessageResponse)))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.notifications.mark_read(&user.user_id()?, &id).await?;
    Ok(Json(MessageResponse::new("Notification marked as read")))
}

#[utoipa::path(post, path = "/api/notifications/read-all", tag = "Notification", security(("bearerAuth" = [])),
    responses((status = 200, body = CountResponse)))]
pub async fn mark_all_notifications_read(State(state): State<AppState>, user: AuthUser) -> Result<Json<CountResponse>> {
    let updated = state.notifications.mark_all_read(&user.user_id()?).await?;
    Ok(Json(CountResponse { updated }))
}

#[utoipa::path(delete, path = "/api/notifications/{id}", tag = "Notification", security(("bearerAuth" = [])),
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, body = MessageResponse)))]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    state.notifications.delete(&user.user_id()?, &id).await?;
    Ok(Json(MessageResponse::new("Notification deleted")))
}

// Change feed

/// `GET /api/events`: row changes owned by the caller, as JSON text frames.
pub async fn user_events(ws: WebSocketUpgrade, State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    let user_id = user.user_id()?;
    let rx = state.feed.subscribe();
    info!(action = "events_subscribed", user_id = %user_id);
    Ok(ws.on_upgrade(move |socket| stream_changes(socket, rx, Some(user_id))))
}

/// Forwards feed events until the client goes away. With `owner` set, only
/// that user's rows are sent.
pub(crate) async fn stream_changes(mut socket: WebSocket, mut rx: broadcast::Receiver<RowChange>, owner: Option<Uuid>) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(change) => {
                        if owner.is_some() && change.user_id != owner {
                            continue;
                        }
                        let payload = match serde_json::to_string(&change) {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(action = "event_serialize_failed", error = %e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(action = "events_lagged", skipped = n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::api::test_support::{call, test_state};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    async fn register_and_login(router: &Router, email: &str) -> String {
        let (status, _) = call(
            router,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "passw0rd1", "display_name": "Test User" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            router,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "passw0rd1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = build_router(test_state().await);
        let (status, body) = call(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn wallet_requires_a_session() {
        let router = build_router(test_state().await);
        let (status, body) = call(&router, "GET", "/api/wallet/balance", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("Authorization"));
    }

    #[tokio::test]
    async fn register_login_me_and_balance() {
        let router = build_router(test_state().await);
        let token = register_and_login(&router, "flow@example.com").await;

        let (status, body) = call(&router, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "flow@example.com");
        assert_eq!(body["kyc_status"], "not_submitted");

        let (status, body) = call(&router, "GET", "/api/wallet/balance", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let balance: Decimal = body["balance"].as_str().unwrap().parse().unwrap();
        assert_eq!(balance, Decimal::ZERO);
        assert_eq!(body["currency"], "NGN");
    }

    #[tokio::test]
    async fn deposit_credits_at_configured_rate() {
        let router = build_router(test_state().await);
        let token = register_and_login(&router, "dep@example.com").await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/wallet/deposit",
            Some(&token),
            Some(json!({ "amount": "2", "currency": "USDT", "tx_hash": "0xfeed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        // Fake price source quotes 1 USD; 1600 NGN per USD.
        let local: Decimal = body["local_amount"].as_str().unwrap().parse().unwrap();
        assert_eq!(local, Decimal::from(3200));

        let (_, history) = call(&router, "GET", "/api/wallet/transactions", Some(&token), None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["transaction_type"], "deposit");
        assert_eq!(history[0]["reference"], "0xfeed");
    }

    #[tokio::test]
    async fn oversized_deposit_is_bad_request() {
        let router = build_router(test_state().await);
        let token = register_and_login(&router, "whale@example.com").await;

        let (status, body) = call(
            &router,
            "POST",
            "/api/wallet/deposit",
            Some(&token),
            Some(json!({ "amount": "60000000000000000000000000", "currency": "USDT", "tx_hash": "0xbig" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body["error"], "Validation error: Amount too large");

        let (_, history) = call(&router, "GET", "/api/wallet/transactions", Some(&token), None).await;
        assert!(history.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdrawal_below_minimum_is_bad_request() {
        let router = build_router(test_state().await);
        let token = register_and_login(&router, "wd@example.com").await;

        let (status, _) = call(
            &router,
            "POST",
            "/api/wallet/withdraw",
            Some(&token),
            Some(json!({
                "amount": "500",
                "bank_code": "058",
                "account_number": "0123456789",
                "idempotency_key": "abc"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_invalidates_token() {
        let router = build_router(test_state().await);
        let token = register_and_login(&router, "bye@example.com").await;

        let (status, _) = call(&router, "POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&router, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn payment_methods_and_notifications_round_trip() {
        let router = build_router(test_state().await);
        let token = register_and_login(&router, "pm@example.com").await;

        let (status, method) = call(
            &router,
            "POST",
            "/api/payment-methods",
            Some(&token),
            Some(json!({
                "bank_name": "Access Bank",
                "bank_code": "044",
                "account_number": "0690000031",
                "account_name": "Test User"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let path = format!("/api/payment-methods/{}", method["id"].as_str().unwrap());
        let (status, _) = call(&router, "DELETE", &path, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&router, "DELETE", &path, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&router, "POST", "/api/notifications/read-all", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "updated": 0 }));
    }

    #[tokio::test]
    async fn unknown_rate_is_not_found() {
        let router = build_router(test_state().await);
        let (status, body): (StatusCode, Value) = call(&router, "GET", "/api/rates/XYZ", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
