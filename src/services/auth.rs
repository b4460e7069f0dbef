use crate::database::sqlite::SqliteDatabase;
use crate::errors::{AppError, Result};
use crate::models::profile::{AccountStatus, KycStatus, Profile, Role};
use crate::services::change_feed::{ChangeFeed, ChangeOp};
use crate::services::jwt::{AuthenticatedUser, IssuedToken, JwtManager};
use crate::utils::crypto::{hash_token, PasswordManager};
use crate::utils::validation::Validator;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct AuthService {
    jwt_manager: JwtManager,
    database: Arc<SqliteDatabase>,
    feed: ChangeFeed,
}

impl AuthService {
    pub fn new(database: Arc<SqliteDatabase>, jwt_manager: JwtManager, feed: ChangeFeed) -> Self {
        Self { jwt_manager, database, feed }
    }

    pub async fn register(&self, email: &str, password: &str, display_name: &str) -> Result<Profile> {
        let email = email.trim().to_lowercase();
        let display_name = display_name.trim();
        Validator::validate_email(&email)?;
        Validator::validate_password(password)?;
        Validator::validate_display_name(display_name)?;

        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.clone(),
            display_name: display_name.to_string(),
            password_hash: PasswordManager::hash_password(password)?,
            role: Role::User,
            kyc_status: KycStatus::NotSubmitted,
            wallet_balance: Decimal::ZERO,
            account_status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.database.create_profile(&profile).await?;
        self.feed.publish("profiles", ChangeOp::Insert, profile.id, Some(profile.id));

        info!(action = "register_success", user = %email);
        Ok(profile)
    }

    /// Checks an email/password pair against the stored argon2 hash.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Profile> {
        let email = email.trim().to_lowercase();
        let profile = self
            .database
            .get_profile_by_email(&email)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("Invalid email or password".to_string()))?;

        if !PasswordManager::verify_password(password, &profile.password_hash)? {
            return Err(AppError::AuthenticationError("Invalid email or password".to_string()));
        }
        Ok(profile)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(IssuedToken, Profile)> {
        let profile = self.authenticate(email, password).await?;
        if profile.account_status == AccountStatus::Suspended {
            return Err(AppError::AuthorizationError("Account is suspended".to_string()));
        }

        let issued = self
            .issue_session(&profile.id.to_string(), &profile.email, &profile.display_name, profile.role)
            .await?;
        info!(action = "login_success", user = %profile.email);
        Ok((issued, profile))
    }

    /// Mints a token and records its hash in the session table.
    pub async fn issue_session(&self, subject: &str, email: &str, name: &str, role: Role) -> Result<IssuedToken> {
        let issued = self.jwt_manager.generate_token(subject, email, name, role)?;
        self.database
            .store_session(subject, &issued.token_id, &hash_token(&issued.token), role, issued.expires_at)
            .await?;

        match self.database.cleanup_expired_sessions().await {
            Ok(removed) if removed > 0 => debug!(action = "sessions_pruned", removed),
            _ => {}
        }
        Ok(issued)
    }

    /// Signature, expiry and a live session row are all required.
    pub async fn validate_session(&self, token: &str) -> Result<AuthenticatedUser> {
        let token_data = self.jwt_manager.validate_token(token)?;
        if !self
            .database
            .is_session_active(&token_data.claims.jti, &hash_token(token))
            .await?
        {
            return Err(AppError::AuthenticationError("Session expired or revoked".to_string()));
        }
        Ok(AuthenticatedUser::from(token_data.claims))
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        let user = self.validate_session(token).await?;
        self.database.revoke_session(&user.token_id).await?;
        info!(action = "logout", user = %user.email);
        Ok(())
    }

    pub async fn current_profile(&self, user_id: &Uuid) -> Result<Profile> {
        self.database
            .get_profile_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
    }

    pub fn database(&self) -> Arc<SqliteDatabase> {
        self.database.clone()
    }
}
