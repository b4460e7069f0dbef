//! Admin login and admin-session checks.
//!
//! The configured bootstrap pair is checked first and never touches the
//! identity provider, so operators can still sign in while it is down. Every
//! other pair must authenticate and then pass the admin-role check.

use crate::config::BootstrapAdmin;
use crate::errors::{AppError, Result};
use crate::models::profile::{Profile, Role};
use crate::services::auth::AuthService;
use crate::services::jwt::AuthenticatedUser;
use crate::utils::crypto::constant_time_eq;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const BOOTSTRAP_SUBJECT: &str = "bootstrap-admin";

/// Credential check plus the role lookup the gate relies on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Profile>;
    async fn is_admin(&self, user_id: &Uuid) -> Result<bool>;
}

#[async_trait]
impl IdentityProvider for AuthService {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Profile> {
        AuthService::authenticate(self, email, password).await
    }

    async fn is_admin(&self, user_id: &Uuid) -> Result<bool> {
        self.database().is_admin(user_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminDescriptor {
    /// Profile id, or `bootstrap-admin` for the configured pair.
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminLogin {
    pub admin: AdminDescriptor,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AdminGate {
    bootstrap: Option<BootstrapAdmin>,
    identity: Arc<dyn IdentityProvider>,
    sessions: Arc<AuthService>,
}

impl AdminGate {
    pub fn new(bootstrap: Option<BootstrapAdmin>, identity: Arc<dyn IdentityProvider>, sessions: Arc<AuthService>) -> Self {
        Self { bootstrap, identity, sessions }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AdminLogin> {
        let admin = match self.bootstrap_match(email, password) {
            Some(admin) => {
                info!(action = "admin_login_bootstrap", admin = %admin.email);
                admin
            }
            None => self.provider_login(email, password).await?,
        };

        let issued = self
            .sessions
            .issue_session(&admin.id, &admin.email, &admin.name, Role::Admin)
            .await?;
        Ok(AdminLogin {
            admin,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Resolves a bearer token to an admin session. Bootstrap sessions carry
    /// no profile and are trusted on their role claim alone.
    pub async fn authorize(&self, token: &str) -> Result<AuthenticatedUser> {
        let user = self.sessions.validate_session(token).await?;
        if user.role != Role::Admin {
            return Err(AppError::AuthorizationError("Admin access required".to_string()));
        }
        if user.subject != BOOTSTRAP_SUBJECT {
            // Role may have been revoked since the token was issued.
            let user_id = user.user_id()?;
            if !self.identity.is_admin(&user_id).await? {
                return Err(AppError::AuthorizationError("Admin access required".to_string()));
            }
        }
        Ok(user)
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.logout(token).await
    }

    fn bootstrap_match(&self, email: &str, password: &str) -> Option<AdminDescriptor> {
        let bootstrap = self.bootstrap.as_ref()?;
        // Evaluate both comparisons so timing does not reveal which one failed.
        let email_ok = constant_time_eq(email, &bootstrap.email);
        let password_ok = constant_time_eq(password, &bootstrap.password);
        (email_ok && password_ok).then(|| AdminDescriptor {
            id: BOOTSTRAP_SUBJECT.to_string(),
            email: bootstrap.email.clone(),
            name: "Administrator".to_string(),
            role: Role::Admin,
        })
    }

    async fn provider_login(&self, email: &str, password: &str) -> Result<AdminDescriptor> {
        let profile = self.identity.authenticate(email, password).await?;
        if !self.identity.is_admin(&profile.id).await? {
            warn!(action = "admin_login_denied", user = %profile.email);
            return Err(AppError::AuthorizationError("Admin access required".to_string()));
        }

        info!(action = "admin_login", admin = %profile.email);
        Ok(AdminDescriptor {
            id: profile.id.to_string(),
            email: profile.email,
            name: profile.display_name,
            role: Role::Admin,
        })
    }
}
