use crate::errors::{AppError, Result};
use crate::models::profile::Role;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// A freshly minted token plus the fields the session table needs.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

pub struct JwtManager {
    secret: String,
    ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: String, ttl_hours: i64) -> Self {
        Self {
            secret,
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn generate_token(&self, subject: &str, email: &str, name: &str, role: Role) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let token_id = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: token_id.clone(),
        };

        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_ref()))
            .map_err(|e| AppError::AuthenticationError(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken { token, token_id, expires_at })
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_ref()), &Validation::default())
            .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub token_id: String,
}

impl AuthenticatedUser {
    /// Profile id of the session owner. Bootstrap admin sessions have a
    /// non-UUID subject and no profile.
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.subject)
            .map_err(|_| AppError::AuthorizationError("Session is not bound to a user profile".to_string()))
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
            token_id: claims.jti,
        }
    }
}
