//! Stateless access and refresh tokens (HS256 JWTs).

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::models::{Role, User},
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Full identity carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub token_use: TokenUse,
}

/// Refresh tokens only name the subject and role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub token_use: TokenUse,
}

/// A freshly minted access token and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub token: String,
    pub claims: AccessClaims,
}

#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    validation: Validation,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        let mut validation = Validation::default();
        // Expiry is exact: no grace period past `exp`.
        validation.leeway = 0;

        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
            validation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.refresh_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn sign_access_token(&self, user: &User) -> Result<IssuedAccess, jsonwebtoken::errors::Error> {
        self.sign_access_at(user, Utc::now().timestamp())
    }

    fn sign_access_at(
        &self,
        user: &User,
        issued_at: i64,
    ) -> Result<IssuedAccess, jsonwebtoken::errors::Error> {
        let claims = AccessClaims {
            sub: user.id,
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            iat: issued_at,
            exp: issued_at + self.access_ttl_secs,
            token_use: TokenUse::Access,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        Ok(IssuedAccess { token, claims })
    }

    pub fn sign_refresh_token(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        self.sign_refresh_at(user, Utc::now().timestamp())
    }

    fn sign_refresh_at(
        &self,
        user: &User,
        issued_at: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = RefreshClaims {
            sub: user.id,
            role: user.role,
            iat: issued_at,
            exp: issued_at + self.refresh_ttl_secs,
            token_use: TokenUse::Refresh,
        };
        encode(&Header::default(), &claims, &self.refresh_encoding)
    }

    /// Any failure (malformed, expired, bad signature, wrong token kind)
    /// yields `None`.
    pub fn verify_access(&self, token: &str) -> Option<AccessClaims> {
        match decode::<AccessClaims>(token, &self.access_decoding, &self.validation) {
            Ok(data) if data.claims.token_use == TokenUse::Access => Some(data.claims),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Access token rejected: {}", e);
                None
            }
        }
    }

    pub fn verify_refresh(&self, token: &str) -> Option<RefreshClaims> {
        match decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation) {
            Ok(data) if data.claims.token_use == TokenUse::Refresh => Some(data.claims),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Refresh token rejected: {}", e);
                None
            }
        }
    }

    /// Mints a new access token from a refresh token. The user is re-read so
    /// the new token reflects the current role; a missing or inactive account
    /// yields `None`.
    pub async fn refresh_access_token(
        &self,
        store: &dyn Store,
        refresh_token: &str,
    ) -> Option<IssuedAccess> {
        let claims = self.verify_refresh(refresh_token)?;

        let user = match store.find_user(claims.sub).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(_) => {
                tracing::info!(user_id = %claims.sub, "Refresh denied for missing or inactive user");
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to load user during token refresh: {}", e);
                return None;
            }
        };

        match self.sign_access_token(&user) {
            Ok(issued) => Some(issued),
            Err(e) => {
                tracing::error!("Failed to sign refreshed access token: {}", e);
                None
            }
        }
    }
}
