/**
 * Authentication Routes
 * Registration, cookie-based login/logout, token refresh and password reset
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{created, message, normalize_email, ok, required_text};
use crate::{
    auth::{
        cookies::{self, presented_access_token},
        password::{
            generate_reset_token, hash_password, hash_reset_token, validate_password,
            verify_password,
        },
    },
    db::models::{NewUser, Role, User},
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Password reset tokens stay valid for one hour.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub tokens: SessionTokens,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Only outside production; delivery is otherwise out of band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
/// Open registration; new accounts get the `user` role.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required_text(&payload.name, "Name", 100)?;
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name,
            email,
            password_hash,
            role: Role::User,
            is_active: true,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(created(RegisteredUser {
        id: user.id,
        email: user.email,
        name: user.name,
    }))
}

/// POST /api/auth/login
/// Verifies credentials and sets both session cookies.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }
    let email = normalize_email(&payload.email)?;

    let invalid = || ApiError::Unauthenticated("Invalid email or password".to_string());

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        verify_password(payload.password, state.decoy_hash.to_string()).await?;
        return Err(invalid());
    };

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    let now = Utc::now();
    state.store.record_login(user.id, now).await?;

    let access = state
        .tokens
        .sign_access_token(&user)
        .map_err(ApiError::internal)?;
    let refresh = state
        .tokens
        .sign_refresh_token(&user)
        .map_err(ApiError::internal)?;

    let jar = state
        .cookies
        .issue(jar, access.token.clone(), refresh.clone());

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    let user = User {
        last_login: Some(now),
        ..user
    };
    Ok((
        jar,
        ok(LoginResponse {
            user,
            tokens: SessionTokens {
                access_token: access.token,
                refresh_token: refresh,
                expires_in: state.tokens.access_ttl_secs(),
            },
        }),
    ))
}

/// POST /api/auth/logout
/// Always clears both cookies.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (state.cookies.clear(jar), message("Logged out successfully"))
}

/// POST /api/auth/refresh
/// Mints a new access token from the refresh cookie.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let token = cookies::refresh_token(&jar)
        .ok_or_else(|| ApiError::Unauthenticated("Refresh token missing".to_string()))?;

    let issued = state
        .tokens
        .refresh_access_token(state.store.as_ref(), &token)
        .await
        .ok_or_else(|| ApiError::Unauthenticated("Invalid or expired refresh token".to_string()))?;

    let jar = jar.add(state.cookies.access_cookie(issued.token.clone()));
    Ok((
        jar,
        ok(RefreshResponse {
            access_token: issued.token,
            expires_in: state.tokens.access_ttl_secs(),
        }),
    ))
}

/// GET /api/auth/session
/// The current account, re-read from the store.
pub async fn session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let claims = presented_access_token(&jar, &headers)
        .and_then(|token| state.tokens.verify_access(&token))
        .ok_or_else(ApiError::unauthenticated)?;

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(ApiError::unauthenticated)?;

    Ok(ok(user))
}

/// POST /api/auth/forgot-password
/// Answers identically whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&payload.email)?;
    let mut reset_token = None;

    if let Some(mut user) = state.store.find_user_by_email(&email).await? {
        if user.is_active {
            let token = generate_reset_token();
            user.reset_token_hash = Some(hash_reset_token(&token));
            user.reset_token_expires = Some(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES));
            state.store.update_user(&user).await?;
            tracing::info!(user_id = %user.id, "Password reset requested");
            reset_token = Some(token);
        }
    }

    if state.config.environment.is_production() {
        reset_token = None;
    }

    Ok((
        StatusCode::OK,
        ok(ForgotPasswordResponse {
            message: "If that account exists, a password reset link has been sent".to_string(),
            reset_token,
        }),
    ))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::validation("Invalid or expired reset token");

    if payload.token.trim().is_empty() {
        return Err(invalid());
    }
    validate_password(&payload.password)?;

    let mut user = state
        .store
        .find_user_by_reset_token(&hash_reset_token(payload.token.trim()))
        .await?
        .ok_or_else(invalid)?;

    let expired = user
        .reset_token_expires
        .map_or(true, |expires| expires <= Utc::now());
    if expired {
        return Err(invalid());
    }

    user.password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    user.reset_token_hash = None;
    user.reset_token_expires = None;
    state.store.update_user(&user).await?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(message("Password has been reset"))
}
