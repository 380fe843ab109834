/**
 * User Management Routes
 * Admin/editor account administration with last-admin protection
 */
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{created, message, normalize_email, ok, parse_id, required_text, PageParams, Paginated};
use crate::{
    auth::{
        password::{hash_password, validate_password},
        Authenticated, RequestContext,
    },
    db::models::{NewUser, Role, User, UserProfile},
    error::{ApiError, ApiResult},
    state::AppState,
    store::{StoreError, UserQuery},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusRequest {
    pub is_active: Option<bool>,
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::validation("Role must be one of admin, editor, writer, moderator, user")
    })
}

/// Only admins may grant the admin role or act on admin accounts.
fn ensure_admin_scope(
    ctx: &RequestContext,
    target: Option<&User>,
    role: Option<Role>,
) -> Result<(), ApiError> {
    let touches_admin =
        role == Some(Role::Admin) || target.is_some_and(|u| u.role == Role::Admin);
    if touches_admin && ctx.role != Role::Admin {
        return Err(ApiError::forbidden());
    }
    Ok(())
}

async fn load_user(state: &AppState, raw_id: &str) -> ApiResult<User> {
    let id = parse_id(raw_id, "user")?;
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

fn last_admin(err: StoreError, action: &str) -> ApiError {
    match err {
        StoreError::LastAdmin => ApiError::validation(format!("Cannot {action} the last admin")),
        StoreError::NotFound => ApiError::not_found("User"),
        other => other.into(),
    }
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let role = match query.role.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(raw) => Some(parse_role(raw)?),
        None => None,
    };

    let result = state
        .store
        .list_users(&UserQuery {
            role,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            offset: page.offset(),
            limit: page.limit(),
        })
        .await?;

    Ok(ok(Paginated::new(result.items, result.total, &page)))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required_text(&payload.name, "Name", 100)?;
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    let role = match payload.role.as_deref() {
        Some(raw) => parse_role(raw)?,
        None => Role::User,
    };
    ensure_admin_scope(&ctx, None, Some(role))?;

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name,
            email,
            password_hash,
            role,
            is_active: payload.is_active.unwrap_or(true),
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, by = %ctx.user_id, "User created");
    Ok(created(user))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(load_user(&state, &id).await?))
}

/// PATCH /api/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut user = load_user(&state, &id).await?;
    ensure_admin_scope(&ctx, Some(&user), None)?;

    if let Some(name) = payload.name {
        user.name = required_text(&name, "Name", 100)?;
    }
    if let Some(email) = payload.email {
        user.email = normalize_email(&email)?;
    }
    if let Some(profile) = payload.profile {
        user.profile = profile;
    }

    Ok(ok(state.store.update_user(&user).await?))
}

/// PATCH /api/users/{id}/role
pub async fn change_role(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<RoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let role = parse_role(&payload.role)?;
    let user = load_user(&state, &id).await?;
    ensure_admin_scope(&ctx, Some(&user), Some(role))?;

    let user = state
        .store
        .change_role(user.id, role)
        .await
        .map_err(|e| last_admin(e, "demote"))?;

    tracing::info!(user_id = %user.id, role = %user.role, by = %ctx.user_id, "User role changed");
    Ok(ok(user))
}

/// PATCH /api/users/{id}/status
pub async fn change_status(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let active = payload
        .is_active
        .ok_or_else(|| ApiError::validation("isActive is required"))?;
    let user = load_user(&state, &id).await?;
    ensure_admin_scope(&ctx, Some(&user), None)?;

    let user = state
        .store
        .set_active(user.id, active)
        .await
        .map_err(|e| last_admin(e, "deactivate"))?;

    tracing::info!(user_id = %user.id, active = user.is_active, by = %ctx.user_id, "User status changed");
    Ok(ok(user))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user = load_user(&state, &id).await?;
    ensure_admin_scope(&ctx, Some(&user), None)?;

    state
        .store
        .delete_user(user.id)
        .await
        .map_err(|e| last_admin(e, "delete"))?;

    tracing::info!(user_id = %user.id, by = %ctx.user_id, "User deleted");
    Ok(message("User deleted"))
}
