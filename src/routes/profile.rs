/**
 * Profile Routes
 * Self-service account details, preferences and password change
 */
use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use url::Url;

use super::{message, nullable, ok, required_text};
use crate::{
    auth::{
        password::{hash_password, validate_password, verify_password},
        Authenticated, RequestContext,
    },
    db::models::{NotificationPreferences, SocialLinks, User},
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_BIO_LEN: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar: Option<Option<String>>,
    pub social: Option<SocialLinks>,
    pub notifications: Option<NotificationPreferences>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn current_user(state: &AppState, ctx: &RequestContext) -> ApiResult<User> {
    state
        .store
        .find_user(ctx.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(ApiError::unauthenticated)
}

/// Empty strings clear the field; anything else must be an http(s) URL.
fn optional_url(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(value)),
        _ => Err(ApiError::validation(format!("{field} must be a valid URL"))),
    }
}

fn clean_social(social: SocialLinks) -> Result<SocialLinks, ApiError> {
    let handle = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(SocialLinks {
        website: optional_url(social.website, "Website")?,
        twitter: handle(social.twitter),
        facebook: handle(social.facebook),
        linkedin: handle(social.linkedin),
        github: handle(social.github),
    })
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(current_user(&state, &ctx).await?))
}

/// PATCH /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut user = current_user(&state, &ctx).await?;

    if let Some(name) = payload.name {
        user.name = required_text(&name, "Name", 100)?;
    }
    if let Some(bio) = payload.bio {
        let bio = bio.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
        if bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
            return Err(ApiError::validation(format!(
                "Bio must be at most {MAX_BIO_LEN} characters"
            )));
        }
        user.profile.bio = bio;
    }
    if let Some(avatar) = payload.avatar {
        user.profile.avatar = optional_url(avatar, "Avatar")?;
    }
    if let Some(social) = payload.social {
        user.profile.social = clean_social(social)?;
    }
    if let Some(notifications) = payload.notifications {
        user.notifications = notifications;
    }

    Ok(ok(state.store.update_user(&user).await?))
}

/// PATCH /api/profile/password
pub async fn change_password(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.current_password.is_empty() {
        return Err(ApiError::validation("Current password is required"));
    }
    validate_password(&payload.new_password)?;

    let mut user = current_user(&state, &ctx).await?;
    if !verify_password(payload.current_password, user.password_hash.clone()).await? {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    user.password_hash = hash_password(payload.new_password, state.config.bcrypt_cost).await?;
    state.store.update_user(&user).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(message("Password updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_url() {
        assert_eq!(optional_url(None, "Avatar").unwrap(), None);
        assert_eq!(optional_url(Some("  ".into()), "Avatar").unwrap(), None);
        assert_eq!(
            optional_url(Some("https://cdn.example.com/a.png".into()), "Avatar").unwrap(),
            Some("https://cdn.example.com/a.png".to_string())
        );
        assert!(optional_url(Some("javascript:alert(1)".into()), "Avatar").is_err());
        assert!(optional_url(Some("not a url".into()), "Avatar").is_err());
    }

    #[test]
    fn test_clean_social_trims_handles() {
        let social = clean_social(SocialLinks {
            twitter: Some("  @desk ".into()),
            github: Some("".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(social.twitter.as_deref(), Some("@desk"));
        assert_eq!(social.github, None);
    }
}
