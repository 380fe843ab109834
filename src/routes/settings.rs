/**
 * Settings Routes
 * Grouped key/value site configuration, admin only
 */
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::ok;
use crate::{
    auth::Authenticated,
    db::models::SettingGroup,
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_KEY_LEN: usize = 100;
const MAX_BATCH: usize = 100;

lazy_static! {
    static ref SETTING_KEY_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap();
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    pub group: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingInput {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
    pub group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSettingsRequest {
    pub settings: Vec<SettingInput>,
}

fn parse_group(raw: &str) -> Result<SettingGroup, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("Unknown settings group: {}", raw.trim())))
}

fn validate_key(key: &str) -> Result<&str, ApiError> {
    let key = key.trim();
    if key.is_empty() || key.len() > MAX_KEY_LEN || !SETTING_KEY_REGEX.is_match(key) {
        return Err(ApiError::validation(format!("Invalid setting key: {key}")));
    }
    Ok(key)
}

/// GET /api/admin/settings?group=
pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> ApiResult<impl IntoResponse> {
    let group = match query.group.as_deref().filter(|g| !g.trim().is_empty()) {
        Some(raw) => Some(parse_group(raw)?),
        None => None,
    };
    Ok(ok(state.store.list_settings(group).await?))
}

/// PUT /api/admin/settings
/// Whole batch is validated before anything is written.
pub async fn update_settings(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.settings.is_empty() {
        return Err(ApiError::validation("No settings provided"));
    }
    if payload.settings.len() > MAX_BATCH {
        return Err(ApiError::validation(format!(
            "At most {MAX_BATCH} settings per request"
        )));
    }

    let mut batch = Vec::with_capacity(payload.settings.len());
    for input in &payload.settings {
        let key = validate_key(&input.key)?;
        let group = match input.group.as_deref() {
            Some(raw) => parse_group(raw)?,
            None => SettingGroup::General,
        };
        batch.push((key, input.value.clone(), group));
    }

    let mut saved = Vec::with_capacity(batch.len());
    for (key, value, group) in batch {
        saved.push(state.store.upsert_setting(key, value, group).await?);
    }

    tracing::info!(count = saved.len(), by = %ctx.user_id, "Settings updated");
    Ok(ok(saved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert_eq!(validate_key(" site.name ").unwrap(), "site.name");
        assert!(validate_key("seo_default-title").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key("semi;colon").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_parse_group() {
        assert_eq!(parse_group("SEO").unwrap(), SettingGroup::Seo);
        assert!(parse_group("billing").is_err());
    }
}
