/**
 * Routes Module
 * API route handlers and the response envelope they share
 */
pub mod articles;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod health;
pub mod profile;
pub mod settings;
pub mod users;


use axum::{http::StatusCode, middleware, routing::MethodRouter, Json};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    auth::guard::{require_roles, RoleGuard},
    error::ApiError,
    state::AppState,
};

/// `{success: true, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: text.into(),
    })
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        let limit = self.limit();
        (total + limit - 1) / limit
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        Self {
            items,
            total,
            page: params.page(),
            total_pages: params.total_pages(total),
        }
    }
}

/// Applies a role guard to a single route.
pub fn gated(route: MethodRouter<AppState>, guard: RoleGuard) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(guard, require_roles))
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::validation(format!("Invalid {what} id")))
}

/// Trims and lowercases; rejects values that cannot be an address.
pub(crate) fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::validation("Invalid email format"));
    }
    Ok(email)
}

pub(crate) fn required_text(value: &str, field: &str, max_len: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max_len {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod helper_tests {
    use super::*;

    #[test]
    fn test_page_params_clamp() {
        let params = PageParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            page: Some(3),
            limit: None,
        };
        assert_eq!(params.offset(), 20);
        assert_eq!(params.total_pages(21), 3);
        assert_eq!(params.total_pages(0), 0);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@X.com ").unwrap(), "a@x.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@localhost").is_err());
        assert!(normalize_email("a b@x.com").is_err());
        assert!(normalize_email("").is_err());
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "nullable")]
            parent: Option<Option<Uuid>>,
        }
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent, None);
        let cleared: Patch = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        assert_eq!(cleared.parent, Some(None));
    }
}
