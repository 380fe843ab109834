/**
 * Category Routes
 * Flat and grouped listings, slug lookup, role-gated management
 */
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{created, message, nullable, ok, parse_id, required_text};
use crate::{
    auth::Authenticated,
    db::models::NewCategory,
    error::{ApiError, ApiResult},
    slug::{is_valid_slug, slugify},
    state::AppState,
    store::StoreError,
    taxonomy::group_categories,
};

const MAX_NAME_LEN: usize = 80;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent: Option<Option<Uuid>>,
}

fn category_slug(requested: Option<&str>, name: &str) -> Result<String, ApiError> {
    let slug = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_lowercase(),
        None => slugify(name),
    };
    if !is_valid_slug(&slug) {
        return Err(ApiError::validation("Invalid slug"));
    }
    Ok(slug)
}

fn clean_description(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /api/categories
/// Stored order, each with its published-article count.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.store.list_categories().await?))
}

/// GET /api/categories/tree
pub async fn category_tree(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let categories = state.store.list_categories().await?;
    Ok(ok(group_categories(&categories)))
}

/// GET /api/categories/slug/{slug}
pub async fn get_category_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let category = state
        .store
        .find_category_by_slug(&slug.to_lowercase())
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    Ok(ok(category))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required_text(&payload.name, "Name", MAX_NAME_LEN)?;
    let slug = category_slug(payload.slug.as_deref(), &name)?;

    let category = state
        .store
        .insert_category(NewCategory {
            name,
            slug,
            description: clean_description(payload.description),
            parent: payload.parent,
        })
        .await?;

    tracing::info!(category_id = %category.id, by = %ctx.user_id, "Category created");
    Ok(created(category))
}

/// PATCH /api/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "category")?;
    let mut category = state
        .store
        .find_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;

    if let Some(name) = payload.name {
        category.name = required_text(&name, "Name", MAX_NAME_LEN)?;
    }
    if let Some(slug) = payload.slug {
        category.slug = category_slug(Some(&slug), &category.name)?;
    }
    if let Some(description) = payload.description {
        category.description = clean_description(description);
    }
    if let Some(parent) = payload.parent {
        if parent == Some(category.id) {
            return Err(ApiError::validation("Invalid parent category"));
        }
        category.parent = parent;
    }

    let category = state.store.update_category(&category).await?;
    tracing::info!(category_id = %category.id, by = %ctx.user_id, "Category updated");
    Ok(ok(category))
}

/// DELETE /api/categories/{id}
/// Refused while subcategories exist; articles in it become uncategorized.
pub async fn delete_category(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "category")?;
    match state.store.delete_category(id).await {
        Ok(()) => {}
        Err(StoreError::NotFound) => return Err(ApiError::not_found("Category")),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(category_id = %id, by = %ctx.user_id, "Category deleted");
    Ok(message("Category deleted"))
}
