/**
 * Comment Routes
 * Public reading of approved comments, authoring and moderation
 */
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use super::{created, message, ok, parse_id, PageParams, Paginated};
use crate::{
    auth::{Action, Authenticated, RequestContext},
    db::models::{CommentStatus, NewComment},
    error::{ApiError, ApiResult},
    slug::sanitize_html,
    state::AppState,
    store::{CommentQuery, StoreError},
};

const MAX_COMMENT_LEN: usize = 5000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub article_id: Option<String>,
    /// Honoured for moderators only.
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCommentRequest {
    pub article_id: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentStatusRequest {
    pub status: String,
}

fn clean_content(raw: &str) -> Result<String, ApiError> {
    let content = sanitize_html(raw.trim());
    if content.trim().is_empty() {
        return Err(ApiError::validation("Comment content is required"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::validation(format!(
            "Comment must be at most {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content)
}

fn parse_status(raw: &str) -> Result<CommentStatus, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation("Status must be pending, approved or rejected"))
}

/// GET /api/comments
pub async fn list_comments(
    State(state): State<AppState>,
    caller: Option<Extension<RequestContext>>,
    Query(query): Query<CommentListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let moderator = caller
        .as_ref()
        .is_some_and(|Extension(c)| state.allows(Action::CommentModerate, c.role));

    let status = match query.status.as_deref().map(str::trim) {
        _ if !moderator => Some(CommentStatus::Approved),
        None | Some("") | Some("all") => None,
        Some(raw) => Some(parse_status(raw)?),
    };
    let article = match query.article_id.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(raw) => Some(parse_id(raw, "article")?),
        None => None,
    };

    let result = state
        .store
        .list_comments(&CommentQuery {
            article,
            status,
            offset: page.offset(),
            limit: page.limit(),
        })
        .await?;

    Ok(ok(Paginated::new(result.items, result.total, &page)))
}

/// POST /api/comments
/// Moderators' comments are approved immediately; others wait in `pending`.
pub async fn create_comment(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let article_id = parse_id(&payload.article_id, "article")?;
    let content = clean_content(&payload.content)?;

    let article = state
        .store
        .find_article(article_id)
        .await?
        .filter(|a| a.is_published() || ctx.is_elevated())
        .ok_or_else(|| ApiError::not_found("Article"))?;

    let status = if ctx.is_elevated() || state.allows(Action::CommentModerate, ctx.role) {
        CommentStatus::Approved
    } else {
        CommentStatus::Pending
    };

    let comment = state
        .store
        .insert_comment(NewComment {
            article: article.id,
            author: ctx.user_id,
            content,
            status,
        })
        .await?;

    tracing::info!(comment_id = %comment.id, article_id = %article.id, status = status.as_str(), "Comment created");
    Ok(created(comment))
}

/// PATCH /api/comments/{id}
/// The author or a moderator may edit.
pub async fn update_comment(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "comment")?;
    let mut comment = state
        .store
        .find_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    let moderator = state.allows(Action::CommentModerate, ctx.role);
    if comment.author != ctx.user_id && !moderator {
        return Err(ApiError::forbidden());
    }

    comment.content = clean_content(&payload.content)?;
    // An author's edit goes back through moderation.
    if !moderator && comment.status == CommentStatus::Approved {
        comment.status = CommentStatus::Pending;
    }

    Ok(ok(state.store.update_comment(&comment).await?))
}

/// PATCH /api/comments/{id}/status
pub async fn moderate_comment(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<CommentStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "comment")?;
    let status = parse_status(&payload.status)?;
    let mut comment = state
        .store
        .find_comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    comment.status = status;
    let comment = state.store.update_comment(&comment).await?;
    tracing::info!(comment_id = %comment.id, status = status.as_str(), by = %ctx.user_id, "Comment moderated");
    Ok(ok(comment))
}

/// DELETE /api/comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "comment")?;
    match state.store.delete_comment(id).await {
        Ok(()) => {}
        Err(StoreError::NotFound) => return Err(ApiError::not_found("Comment")),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(comment_id = %id, by = %ctx.user_id, "Comment deleted");
    Ok(message("Comment deleted"))
}
