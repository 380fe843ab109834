/**
 * Article Routes
 * Public listing and reading, role-gated authoring
 */
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{created, message, nullable, ok, parse_id, required_text, PageParams};
use crate::{
    auth::{Authenticated, RequestContext},
    db::models::{Article, ArticleStatus, Category, NewArticle, SeoMeta, User},
    error::{ApiError, ApiResult},
    slug::{is_valid_slug, sanitize_html, slugify},
    state::AppState,
    store::{ArticleQuery, StoreError},
    taxonomy::descendants,
};

const MAX_TITLE_LEN: usize = 200;
const MAX_TAGS: usize = 20;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Category id or slug; matches descendants too.
    pub category: Option<String>,
    pub author: Option<String>,
    /// Honoured for elevated callers only; `all` disables the filter.
    pub status: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListResponse {
    pub success: bool,
    pub articles: Vec<ArticleView>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Article with its author and category resolved. A dangling reference
/// renders as `null` (uncategorized / unknown author).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub author: Option<AuthorSummary>,
    pub category: Option<CategorySummary>,
    pub tags: Vec<String>,
    pub status: ArticleStatus,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub likes: i64,
    pub seo: SeoMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArticleView {
    fn new(article: Article, author: Option<&User>, category: Option<&Category>) -> Self {
        Self {
            id: article.id,
            title: article.title,
            slug: article.slug,
            excerpt: article.excerpt,
            content: article.content,
            cover_image: article.cover_image,
            author: author.map(|u| AuthorSummary {
                id: u.id,
                name: u.name.clone(),
                avatar: u.profile.avatar.clone(),
            }),
            category: category.map(|c| CategorySummary {
                id: c.id,
                name: c.name.clone(),
                slug: c.slug.clone(),
            }),
            tags: article.tags,
            status: article.status,
            scheduled_publish_at: article.scheduled_publish_at,
            published_at: article.published_at,
            views: article.views,
            likes: article.likes,
            seo: article.seo,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateArticleRequest {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub seo: Option<SeoMeta>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub scheduled_publish_at: Option<Option<DateTime<Utc>>>,
    pub seo: Option<SeoMeta>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub likes: i64,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_status(raw: &str) -> Result<ArticleStatus, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation("Status must be draft, published or archived"))
}

fn clean_tags(tags: Vec<String>) -> Result<Vec<String>, ApiError> {
    let mut cleaned: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !cleaned.contains(&tag) {
            cleaned.push(tag);
        }
    }
    if cleaned.len() > MAX_TAGS {
        return Err(ApiError::validation(format!(
            "At most {MAX_TAGS} tags are allowed"
        )));
    }
    Ok(cleaned)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn resolve_category(state: &AppState, raw: &str) -> ApiResult<Option<Category>> {
    let raw = raw.trim();
    let found = match Uuid::parse_str(raw) {
        Ok(id) => state.store.find_category(id).await?,
        Err(_) => {
            state
                .store
                .find_category_by_slug(&raw.to_lowercase())
                .await?
        }
    };
    Ok(found)
}

async fn category_for_write(state: &AppState, raw: Option<&str>) -> ApiResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(raw) => resolve_category(state, raw)
            .await?
            .map(|c| Some(c.id))
            .ok_or_else(|| ApiError::validation("Invalid category")),
    }
}

/// A supplied slug must be valid and free; a derived one gets a numeric
/// suffix until it is free.
async fn choose_slug(
    state: &AppState,
    requested: Option<&str>,
    title: &str,
    current: Option<Uuid>,
) -> ApiResult<String> {
    let taken = |article: Option<Article>| article.is_some_and(|a| Some(a.id) != current);

    if let Some(slug) = requested.map(str::trim).filter(|s| !s.is_empty()) {
        let slug = slug.to_lowercase();
        if !is_valid_slug(&slug) {
            return Err(ApiError::validation("Invalid slug"));
        }
        if taken(state.store.find_article_by_slug(&slug).await?) {
            return Err(ApiError::Conflict("slug already exists".to_string()));
        }
        return Ok(slug);
    }

    let mut base = slugify(title);
    if base.is_empty() {
        base = format!("article-{}", &Uuid::new_v4().simple().to_string()[..8]);
    }
    let mut candidate = base.clone();
    let mut suffix = 2;
    while taken(state.store.find_article_by_slug(&candidate).await?) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

async fn view_of(state: &AppState, article: Article) -> ApiResult<ArticleView> {
    let author = state.store.find_user(article.author).await?;
    let category = match article.category {
        Some(id) => state.store.find_category(id).await?,
        None => None,
    };
    Ok(ArticleView::new(article, author.as_ref(), category.as_ref()))
}

/// Writers may only touch their own articles.
fn ensure_can_edit(ctx: &RequestContext, article: &Article) -> Result<(), ApiError> {
    if ctx.is_elevated() || article.author == ctx.user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/articles
pub async fn list_articles(
    State(state): State<AppState>,
    caller: Option<Extension<RequestContext>>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let elevated = caller.as_ref().is_some_and(|Extension(c)| c.is_elevated());

    let status = match query.status.as_deref().map(str::trim) {
        _ if !elevated => Some(ArticleStatus::Published),
        None | Some("") | Some("all") => None,
        Some(raw) => Some(parse_status(raw)?),
    };

    let all_categories = state.store.list_categories().await?;
    let mut categories = Vec::new();
    if let Some(raw) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        match resolve_category(&state, raw).await? {
            Some(category) => categories = descendants(&all_categories, category.id),
            None => {
                return Ok(Json(ArticleListResponse {
                    success: true,
                    articles: Vec::new(),
                    total: 0,
                    total_pages: 0,
                    current_page: page.page(),
                }))
            }
        }
    }

    let author = match query.author.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(raw) => Some(parse_id(raw, "author")?),
        None => None,
    };

    let result = state
        .store
        .list_articles(&ArticleQuery {
            categories,
            author,
            status,
            tag: clean_optional(query.tag).map(|t| t.to_lowercase()),
            search: clean_optional(query.search),
            offset: page.offset(),
            limit: page.limit(),
        })
        .await?;

    let mut authors: HashMap<Uuid, Option<User>> = HashMap::new();
    for article in &result.items {
        if !authors.contains_key(&article.author) {
            let user = state.store.find_user(article.author).await?;
            authors.insert(article.author, user);
        }
    }
    let by_id: HashMap<Uuid, &Category> = all_categories.iter().map(|c| (c.id, c)).collect();

    let articles = result
        .items
        .into_iter()
        .map(|article| {
            let author = authors.get(&article.author).and_then(Option::as_ref);
            let category = article.category.and_then(|id| by_id.get(&id).copied());
            ArticleView::new(article, author, category)
        })
        .collect();

    Ok(Json(ArticleListResponse {
        success: true,
        articles,
        total: result.total,
        total_pages: page.total_pages(result.total),
        current_page: page.page(),
    }))
}

/// GET /api/articles/slug/{slug}
/// Published articles only, unless the caller may edit it. Counts a view.
pub async fn get_article_by_slug(
    State(state): State<AppState>,
    caller: Option<Extension<RequestContext>>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !is_valid_slug(&slug) {
        return Err(ApiError::not_found("Article"));
    }
    let mut article = state
        .store
        .find_article_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Article"))?;

    if !article.is_published() {
        let may_preview = caller
            .as_ref()
            .is_some_and(|Extension(c)| ensure_can_edit(c, &article).is_ok());
        if !may_preview {
            return Err(ApiError::not_found("Article"));
        }
    } else {
        match state.store.increment_article_views(article.id).await {
            Ok(()) => article.views += 1,
            Err(e) => tracing::warn!(article_id = %article.id, "Failed to count view: {}", e),
        }
    }

    Ok(ok(view_of(&state, article).await?))
}

/// GET /api/articles/{id}
pub async fn get_article(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "article")?;
    let article = state
        .store
        .find_article(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article"))?;
    ensure_can_edit(&ctx, &article)?;
    Ok(ok(view_of(&state, article).await?))
}

/// POST /api/articles
pub async fn create_article(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(payload): Json<CreateArticleRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = required_text(&payload.title, "Title", MAX_TITLE_LEN)?;
    let status = match payload.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => ArticleStatus::Draft,
    };
    let tags = clean_tags(payload.tags)?;
    let category = category_for_write(&state, payload.category.as_deref()).await?;
    let slug = choose_slug(&state, payload.slug.as_deref(), &title, None).await?;

    let article = state
        .store
        .insert_article(NewArticle {
            title,
            slug,
            excerpt: clean_optional(payload.excerpt),
            content: sanitize_html(&payload.content),
            cover_image: clean_optional(payload.cover_image),
            author: ctx.user_id,
            category,
            tags,
            status,
            scheduled_publish_at: payload.scheduled_publish_at,
            seo: payload.seo.unwrap_or_default(),
        })
        .await?;

    tracing::info!(article_id = %article.id, slug = %article.slug, author = %ctx.user_id, "Article created");
    Ok(created(view_of(&state, article).await?))
}

/// PATCH|PUT /api/articles/{id}
pub async fn update_article(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<UpdateArticleRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "article")?;
    let mut article = state
        .store
        .find_article(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article"))?;
    ensure_can_edit(&ctx, &article)?;

    if let Some(title) = payload.title {
        article.title = required_text(&title, "Title", MAX_TITLE_LEN)?;
    }
    if let Some(slug) = payload.slug.as_deref().filter(|s| s.trim() != article.slug) {
        article.slug = choose_slug(&state, Some(slug), &article.title, Some(article.id)).await?;
    }
    if let Some(excerpt) = payload.excerpt {
        article.excerpt = clean_optional(excerpt);
    }
    if let Some(content) = payload.content {
        article.content = sanitize_html(&content);
    }
    if let Some(cover) = payload.cover_image {
        article.cover_image = clean_optional(cover);
    }
    if let Some(category) = payload.category {
        article.category = category_for_write(&state, category.as_deref()).await?;
    }
    if let Some(tags) = payload.tags {
        article.tags = clean_tags(tags)?;
    }
    if let Some(scheduled) = payload.scheduled_publish_at {
        article.scheduled_publish_at = scheduled;
    }
    if let Some(seo) = payload.seo {
        article.seo = seo;
    }
    if let Some(raw) = payload.status.as_deref() {
        article.set_status(parse_status(raw)?, Utc::now());
    }

    let article = state.store.update_article(&article).await?;
    tracing::info!(article_id = %article.id, status = article.status.as_str(), "Article updated");
    Ok(ok(view_of(&state, article).await?))
}

/// DELETE /api/articles/{id}
pub async fn delete_article(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "article")?;
    match state.store.delete_article(id).await {
        Ok(()) => {}
        Err(StoreError::NotFound) => return Err(ApiError::not_found("Article")),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(article_id = %id, by = %ctx.user_id, "Article deleted");
    Ok(message("Article deleted"))
}

/// POST /api/articles/{id}/like
pub async fn like_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "article")?;
    let article = state
        .store
        .find_article(id)
        .await?
        .filter(Article::is_published)
        .ok_or_else(|| ApiError::not_found("Article"))?;
    let likes = state.store.increment_article_likes(article.id).await?;
    Ok(ok(LikeResponse { likes }))
}
