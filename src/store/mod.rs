//! Persistence port used by the route handlers.
//!
//! Handlers receive an `Arc<dyn Store>` through `AppState`; the Postgres and
//! in-memory backends implement the same contract, including the atomic
//! last-admin checks on user mutations.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{
    Article, ArticleStatus, Category, Comment, CommentStatus, NewArticle, NewCategory,
    NewComment, NewUser, Role, Setting, SettingGroup, UnknownVariant, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate value for unique field `{field}`")]
    Conflict { field: &'static str },

    #[error("record not found")]
    NotFound,

    #[error("operation would leave no active admin")]
    LastAdmin,

    #[error("category has child categories")]
    HasChildren,

    #[error("parent category is missing or would create a cycle")]
    InvalidParent,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<UnknownVariant> for StoreError {
    fn from(err: UnknownVariant) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Matches articles in any of these categories; empty means no filter.
    pub categories: Vec<Uuid>,
    pub author: Option<Uuid>,
    pub status: Option<ArticleStatus>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CommentQuery {
    pub article: Option<Uuid>,
    pub status: Option<CommentStatus>,
    pub offset: i64,
    pub limit: i64,
}

/// A page of records plus the total number of matches.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip used by the health endpoints.
    async fn ping(&self) -> StoreResult<()>;
    fn backend(&self) -> &'static str;

    // Users
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_reset_token(&self, token_hash: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>>;
    /// Persists profile-level fields (name, email, profile, notifications,
    /// password hash, reset token). Role and activation go through the
    /// guarded operations below.
    async fn update_user(&self, user: &User) -> StoreResult<User>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    async fn count_active_admins(&self) -> StoreResult<i64>;
    async fn change_role(&self, id: Uuid, role: Role) -> StoreResult<User>;
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    // Categories
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category>;
    /// All categories in stored order, with published article counts.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn find_category_by_slug(&self, slug: &str) -> StoreResult<Option<Category>>;
    async fn update_category(&self, category: &Category) -> StoreResult<Category>;
    /// Refuses while children exist; detaches referencing articles.
    async fn delete_category(&self, id: Uuid) -> StoreResult<()>;

    // Articles
    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article>;
    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>>;
    async fn find_article_by_slug(&self, slug: &str) -> StoreResult<Option<Article>>;
    async fn list_articles(&self, query: &ArticleQuery) -> StoreResult<Page<Article>>;
    async fn update_article(&self, article: &Article) -> StoreResult<Article>;
    async fn delete_article(&self, id: Uuid) -> StoreResult<()>;
    async fn increment_article_views(&self, id: Uuid) -> StoreResult<()>;
    async fn increment_article_likes(&self, id: Uuid) -> StoreResult<i64>;

    // Comments
    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    async fn list_comments(&self, query: &CommentQuery) -> StoreResult<Page<Comment>>;
    async fn update_comment(&self, comment: &Comment) -> StoreResult<Comment>;
    async fn delete_comment(&self, id: Uuid) -> StoreResult<()>;

    // Settings
    async fn list_settings(&self, group: Option<SettingGroup>) -> StoreResult<Vec<Setting>>;
    async fn upsert_setting(
        &self,
        key: &str,
        value: serde_json::Value,
        group: SettingGroup,
    ) -> StoreResult<Setting>;
}
