//! Database Models - persisted records and the row shapes sqlx reads them from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::{fmt, str::FromStr};
use uuid::Uuid;

// ============================================================================
// Roles
// ============================================================================

/// Authorization scope of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Writer,
    Moderator,
    User,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Editor,
        Role::Writer,
        Role::Moderator,
        Role::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Writer => "writer",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }

    /// Admin and editor accounts may see unpublished content and act on
    /// other people's records.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "writer" => Ok(Role::Writer),
            "moderator" => Ok(Role::Moderator),
            "user" => Ok(Role::User),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub social: SocialLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub comment_replies: bool,
    pub new_articles: bool,
    pub newsletter: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            comment_replies: true,
            new_articles: false,
            newsletter: false,
        }
    }
}

/// User account. The password hash and reset token never leave the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub profile: UserProfile,
    pub notifications: NotificationPreferences,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active_admin(&self) -> bool {
        self.role == Role::Admin && self.is_active
    }
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub profile: Json<UserProfile>,
    pub notifications: Json<NotificationPreferences>,
    pub last_login: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = UnknownVariant;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            is_active: row.is_active,
            profile: row.profile.0,
            notifications: row.notifications.0,
            last_login: row.last_login,
            reset_token_hash: row.reset_token_hash,
            reset_token_expires: row.reset_token_expires,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Taxonomy node. `parent == None` marks a top-level category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[sqlx(rename = "parent_id")]
    pub parent: Option<Uuid>,
    #[sqlx(default)]
    pub article_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent: Option<Uuid>,
}

// ============================================================================
// Articles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
    Archived,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }
}

impl FromStr for ArticleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(ArticleStatus::Draft),
            "published" => Ok(ArticleStatus::Published),
            "archived" => Ok(ArticleStatus::Archived),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeoMeta {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
    pub canonical_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub author: Uuid,
    pub category: Option<Uuid>,
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

impl Article {
    /// Moves the article to `status`. The first transition into `Published`
    /// stamps `published_at`; it is never changed afterwards.
    pub fn set_status(&mut self, status: ArticleStatus, now: DateTime<Utc>) {
        if status == ArticleStatus::Published && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.status = status;
    }

    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub author: Uuid,
    pub category: Option<Uuid>,
    pub tags: Vec<String>,
    pub status: ArticleStatus,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub seo: SeoMeta,
}

impl NewArticle {
    /// Materializes the record, applying the publish stamp if it is created
    /// already published.
    pub fn into_article(self, id: Uuid, now: DateTime<Utc>) -> Article {
        let mut article = Article {
            id,
            title: self.title,
            slug: self.slug,
            excerpt: self.excerpt,
            content: self.content,
            cover_image: self.cover_image,
            author: self.author,
            category: self.category,
            tags: self.tags,
            status: ArticleStatus::Draft,
            scheduled_publish_at: self.scheduled_publish_at,
            published_at: None,
            views: 0,
            likes: 0,
            seo: self.seo,
            created_at: now,
            updated_at: now,
        };
        article.set_status(self.status, now);
        article
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ArticleRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub status: String,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub likes: i64,
    pub seo: Json<SeoMeta>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = UnknownVariant;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        Ok(Article {
            id: row.id,
            title: row.title,
            slug: row.slug,
            excerpt: row.excerpt,
            content: row.content,
            cover_image: row.cover_image,
            author: row.author_id,
            category: row.category_id,
            tags: row.tags,
            status: row.status.parse()?,
            scheduled_publish_at: row.scheduled_publish_at,
            published_at: row.published_at,
            views: row.views,
            likes: row.likes,
            seo: row.seo.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for CommentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(CommentStatus::Pending),
            "approved" => Ok(CommentStatus::Approved),
            "rejected" => Ok(CommentStatus::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub article: Uuid,
    pub author: Uuid,
    pub content: String,
    pub status: CommentStatus,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article: Uuid,
    pub author: Uuid,
    pub content: String,
    pub status: CommentStatus,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub status: String,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = UnknownVariant;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: row.id,
            article: row.article_id,
            author: row.author_id,
            content: row.content,
            status: row.status.parse()?,
            likes: row.likes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingGroup {
    General,
    Users,
    Content,
    Seo,
    Email,
    Security,
}

impl SettingGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingGroup::General => "general",
            SettingGroup::Users => "users",
            SettingGroup::Content => "content",
            SettingGroup::Seo => "seo",
            SettingGroup::Email => "email",
            SettingGroup::Security => "security",
        }
    }
}

impl FromStr for SettingGroup {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(SettingGroup::General),
            "users" => Ok(SettingGroup::Users),
            "content" => Ok(SettingGroup::Content),
            "seo" => Ok(SettingGroup::Seo),
            "email" => Ok(SettingGroup::Email),
            "security" => Ok(SettingGroup::Security),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Key/value configuration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub group: SettingGroup,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: serde_json::Value,
    pub group_name: String,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SettingRow> for Setting {
    type Error = UnknownVariant;

    fn try_from(row: SettingRow) -> Result<Self, Self::Error> {
        Ok(Setting {
            key: row.key,
            value: row.value,
            group: row.group_name.parse()?,
            updated_at: row.updated_at,
        })
    }
}
