//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ArticleQuery, CommentQuery, Page, Store, StoreError, StoreResult, UserQuery};
use crate::db::{
    self,
    models::{
        Article, ArticleRow, Category, Comment, CommentRow, NewArticle, NewCategory, NewComment,
        NewUser, NotificationPreferences, Role, Setting, SettingGroup, SettingRow, User,
        UserProfile, UserRow,
    },
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, profile, \
     notifications, last_login, reset_token_hash, reset_token_expires, created_at, updated_at";

const ARTICLE_COLUMNS: &str = "id, title, slug, excerpt, content, cover_image, author_id, \
     category_id, tags, status, scheduled_publish_at, published_at, views, likes, seo, \
     created_at, updated_at";

const COMMENT_COLUMNS: &str =
    "id, article_id, author_id, content, status, likes, created_at, updated_at";

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM articles a
             WHERE a.category_id = c.id AND a.status = 'published') AS article_count
    FROM categories c
"#;

/// Maps constraint violations onto store errors; everything else is a
/// database failure.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_email_key") => "email",
                Some("categories_name_key") => "name",
                Some("categories_slug_key") | Some("articles_slug_key") => "slug",
                _ => "value",
            };
            return StoreError::Conflict { field };
        }
        if db_err.is_foreign_key_violation() {
            return match db_err.constraint() {
                Some(name) if name.starts_with("comments_article_id") => StoreError::NotFound,
                _ => StoreError::InvalidParent,
            };
        }
    }
    StoreError::Database(err)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn user_by(&self, clause: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    /// Locks the active admin rows plus the target row and reports whether
    /// removing the target's admin standing would leave no active admin.
    async fn would_orphan_admins(conn: &mut PgConnection, id: Uuid) -> StoreResult<bool> {
        let admins: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM users WHERE role = 'admin' AND is_active FOR UPDATE",
        )
        .fetch_all(&mut *conn)
        .await?;

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let user: User = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound)?
            .try_into()?;

        let others = admins.iter().filter(|(admin,)| *admin != id).count();
        Ok(user.is_active_admin() && others == 0)
    }

    async fn category_creates_cycle(&self, id: Uuid, parent: Uuid) -> StoreResult<bool> {
        let (cycle,): (bool,) = sqlx::query_as(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT id, parent_id FROM categories WHERE id = $1
                UNION
                SELECT c.id, c.parent_id
                FROM categories c
                JOIN ancestors a ON c.id = a.parent_id
            )
            SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $2)
            "#,
        )
        .bind(parent)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(cycle)
    }
}

fn push_article_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ArticleQuery) {
    builder.push(" WHERE TRUE");
    if !query.categories.is_empty() {
        builder
            .push(" AND category_id = ANY(")
            .push_bind(query.categories.clone())
            .push(")");
    }
    if let Some(author) = query.author {
        builder.push(" AND author_id = ").push_bind(author);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(tag) = &query.tag {
        builder.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR excerpt ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_comment_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CommentQuery) {
    builder.push(" WHERE TRUE");
    if let Some(article) = query.article {
        builder.push(" AND article_id = ").push_bind(article);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    builder.push(" WHERE TRUE");
    if let Some(role) = query.role {
        builder.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, offset: i64, limit: i64) {
    if limit > 0 {
        builder.push(" LIMIT ").push_bind(limit);
    }
    builder.push(" OFFSET ").push_bind(offset.max(0));
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        db::health_check(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, is_active, profile,
                               notifications, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(Json(UserProfile::default()))
            .bind(Json(NotificationPreferences::default()))
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(row.try_into()?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.user_by("LOWER(email) = LOWER($1)", email).await
    }

    async fn find_user_by_reset_token(&self, token_hash: &str) -> StoreResult<Option<User>> {
        self.user_by("reset_token_hash = $1", token_hash).await
    }

    async fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filters(&mut select, query);
        select.push(" ORDER BY created_at DESC");
        push_page(&mut select, query.offset, query.limit);
        let rows: Vec<UserRow> = select.build_query_as().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, total })
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, profile = $5, notifications = $6,
                reset_token_hash = $7, reset_token_expires = $8, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(Json(&user.profile))
            .bind(Json(&user.notifications))
            .bind(&user.reset_token_hash)
            .bind(user.reset_token_expires)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound)?;
        Ok(row.try_into()?)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_active_admins(&self) -> StoreResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin' AND is_active")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn change_role(&self, id: Uuid, role: Role) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let sole_admin = Self::would_orphan_admins(&mut tx, id).await?;
        if sole_admin && role != Role::Admin {
            return Err(StoreError::LastAdmin);
        }

        let sql = format!(
            "UPDATE users SET role = $1, updated_at = now() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.as_str())
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.try_into()?)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let sole_admin = Self::would_orphan_admins(&mut tx, id).await?;
        if sole_admin && !active {
            return Err(StoreError::LastAdmin);
        }

        let sql = format!(
            "UPDATE users SET is_active = $1, updated_at = now() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(active)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.try_into()?)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let sole_admin = Self::would_orphan_admins(&mut tx, id).await?;
        if sole_admin {
            return Err(StoreError::LastAdmin);
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, slug, description, parent_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            "#,
        )
        .bind(id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.find_category(id).await?.ok_or(StoreError::NotFound)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let sql = format!("{CATEGORY_SELECT} ORDER BY c.created_at, c.name");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let sql = format!("{CATEGORY_SELECT} WHERE c.id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_category_by_slug(&self, slug: &str) -> StoreResult<Option<Category>> {
        let sql = format!("{CATEGORY_SELECT} WHERE c.slug = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_category(&self, category: &Category) -> StoreResult<Category> {
        if let Some(parent) = category.parent {
            if self.category_creates_cycle(category.id, parent).await? {
                return Err(StoreError::InvalidParent);
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, slug = $3, description = $4, parent_id = $5, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.find_category(category.id)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let (has_children,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM categories WHERE parent_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_children {
            return Err(StoreError::HasChildren);
        }

        sqlx::query("UPDATE articles SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article> {
        let article = article.into_article(Uuid::new_v4(), Utc::now());
        let sql = format!(
            r#"
            INSERT INTO articles (id, title, slug, excerpt, content, cover_image, author_id,
                                  category_id, tags, status, scheduled_publish_at, published_at,
                                  views, likes, seo, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, 0, $13, $14, $14)
            RETURNING {ARTICLE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(article.id)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.excerpt)
            .bind(&article.content)
            .bind(&article.cover_image)
            .bind(article.author)
            .bind(article.category)
            .bind(&article.tags)
            .bind(article.status.as_str())
            .bind(article.scheduled_publish_at)
            .bind(article.published_at)
            .bind(Json(&article.seo))
            .bind(article.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(row.try_into()?)
    }

    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::try_from).transpose()?)
    }

    async fn find_article_by_slug(&self, slug: &str) -> StoreResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE slug = $1");
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::try_from).transpose()?)
    }

    async fn list_articles(&self, query: &ArticleQuery) -> StoreResult<Page<Article>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles");
        push_article_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles"));
        push_article_filters(&mut select, query);
        select.push(" ORDER BY published_at DESC NULLS LAST, created_at DESC");
        push_page(&mut select, query.offset, query.limit);
        let rows: Vec<ArticleRow> = select.build_query_as().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(Article::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, total })
    }

    async fn update_article(&self, article: &Article) -> StoreResult<Article> {
        // published_at is write-once: an existing stamp always wins.
        let sql = format!(
            r#"
            UPDATE articles
            SET title = $2, slug = $3, excerpt = $4, content = $5, cover_image = $6,
                category_id = $7, tags = $8, status = $9, scheduled_publish_at = $10,
                published_at = COALESCE(published_at, $11), seo = $12, updated_at = now()
            WHERE id = $1
            RETURNING {ARTICLE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(article.id)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.excerpt)
            .bind(&article.content)
            .bind(&article.cover_image)
            .bind(article.category)
            .bind(&article.tags)
            .bind(article.status.as_str())
            .bind(article.scheduled_publish_at)
            .bind(article.published_at)
            .bind(Json(&article.seo))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound)?;
        Ok(row.try_into()?)
    }

    async fn delete_article(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn increment_article_views(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE articles SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_article_likes(&self, id: Uuid) -> StoreResult<i64> {
        let likes: Option<(i64,)> =
            sqlx::query_as("UPDATE articles SET likes = likes + 1 WHERE id = $1 RETURNING likes")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        likes.map(|(n,)| n).ok_or(StoreError::NotFound)
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let sql = format!(
            r#"
            INSERT INTO comments (id, article_id, author_id, content, status, likes,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, now(), now())
            RETURNING {COMMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(comment.article)
            .bind(comment.author)
            .bind(&comment.content)
            .bind(comment.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(row.try_into()?)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::try_from).transpose()?)
    }

    async fn list_comments(&self, query: &CommentQuery) -> StoreResult<Page<Comment>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM comments");
        push_comment_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {COMMENT_COLUMNS} FROM comments"));
        push_comment_filters(&mut select, query);
        select.push(" ORDER BY created_at DESC");
        push_page(&mut select, query.offset, query.limit);
        let rows: Vec<CommentRow> = select.build_query_as().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, total })
    }

    async fn update_comment(&self, comment: &Comment) -> StoreResult<Comment> {
        let sql = format!(
            r#"
            UPDATE comments SET content = $2, status = $3, updated_at = now()
            WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(comment.id)
            .bind(&comment.content)
            .bind(comment.status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(row.try_into()?)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_settings(&self, group: Option<SettingGroup>) -> StoreResult<Vec<Setting>> {
        let rows: Vec<SettingRow> = match group {
            Some(group) => {
                sqlx::query_as(
                    "SELECT key, value, group_name, updated_at FROM settings \
                     WHERE group_name = $1 ORDER BY key",
                )
                .bind(group.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT key, value, group_name, updated_at FROM settings ORDER BY key",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows
            .into_iter()
            .map(Setting::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value: serde_json::Value,
        group: SettingGroup,
    ) -> StoreResult<Setting> {
        let row: SettingRow = sqlx::query_as(
            r#"
            INSERT INTO settings (key, value, group_name, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                group_name = EXCLUDED.group_name,
                updated_at = now()
            RETURNING key, value, group_name, updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(group.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_into()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_filters_render_expected_sql() {
        let query = ArticleQuery {
            categories: vec![Uuid::new_v4()],
            status: Some(crate::db::models::ArticleStatus::Published),
            tag: Some("election".to_string()),
            search: Some("100%".to_string()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles");
        push_article_filters(&mut builder, &query);
        let sql = builder.sql();
        assert!(sql.contains("category_id = ANY($1)"));
        assert!(sql.contains("status = $2"));
        assert!(sql.contains("$3 = ANY(tags)"));
        assert!(sql.contains("title ILIKE $4 OR excerpt ILIKE $5"));
    }

    #[test]
    fn test_page_clause_omits_limit_when_unbounded() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
        push_page(&mut builder, 0, 0);
        assert_eq!(builder.sql(), "SELECT 1 OFFSET $1");
    }
}
