//! In-process store used when no `DATABASE_URL` is configured, and by tests.
//! Every mutation runs under one write lock, so multi-step checks are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ArticleQuery, CommentQuery, Page, Store, StoreError, StoreResult, UserQuery};
use crate::db::models::{
    Article, Category, Comment, NewArticle, NewCategory, NewComment, NewUser,
    NotificationPreferences, Role, Setting, SettingGroup, User, UserProfile,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    articles: Vec<Article>,
    comments: Vec<Comment>,
    settings: Vec<Setting>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn other_active_admins(&self, id: Uuid) -> usize {
        self.users
            .iter()
            .filter(|u| u.id != id && u.is_active_admin())
            .count()
    }

    fn user_mut(&mut self, id: Uuid) -> StoreResult<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn category_conflict(
        &self,
        name: &str,
        slug: &str,
        except: Option<Uuid>,
    ) -> Option<&'static str> {
        let others = self.categories.iter().filter(|c| Some(c.id) != except);
        for c in others {
            if c.name == name {
                return Some("name");
            }
            if c.slug == slug {
                return Some("slug");
            }
        }
        None
    }

    /// True when `parent` exists and is not `id` or one of its descendants.
    fn valid_parent(&self, id: Option<Uuid>, parent: Uuid) -> bool {
        let mut cursor = Some(parent);
        let mut hops = 0;
        while let Some(current) = cursor {
            if Some(current) == id || hops > self.categories.len() {
                return false;
            }
            match self.categories.iter().find(|c| c.id == current) {
                Some(c) => cursor = c.parent,
                None => return current != parent,
            }
            hops += 1;
        }
        true
    }

    fn published_count(&self, category: Uuid) -> i64 {
        self.articles
            .iter()
            .filter(|a| a.category == Some(category) && a.is_published())
            .count() as i64
    }

    fn with_count(&self, category: &Category) -> Category {
        Category {
            article_count: self.published_count(category.id),
            ..category.clone()
        }
    }
}

fn paginate<T: Clone>(items: Vec<&T>, offset: i64, limit: i64) -> Page<T> {
    let total = items.len() as i64;
    let offset = offset.max(0) as usize;
    let limit = if limit <= 0 { usize::MAX } else { limit as usize };
    Page {
        items: items.into_iter().skip(offset).take(limit).cloned().collect(),
        total,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        let _tables = self.tables.read().await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::Conflict { field: "email" });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: user.is_active,
            profile: UserProfile::default(),
            notifications: NotificationPreferences::default(),
            last_login: None,
            reset_token_hash: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_reset_token(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list_users(&self, query: &UserQuery) -> StoreResult<Page<User>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&User> = tables
            .users
            .iter()
            .filter(|u| query.role.map_or(true, |r| u.role == r))
            .filter(|u| {
                query.search.as_deref().map_or(true, |s| {
                    contains_ci(&u.name, s) || contains_ci(&u.email, s)
                })
            })
            .collect();
        matches.reverse();
        matches.sort_by_key(|u| Reverse(u.created_at));
        Ok(paginate(matches, query.offset, query.limit))
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict { field: "email" });
        }

        let stored = tables.user_mut(user.id)?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.profile = user.profile.clone();
        stored.notifications = user.notifications.clone();
        stored.reset_token_hash = user.reset_token_hash.clone();
        stored.reset_token_expires = user.reset_token_expires;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.user_mut(id)?.last_login = Some(at);
        Ok(())
    }

    async fn count_active_admins(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|u| u.is_active_admin()).count() as i64)
    }

    async fn change_role(&self, id: Uuid, role: Role) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let others = tables.other_active_admins(id);
        let user = tables.user_mut(id)?;
        if user.is_active_admin() && role != Role::Admin && others == 0 {
            return Err(StoreError::LastAdmin);
        }
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let others = tables.other_active_admins(id);
        let user = tables.user_mut(id)?;
        if user.is_active_admin() && !active && others == 0 {
            return Err(StoreError::LastAdmin);
        }
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let others = tables.other_active_admins(id);
        let user = tables.user_mut(id)?;
        if user.is_active_admin() && others == 0 {
            return Err(StoreError::LastAdmin);
        }
        tables.users.retain(|u| u.id != id);
        Ok(())
    }

    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let mut tables = self.tables.write().await;
        if let Some(field) = tables.category_conflict(&category.name, &category.slug, None) {
            return Err(StoreError::Conflict { field });
        }
        if let Some(parent) = category.parent {
            if !tables.valid_parent(None, parent) {
                return Err(StoreError::InvalidParent);
            }
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: category.name,
            slug: category.slug,
            description: category.description,
            parent: category.parent,
            article_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .map(|c| tables.with_count(c))
            .collect())
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.with_count(c)))
    }

    async fn find_category_by_slug(&self, slug: &str) -> StoreResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| tables.with_count(c)))
    }

    async fn update_category(&self, category: &Category) -> StoreResult<Category> {
        let mut tables = self.tables.write().await;
        if !tables.categories.iter().any(|c| c.id == category.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) =
            tables.category_conflict(&category.name, &category.slug, Some(category.id))
        {
            return Err(StoreError::Conflict { field });
        }
        if let Some(parent) = category.parent {
            if !tables.valid_parent(Some(category.id), parent) {
                return Err(StoreError::InvalidParent);
            }
        }

        let stored = tables
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or(StoreError::NotFound)?;
        stored.name = category.name.clone();
        stored.slug = category.slug.clone();
        stored.description = category.description.clone();
        stored.parent = category.parent;
        stored.updated_at = Utc::now();
        let updated = stored.clone();
        Ok(tables.with_count(&updated))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.categories.iter().any(|c| c.id == id) {
            return Err(StoreError::NotFound);
        }
        if tables.categories.iter().any(|c| c.parent == Some(id)) {
            return Err(StoreError::HasChildren);
        }
        tables.categories.retain(|c| c.id != id);
        for article in tables.articles.iter_mut().filter(|a| a.category == Some(id)) {
            article.category = None;
        }
        Ok(())
    }

    async fn insert_article(&self, article: NewArticle) -> StoreResult<Article> {
        let mut tables = self.tables.write().await;
        if tables.articles.iter().any(|a| a.slug == article.slug) {
            return Err(StoreError::Conflict { field: "slug" });
        }
        let article = article.into_article(Uuid::new_v4(), Utc::now());
        tables.articles.push(article.clone());
        Ok(article)
    }

    async fn find_article(&self, id: Uuid) -> StoreResult<Option<Article>> {
        let tables = self.tables.read().await;
        Ok(tables.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn find_article_by_slug(&self, slug: &str) -> StoreResult<Option<Article>> {
        let tables = self.tables.read().await;
        Ok(tables.articles.iter().find(|a| a.slug == slug).cloned())
    }

    async fn list_articles(&self, query: &ArticleQuery) -> StoreResult<Page<Article>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&Article> = tables
            .articles
            .iter()
            .filter(|a| {
                query.categories.is_empty()
                    || a.category.is_some_and(|c| query.categories.contains(&c))
            })
            .filter(|a| query.author.map_or(true, |id| a.author == id))
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter(|a| {
                query
                    .tag
                    .as_deref()
                    .map_or(true, |t| a.tags.iter().any(|tag| tag.eq_ignore_ascii_case(t)))
            })
            .filter(|a| {
                query.search.as_deref().map_or(true, |s| {
                    contains_ci(&a.title, s)
                        || a.excerpt.as_deref().is_some_and(|e| contains_ci(e, s))
                })
            })
            .collect();
        matches.reverse();
        // Newest publication first; unpublished records trail, newest first.
        matches.sort_by_key(|a| {
            (
                Reverse(a.published_at.is_some()),
                Reverse(a.published_at),
                Reverse(a.created_at),
            )
        });
        Ok(paginate(matches, query.offset, query.limit))
    }

    async fn update_article(&self, article: &Article) -> StoreResult<Article> {
        let mut tables = self.tables.write().await;
        if tables
            .articles
            .iter()
            .any(|a| a.id != article.id && a.slug == article.slug)
        {
            return Err(StoreError::Conflict { field: "slug" });
        }

        let stored = tables
            .articles
            .iter_mut()
            .find(|a| a.id == article.id)
            .ok_or(StoreError::NotFound)?;
        let published_at = stored.published_at.or(article.published_at);
        *stored = Article {
            published_at,
            views: stored.views,
            likes: stored.likes,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..article.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_article(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.articles.len();
        tables.articles.retain(|a| a.id != id);
        if tables.articles.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.comments.retain(|c| c.article != id);
        Ok(())
    }

    async fn increment_article_views(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let article = tables
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        article.views += 1;
        Ok(())
    }

    async fn increment_article_likes(&self, id: Uuid) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        let article = tables
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        article.likes += 1;
        Ok(article.likes)
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.articles.iter().any(|a| a.id == comment.article) {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            article: comment.article,
            author: comment.author,
            content: comment.content,
            status: comment.status,
            likes: 0,
            created_at: now,
            updated_at: now,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, query: &CommentQuery) -> StoreResult<Page<Comment>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&Comment> = tables
            .comments
            .iter()
            .filter(|c| query.article.map_or(true, |id| c.article == id))
            .filter(|c| query.status.map_or(true, |s| c.status == s))
            .collect();
        matches.reverse();
        matches.sort_by_key(|c| Reverse(c.created_at));
        Ok(paginate(matches, query.offset, query.limit))
    }

    async fn update_comment(&self, comment: &Comment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .comments
            .iter_mut()
            .find(|c| c.id == comment.id)
            .ok_or(StoreError::NotFound)?;
        stored.content = comment.content.clone();
        stored.status = comment.status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        if tables.comments.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_settings(&self, group: Option<SettingGroup>) -> StoreResult<Vec<Setting>> {
        let tables = self.tables.read().await;
        let mut settings: Vec<Setting> = tables
            .settings
            .iter()
            .filter(|s| group.map_or(true, |g| s.group == g))
            .cloned()
            .collect();
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value: serde_json::Value,
        group: SettingGroup,
    ) -> StoreResult<Setting> {
        let mut tables = self.tables.write().await;
        let setting = Setting {
            key: key.to_string(),
            value,
            group,
            updated_at: Utc::now(),
        };
        match tables.settings.iter_mut().find(|s| s.key == key) {
            Some(existing) => *existing = setting.clone(),
            None => tables.settings.push(setting.clone()),
        }
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ArticleStatus, SeoMeta};

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role,
            is_active: true,
        }
    }

    fn new_article(slug: &str, category: Option<Uuid>, status: ArticleStatus) -> NewArticle {
        NewArticle {
            title: slug.to_string(),
            slug: slug.to_string(),
            excerpt: None,
            content: String::new(),
            cover_image: None,
            author: Uuid::new_v4(),
            category,
            tags: vec!["local".to_string()],
            status,
            scheduled_publish_at: None,
            seo: SeoMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.insert_user(new_user("a@x.com", Role::User)).await.unwrap();
        let err = store
            .insert_user(new_user("A@X.com", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email" }));
        assert_eq!(store.list_users(&UserQuery::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_demoted_deactivated_or_deleted() {
        let store = MemoryStore::new();
        let admin = store.insert_user(new_user("root@x.com", Role::Admin)).await.unwrap();

        assert!(matches!(
            store.change_role(admin.id, Role::Editor).await,
            Err(StoreError::LastAdmin)
        ));
        assert!(matches!(
            store.set_active(admin.id, false).await,
            Err(StoreError::LastAdmin)
        ));
        assert!(matches!(
            store.delete_user(admin.id).await,
            Err(StoreError::LastAdmin)
        ));
        let still_there = store.find_user(admin.id).await.unwrap().unwrap();
        assert_eq!(still_there.role, Role::Admin);
        assert!(still_there.is_active);
    }

    #[tokio::test]
    async fn test_admin_can_be_removed_when_another_exists() {
        let store = MemoryStore::new();
        let first = store.insert_user(new_user("one@x.com", Role::Admin)).await.unwrap();
        let second = store.insert_user(new_user("two@x.com", Role::Admin)).await.unwrap();

        let demoted = store.change_role(first.id, Role::Writer).await.unwrap();
        assert_eq!(demoted.role, Role::Writer);
        assert!(matches!(
            store.delete_user(second.id).await,
            Err(StoreError::LastAdmin)
        ));
    }

    #[tokio::test]
    async fn test_inactive_admin_does_not_count() {
        let store = MemoryStore::new();
        let active = store.insert_user(new_user("one@x.com", Role::Admin)).await.unwrap();
        let mut dormant = new_user("two@x.com", Role::Admin);
        dormant.is_active = false;
        store.insert_user(dormant).await.unwrap();

        assert_eq!(store.count_active_admins().await.unwrap(), 1);
        assert!(store.delete_user(active.id).await.is_err());
    }

    #[tokio::test]
    async fn test_category_delete_refuses_children_and_detaches_articles() {
        let store = MemoryStore::new();
        let parent = store
            .insert_category(NewCategory {
                name: "World".to_string(),
                slug: "world".to_string(),
                description: None,
                parent: None,
            })
            .await
            .unwrap();
        let child = store
            .insert_category(NewCategory {
                name: "Europe".to_string(),
                slug: "europe".to_string(),
                description: None,
                parent: Some(parent.id),
            })
            .await
            .unwrap();
        let article = store
            .insert_article(new_article("vote", Some(child.id), ArticleStatus::Published))
            .await
            .unwrap();

        assert!(matches!(
            store.delete_category(parent.id).await,
            Err(StoreError::HasChildren)
        ));

        store.delete_category(child.id).await.unwrap();
        let article = store.find_article(article.id).await.unwrap().unwrap();
        assert_eq!(article.category, None);
    }

    #[tokio::test]
    async fn test_category_update_rejects_cycles() {
        let store = MemoryStore::new();
        let root = store
            .insert_category(NewCategory {
                name: "Sport".to_string(),
                slug: "sport".to_string(),
                description: None,
                parent: None,
            })
            .await
            .unwrap();
        let child = store
            .insert_category(NewCategory {
                name: "Football".to_string(),
                slug: "football".to_string(),
                description: None,
                parent: Some(root.id),
            })
            .await
            .unwrap();

        let mut looped = root.clone();
        looped.parent = Some(child.id);
        assert!(matches!(
            store.update_category(&looped).await,
            Err(StoreError::InvalidParent)
        ));

        let mut missing = child.clone();
        missing.parent = Some(Uuid::new_v4());
        assert!(matches!(
            store.update_category(&missing).await,
            Err(StoreError::InvalidParent)
        ));
    }

    #[tokio::test]
    async fn test_article_counts_only_published() {
        let store = MemoryStore::new();
        let cat = store
            .insert_category(NewCategory {
                name: "Tech".to_string(),
                slug: "tech".to_string(),
                description: None,
                parent: None,
            })
            .await
            .unwrap();
        store
            .insert_article(new_article("a", Some(cat.id), ArticleStatus::Published))
            .await
            .unwrap();
        store
            .insert_article(new_article("b", Some(cat.id), ArticleStatus::Draft))
            .await
            .unwrap();

        let listed = store.list_categories().await.unwrap();
        assert_eq!(listed[0].article_count, 1);
    }

    #[tokio::test]
    async fn test_update_article_keeps_original_published_at() {
        let store = MemoryStore::new();
        let article = store
            .insert_article(new_article("keep", None, ArticleStatus::Published))
            .await
            .unwrap();
        let stamp = article.published_at;

        let mut edited = article.clone();
        edited.title = "Edited".to_string();
        edited.published_at = None;
        let saved = store.update_article(&edited).await.unwrap();
        assert_eq!(saved.published_at, stamp);
        assert_eq!(saved.title, "Edited");
    }

    #[tokio::test]
    async fn test_list_articles_filters_and_paginates() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_article(new_article(&format!("p-{i}"), None, ArticleStatus::Published))
                .await
                .unwrap();
        }
        store
            .insert_article(new_article("d", None, ArticleStatus::Draft))
            .await
            .unwrap();

        let page = store
            .list_articles(&ArticleQuery {
                status: Some(ArticleStatus::Published),
                offset: 2,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_setting_replaces_value() {
        let store = MemoryStore::new();
        store
            .upsert_setting("siteName", serde_json::json!("Daily"), SettingGroup::General)
            .await
            .unwrap();
        store
            .upsert_setting("siteName", serde_json::json!("Weekly"), SettingGroup::General)
            .await
            .unwrap();

        let settings = store.list_settings(Some(SettingGroup::General)).await.unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].value, serde_json::json!("Weekly"));
        assert!(store
            .list_settings(Some(SettingGroup::Email))
            .await
            .unwrap()
            .is_empty());
    }
}
