//! Newsroom Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod slug;
pub mod state;
pub mod store;
pub mod taxonomy;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
};

use crate::{
    auth::{
        middleware::authorize, password::hash_password, rate_limit::limit_by_client, Action,
    },
    config::AppConfig,
    db::models::{NewUser, Role},
    routes::{articles, auth as auth_routes, categories, comments, gated, health, profile, settings, users},
    state::AppState,
    store::{MemoryStore, PgStore, Store},
};

/// Request bodies above this are rejected with 413.
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// CORS for the configured origins; credentials are allowed so the session
/// cookies travel with cross-origin requests.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn auth_router(state: &AppState) -> Router<AppState> {
    let limited = middleware::from_fn_with_state(state.limiter.clone(), limit_by_client);

    Router::new()
        .route("/register", post(auth_routes::register).route_layer(limited.clone()))
        .route("/login", post(auth_routes::login).route_layer(limited.clone()))
        .route(
            "/forgot-password",
            post(auth_routes::forgot_password).route_layer(limited),
        )
        .route("/reset-password", post(auth_routes::reset_password))
        .route("/logout", post(auth_routes::logout))
        .route("/refresh", post(auth_routes::refresh))
        .route("/session", get(auth_routes::session))
}

fn article_router(state: &AppState) -> Router<AppState> {
    let write = state.guard(Action::ArticleWrite);

    Router::new()
        .route(
            "/",
            get(articles::list_articles).merge(gated(post(articles::create_article), write.clone())),
        )
        .route("/slug/{slug}", get(articles::get_article_by_slug))
        .route(
            "/{id}",
            gated(
                get(articles::get_article)
                    .patch(articles::update_article)
                    .put(articles::update_article),
                write,
            )
            .merge(gated(
                delete(articles::delete_article),
                state.guard(Action::ArticleDelete),
            )),
        )
        .route("/{id}/like", gated(post(articles::like_article), state.signed_in()))
}

fn category_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(categories::list_categories).merge(gated(
                post(categories::create_category),
                state.guard(Action::CategoryWrite),
            )),
        )
        .route("/tree", get(categories::category_tree))
        .route("/slug/{slug}", get(categories::get_category_by_slug))
        .route(
            "/{id}",
            gated(
                patch(categories::update_category).put(categories::update_category),
                state.guard(Action::CategoryWrite),
            )
            .merge(gated(
                delete(categories::delete_category),
                state.guard(Action::CategoryDelete),
            )),
        )
}

fn comment_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(comments::list_comments)
                .merge(gated(post(comments::create_comment), state.signed_in())),
        )
        .route(
            "/{id}",
            gated(patch(comments::update_comment), state.signed_in()).merge(gated(
                delete(comments::delete_comment),
                state.guard(Action::CommentDelete),
            )),
        )
        .route(
            "/{id}/status",
            gated(
                patch(comments::moderate_comment),
                state.guard(Action::CommentModerate),
            ),
        )
}

fn user_router(state: &AppState) -> Router<AppState> {
    let manage = state.guard(Action::UserManage);

    Router::new()
        .route(
            "/",
            gated(get(users::list_users).post(users::create_user), manage.clone()),
        )
        .route(
            "/{id}",
            gated(
                get(users::get_user)
                    .patch(users::update_user)
                    .delete(users::delete_user),
                manage.clone(),
            ),
        )
        .route("/{id}/role", gated(patch(users::change_role), manage.clone()))
        .route("/{id}/status", gated(patch(users::change_status), manage))
}

fn profile_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            gated(
                get(profile::get_profile).patch(profile::update_profile),
                state.signed_in(),
            ),
        )
        .route(
            "/password",
            gated(patch(profile::change_password), state.signed_in()),
        )
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config);

    let api = Router::new()
        .nest("/auth", auth_router(&state))
        .nest("/articles", article_router(&state))
        .nest("/categories", category_router(&state))
        .nest("/comments", comment_router(&state))
        .nest("/users", user_router(&state))
        .nest("/profile", profile_router(&state))
        .route(
            "/admin/settings",
            gated(
                get(settings::list_settings).put(settings::update_settings),
                state.guard(Action::Settings),
            ),
        );

    let mut app = Router::new()
        .nest("/api", api)
        .route("/health", get(health::health_ping))
        .route("/health/detailed", get(health::health_detailed))
        .route("/health/ready", get(health::health_ready));

    if let Some(dir) = state.config.frontend_dir.as_ref() {
        let index = dir.join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(middleware::from_fn_with_state(state.clone(), authorize))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::trace_layer())
        .layer(logging::middleware::request_id_layer())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Seeds the configured admin when no active admin exists. An existing
/// account with that email is promoted and reactivated instead.
pub async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let Some(admin) = state.config.admin.as_ref() else {
        return Ok(());
    };
    if state.store.count_active_admins().await? > 0 {
        return Ok(());
    }

    match state.store.find_user_by_email(&admin.email).await? {
        Some(user) => {
            state.store.change_role(user.id, Role::Admin).await?;
            state.store.set_active(user.id, true).await?;
            tracing::warn!(email = %admin.email, "Existing account promoted to admin");
        }
        None => {
            let password_hash = hash_password(admin.password.clone(), state.config.bcrypt_cost)
                .await
                .context("hashing the admin password")?;
            state
                .store
                .insert_user(NewUser {
                    name: admin.name.clone(),
                    email: admin.email.clone(),
                    password_hash,
                    role: Role::Admin,
                    is_active: true,
                })
                .await?;
            tracing::info!(email = %admin.email, "Bootstrap admin created");
        }
    }
    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let Some(db_config) = config.database.as_ref() else {
        tracing::warn!("DATABASE_URL not set. Using the in-memory store; data is lost on restart.");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = db::init_pool(db_config)
        .await
        .context("connecting to the database")?;
    db::run_migrations(&pool)
        .await
        .context("running database migrations")?;
    Ok(Arc::new(PgStore::new(pool)))
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    let _log_guards = logging::init(&config).context("installing the log subscriber")?;

    let addr: SocketAddr = config.bind_addr()?;
    let store = open_store(&config).await?;
    let state = AppState::new(config, store);
    bootstrap_admin(&state).await?;

    let app = create_app(state);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::test_config, state::test_support::test_state};

    #[tokio::test]
    async fn test_bootstrap_admin_seeds_once() {
        let mut config = test_config();
        config.admin = Some(crate::config::AdminBootstrap {
            email: "chief@example.com".to_string(),
            password: "longenough1".to_string(),
            name: "Chief".to_string(),
        });
        let state = AppState::new(config, Arc::new(MemoryStore::new()));

        bootstrap_admin(&state).await.unwrap();
        bootstrap_admin(&state).await.unwrap();

        assert_eq!(state.store.count_active_admins().await.unwrap(), 1);
        let admin = state
            .store
            .find_user_by_email("chief@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_promotes_existing_account() {
        let mut config = test_config();
        config.admin = Some(crate::config::AdminBootstrap {
            email: "reader@example.com".to_string(),
            password: "longenough1".to_string(),
            name: "Reader".to_string(),
        });
        let state = AppState::new(config, Arc::new(MemoryStore::new()));
        crate::state::test_support::seed_user(&state, "reader@example.com", Role::User).await;

        bootstrap_admin(&state).await.unwrap();

        let user = state
            .store
            .find_user_by_email("reader@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_active_admin());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_without_config_is_noop() {
        let state = test_state();
        bootstrap_admin(&state).await.unwrap();
        assert_eq!(state.store.count_active_admins().await.unwrap(), 0);
    }

    #[test]
    fn test_configure_cors_skips_invalid_origins() {
        let mut config = test_config();
        config.allowed_origins = vec!["http://localhost:3000".into(), "bad\norigin".into()];
        let _cors = configure_cors(&config);
    }
}
