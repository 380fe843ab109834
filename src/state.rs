use std::{sync::Arc, time::Instant};

use crate::{
    auth::{
        cookies::SessionCookies,
        guard::RoleGuard,
        password::decoy_hash,
        policy::{Action, RoleSet},
        rate_limit::RateLimiter,
        tokens::TokenService,
    },
    config::AppConfig,
    store::Store,
};

/// Shared handles passed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub cookies: SessionCookies,
    pub limiter: Arc<RateLimiter>,
    /// Same cost as real hashes; see [`decoy_hash`].
    pub decoy_hash: Arc<str>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let tokens = TokenService::from_config(&config);
        let cookies = SessionCookies::new(
            config.secure_cookies(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        );
        let limiter = RateLimiter::new(config.auth_rate_limit);
        let decoy_hash: Arc<str> = decoy_hash(config.bcrypt_cost).into();

        Self {
            config: Arc::new(config),
            store,
            tokens: Arc::new(tokens),
            cookies,
            limiter: Arc::new(limiter),
            decoy_hash,
            started_at: Instant::now(),
        }
    }

    /// Guard requiring the roles configured for `action`.
    pub fn guard(&self, action: Action) -> RoleGuard {
        RoleGuard::new(self.tokens.clone(), self.config.policy.roles(action))
    }

    /// Guard accepting any authenticated user.
    pub fn signed_in(&self) -> RoleGuard {
        RoleGuard::new(self.tokens.clone(), RoleSet::any())
    }

    pub fn allows(&self, action: Action, role: crate::db::models::Role) -> bool {
        self.config.policy.allows(action, role)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        db::models::{NewUser, Role, User},
        store::MemoryStore,
    };

    pub fn test_state() -> AppState {
        AppState::new(crate::config::test_config(), Arc::new(MemoryStore::new()))
    }

    /// Inserts an active user whose password is `longenough1`.
    pub async fn seed_user(state: &AppState, email: &str, role: Role) -> User {
        let password_hash = bcrypt::hash("longenough1", 4).unwrap();
        state
            .store
            .insert_user(NewUser {
                name: email.split('@').next().unwrap_or("user").to_string(),
                email: email.to_string(),
                password_hash,
                role,
                is_active: true,
            })
            .await
            .unwrap()
    }

    /// `Cookie` header value carrying a valid access token for `user`.
    pub fn access_cookie_for(state: &AppState, user: &User) -> String {
        let token = state.tokens.sign_access_token(user).unwrap().token;
        format!("accessToken={token}")
    }

    pub fn refresh_cookie_for(state: &AppState, user: &User) -> String {
        let token = state.tokens.sign_refresh_token(user).unwrap();
        format!("refreshToken={token}")
    }
}
