//! Per-route role guard, applied with `route_layer` next to each handler.
//! It is independent of the path middleware and runs after it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use super::{
    context::{IssuedAccessToken, RequestContext},
    cookies::presented_access_token,
    policy::RoleSet,
    tokens::TokenService,
};
use crate::error::ApiError;

#[derive(Clone)]
pub struct RoleGuard {
    tokens: Arc<TokenService>,
    roles: RoleSet,
}

impl RoleGuard {
    pub fn new(tokens: Arc<TokenService>, roles: RoleSet) -> Self {
        Self { tokens, roles }
    }
}

/// 401 without a verifiable token, 403 when the role is not in a non-empty
/// set. The handler never runs in either case.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = presented_access_token(&jar, request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<IssuedAccessToken>()
                .map(|issued| issued.0.clone())
        })
        .ok_or_else(ApiError::unauthenticated)?;

    let claims = guard
        .tokens
        .verify_access(&token)
        .ok_or_else(|| ApiError::Unauthenticated("Invalid or expired token".to_string()))?;

    if !guard.roles.allows(claims.role) {
        tracing::warn!(
            user_id = %claims.sub,
            role = %claims.role,
            path = %request.uri().path(),
            "Role not permitted for route"
        );
        return Err(ApiError::forbidden());
    }

    request
        .extensions_mut()
        .insert(RequestContext::from(claims));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::context::Authenticated,
        db::models::Role,
        state::test_support::{access_cookie_for, seed_user, test_state},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(Authenticated(ctx): Authenticated) -> String {
        ctx.role.to_string()
    }

    fn guarded(tokens: Arc<TokenService>, roles: RoleSet) -> Router {
        Router::new().route(
            "/guarded",
            get(whoami).route_layer(middleware::from_fn_with_state(
                RoleGuard::new(tokens, roles),
                require_roles,
            )),
        )
    }

    async fn call(app: Router, cookie: Option<String>) -> (StatusCode, String) {
        let mut req = Request::get("/guarded");
        if let Some(cookie) = cookie {
            req = req.header("cookie", cookie);
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let state = test_state();
        let app = guarded(state.tokens.clone(), RoleSet::any());
        let (status, _) = call(app, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthenticated() {
        let state = test_state();
        let app = guarded(state.tokens.clone(), RoleSet::any());
        let (status, body) = call(app, Some("accessToken=forged".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_wrong_role_is_forbidden() {
        let state = test_state();
        let writer = seed_user(&state, "w@example.com", Role::Writer).await;
        let app = guarded(state.tokens.clone(), RoleSet::of(&[Role::Admin]));
        let (status, _) = call(app, Some(access_cookie_for(&state, &writer))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_allowed_role_reaches_handler_with_context() {
        let state = test_state();
        let editor = seed_user(&state, "e@example.com", Role::Editor).await;
        let app = guarded(state.tokens.clone(), RoleSet::of(&[Role::Admin, Role::Editor]));
        let (status, body) = call(app, Some(access_cookie_for(&state, &editor))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "editor");
    }

    #[tokio::test]
    async fn test_bearer_header_is_accepted() {
        let state = test_state();
        let user = seed_user(&state, "u@example.com", Role::User).await;
        let token = state.tokens.sign_access_token(&user).unwrap().token;
        let app = guarded(state.tokens.clone(), RoleSet::any());

        let req = Request::get("/guarded")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
