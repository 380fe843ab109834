//! Path-based authorization applied to the whole router.
//!
//! Every request falls into exactly one [`PathClass`]. The login page bounces
//! signed-in users, the admin area redirects instead of erroring, and API
//! calls get JSON 401s with a silent refresh attempted first.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use super::{
    context::{IssuedAccessToken, RequestContext},
    cookies::{self, presented_access_token},
    policy::Action,
};
use crate::{error::ApiError, state::AppState};

pub const LOGIN_PATH: &str = "/login";
const ADMIN_PREFIXES: [&str; 2] = ["/admin", "/api/admin"];
const AUTH_PREFIX: &str = "/api/auth";
const PUBLIC_READ_PREFIXES: [&str; 3] = ["/api/articles", "/api/categories", "/api/comments"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    LoginPage,
    Admin,
    /// `/api/auth/*`, including the refresh endpoint; never gated here.
    AuthEndpoint,
    /// Reads that proceed anonymously when no valid session is present.
    PublicRead,
    Api,
    Other,
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn classify(method: &Method, path: &str) -> PathClass {
    if path == LOGIN_PATH || path == "/login/" {
        PathClass::LoginPage
    } else if ADMIN_PREFIXES.iter().any(|p| under(path, p)) {
        PathClass::Admin
    } else if under(path, AUTH_PREFIX) {
        PathClass::AuthEndpoint
    } else if (method == Method::GET || method == Method::HEAD)
        && PUBLIC_READ_PREFIXES.iter().any(|p| under(path, p))
    {
        PathClass::PublicRead
    } else if under(path, "/api") {
        PathClass::Api
    } else {
        PathClass::Other
    }
}

fn login_redirect(request: &Request) -> Response {
    let from = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/admin");
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("from", from)
        .finish();
    Redirect::temporary(&format!("{LOGIN_PATH}?{query}")).into_response()
}

pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let class = classify(request.method(), request.uri().path());
    let claims = presented_access_token(&jar, request.headers())
        .map(|token| state.tokens.verify_access(&token));

    match class {
        PathClass::Other | PathClass::AuthEndpoint => next.run(request).await,

        PathClass::LoginPage => match claims.flatten() {
            Some(claims) if state.allows(Action::AdminArea, claims.role) => {
                Redirect::temporary("/admin").into_response()
            }
            Some(_) => Redirect::temporary("/").into_response(),
            None => next.run(request).await,
        },

        PathClass::Admin => match claims.flatten() {
            None => login_redirect(&request),
            Some(claims) if !state.allows(Action::AdminArea, claims.role) => {
                tracing::warn!(
                    user_id = %claims.sub,
                    role = %claims.role,
                    path = %request.uri().path(),
                    "Admin area denied"
                );
                Redirect::temporary("/").into_response()
            }
            Some(claims) => {
                request
                    .extensions_mut()
                    .insert(RequestContext::from(claims));
                next.run(request).await
            }
        },

        PathClass::PublicRead | PathClass::Api => {
            let public = class == PathClass::PublicRead;
            match claims {
                Some(Some(claims)) => {
                    request
                        .extensions_mut()
                        .insert(RequestContext::from(claims));
                    next.run(request).await
                }
                Some(None) if public => next.run(request).await,
                Some(None) => {
                    ApiError::Unauthenticated("Invalid or expired token".to_string())
                        .into_response()
                }
                None => {
                    // No access token at all: try the refresh cookie.
                    let refreshed = match cookies::refresh_token(&jar) {
                        Some(refresh) => {
                            state
                                .tokens
                                .refresh_access_token(state.store.as_ref(), &refresh)
                                .await
                        }
                        None => None,
                    };

                    match refreshed {
                        Some(issued) => {
                            tracing::debug!(user_id = %issued.claims.sub, "Access token silently refreshed");
                            let cookie = state.cookies.access_cookie(issued.token.clone());
                            request
                                .extensions_mut()
                                .insert(IssuedAccessToken(issued.token));
                            request
                                .extensions_mut()
                                .insert(RequestContext::from(issued.claims));
                            let response = next.run(request).await;
                            (CookieJar::new().add(cookie), response).into_response()
                        }
                        None if public => next.run(request).await,
                        None => ApiError::unauthenticated().into_response(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::models::Role,
        state::test_support::{access_cookie_for, refresh_cookie_for, seed_user, test_state},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    async fn echo(ctx: Option<Extension<RequestContext>>) -> String {
        ctx.map(|Extension(c)| c.email)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/login", get(echo))
            .route("/admin/users", get(echo))
            .route("/api/articles", get(echo).post(echo))
            .route("/api/profile", get(echo))
            .route("/api/auth/refresh", get(echo))
            .route("/about", get(echo))
            .layer(middleware::from_fn_with_state(state.clone(), authorize))
            .with_state(state)
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
    ) -> axum::response::Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn text(res: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(res: &axum::response::Response) -> &str {
        res.headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[test]
    fn test_classify_is_exclusive() {
        use PathClass::*;
        let cases = [
            (Method::GET, "/login", LoginPage),
            (Method::GET, "/admin", Admin),
            (Method::GET, "/admin/articles/new", Admin),
            (Method::PUT, "/api/admin/settings", Admin),
            (Method::GET, "/administrator", Other),
            (Method::POST, "/api/auth/login", AuthEndpoint),
            (Method::POST, "/api/auth/refresh", AuthEndpoint),
            (Method::GET, "/api/articles/slug/x", PublicRead),
            (Method::HEAD, "/api/categories", PublicRead),
            (Method::POST, "/api/articles", Api),
            (Method::GET, "/api/users", Api),
            (Method::GET, "/api/articlesx", Api),
            (Method::GET, "/", Other),
            (Method::GET, "/health", Other),
        ];
        for (method, path, expected) in cases {
            assert_eq!(classify(&method, path), expected, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn test_admin_without_session_redirects_to_login_with_return_path() {
        let res = send(app(test_state()), Method::GET, "/admin/users", None).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&res), "/login?from=%2Fadmin%2Fusers");
    }

    #[tokio::test]
    async fn test_admin_with_disallowed_role_redirects_home() {
        let state = test_state();
        let writer = seed_user(&state, "w@example.com", Role::Writer).await;
        let cookie = access_cookie_for(&state, &writer);
        let res = send(app(state), Method::GET, "/admin/users", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn test_admin_with_editor_passes_with_context() {
        let state = test_state();
        let editor = seed_user(&state, "ed@example.com", Role::Editor).await;
        let cookie = access_cookie_for(&state, &editor);
        let res = send(app(state), Method::GET, "/admin/users", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "ed@example.com");
    }

    #[tokio::test]
    async fn test_login_page_bounces_signed_in_users() {
        let state = test_state();
        let admin = seed_user(&state, "a@example.com", Role::Admin).await;
        let reader = seed_user(&state, "r@example.com", Role::User).await;

        let cookie = access_cookie_for(&state, &admin);
        let res = send(app(state.clone()), Method::GET, "/login", Some(&cookie)).await;
        assert_eq!(location(&res), "/admin");

        let cookie = access_cookie_for(&state, &reader);
        let res = send(app(state.clone()), Method::GET, "/login", Some(&cookie)).await;
        assert_eq!(location(&res), "/");

        let res = send(app(state), Method::GET, "/login", Some("accessToken=junk")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_without_session_is_json_401() {
        let res = send(app(test_state()), Method::GET, "/api/profile", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&text(res).await).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_api_with_invalid_token_is_401() {
        let res = send(
            app(test_state()),
            Method::POST,
            "/api/articles",
            Some("accessToken=junk"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_read_proceeds_anonymously() {
        let state = test_state();
        let res = send(app(state.clone()), Method::GET, "/api/articles", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "anonymous");

        let res = send(app(state), Method::GET, "/api/articles", Some("accessToken=junk")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "anonymous");
    }

    #[tokio::test]
    async fn test_silent_refresh_reissues_access_cookie() {
        let state = test_state();
        let user = seed_user(&state, "u@example.com", Role::User).await;
        let cookie = refresh_cookie_for(&state, &user);

        let res = send(app(state), Method::GET, "/api/profile", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let set_cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("accessToken="));
        assert_eq!(text(res).await, "u@example.com");
    }

    #[tokio::test]
    async fn test_silent_refresh_fails_for_inactive_user() {
        let state = test_state();
        let user = seed_user(&state, "gone@example.com", Role::User).await;
        let cookie = refresh_cookie_for(&state, &user);
        state.store.set_active(user.id, false).await.unwrap();

        let res = send(app(state), Method::GET, "/api/profile", Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_auth_endpoints_and_other_paths_pass_through() {
        let state = test_state();
        let res = send(app(state.clone()), Method::GET, "/api/auth/refresh", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(app(state), Method::GET, "/about", None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
