//! Session cookies: a site-wide access cookie and a refresh cookie scoped to
//! the refresh endpoint.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const REFRESH_PATH: &str = "/api/auth/refresh";

#[derive(Debug, Clone)]
pub struct SessionCookies {
    secure: bool,
    access_max_age_secs: i64,
    refresh_max_age_secs: i64,
}

impl SessionCookies {
    pub fn new(secure: bool, access_max_age_secs: i64, refresh_max_age_secs: i64) -> Self {
        Self {
            secure,
            access_max_age_secs,
            refresh_max_age_secs,
        }
    }

    fn build(&self, name: &'static str, value: String, path: &'static str) -> Cookie<'static> {
        Cookie::build((name, value))
            .path(path)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .build()
    }

    pub fn access_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = self.build(ACCESS_COOKIE, token, "/");
        cookie.set_max_age(time::Duration::seconds(self.access_max_age_secs));
        cookie
    }

    pub fn refresh_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = self.build(REFRESH_COOKIE, token, REFRESH_PATH);
        cookie.set_max_age(time::Duration::seconds(self.refresh_max_age_secs));
        cookie
    }

    /// Adds both session cookies to the jar.
    pub fn issue(&self, jar: CookieJar, access: String, refresh: String) -> CookieJar {
        jar.add(self.access_cookie(access))
            .add(self.refresh_cookie(refresh))
    }

    /// Emits expiring replacements for both cookies whether or not the
    /// client sent them.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut access = self.build(ACCESS_COOKIE, String::new(), "/");
        access.make_removal();
        let mut refresh = self.build(REFRESH_COOKIE, String::new(), REFRESH_PATH);
        refresh.make_removal();
        jar.add(access).add(refresh)
    }
}

pub fn access_token(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract bearer token from Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Cookie first, then the Authorization header.
pub fn presented_access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    access_token(jar).or_else(|| bearer_token(headers))
}
