//! Process configuration, read once at startup from the environment.

use std::{net::SocketAddr, path::PathBuf};

use crate::{auth::policy::RolePolicy, db::DbConfig};

/// Fallback token lifetime for unparseable duration strings.
pub const DEFAULT_DURATION_SECS: i64 = 900;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingJwtSecret,

    #[error("invalid bind address `{0}`")]
    InvalidAddress(String),

    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    InvalidBcryptCost(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Bucket capacity.
    pub burst: u32,
    /// Tokens restored per minute.
    pub per_minute: u32,
}

/// Admin account seeded at startup when no active admin exists.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database: Option<DbConfig>,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub allowed_origins: Vec<String>,
    pub bcrypt_cost: u32,
    pub auth_rate_limit: RateLimitConfig,
    pub admin: Option<AdminBootstrap>,
    pub frontend_dir: Option<PathBuf>,
    /// Overrides the default level for this crate's targets.
    pub log_level: Option<String>,
    pub log_dir: PathBuf,
    pub policy: RolePolicy,
}

/// Parses `<n>s`, `<n>m`, `<n>h` or `<n>d` into seconds. Anything else,
/// including a bare number, yields [`DEFAULT_DURATION_SECS`].
pub fn parse_duration(value: &str) -> i64 {
    let value = value.trim();
    let Some(unit) = value.chars().last() else {
        return DEFAULT_DURATION_SECS;
    };
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return DEFAULT_DURATION_SECS,
    };
    value[..value.len() - 1]
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .and_then(|n| n.checked_mul(multiplier))
        .unwrap_or(DEFAULT_DURATION_SECS)
}

fn parse_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("ENVIRONMENT").as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::MissingJwtSecret)?;
        let refresh_secret = get("REFRESH_TOKEN_SECRET").unwrap_or_else(|| jwt_secret.clone());

        let bcrypt_cost = match get("BCRYPT_COST").and_then(|s| s.parse::<u32>().ok()) {
            Some(cost) if !(4..=31).contains(&cost) => {
                return Err(ConfigError::InvalidBcryptCost(cost))
            }
            Some(cost) => cost,
            None => bcrypt::DEFAULT_COST,
        };

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|list| parse_origins(&list))
            .filter(|origins| !origins.is_empty())
            .or_else(|| get("FRONTEND_ORIGIN").map(|origin| vec![origin.trim().to_string()]))
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let number = |key: &str, fallback: u32| {
            get(key)
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(fallback)
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email: email.trim().to_lowercase(),
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: get("PORT").and_then(|s| s.parse().ok()).unwrap_or(3001),
            database: DbConfig::from_lookup(&get),
            jwt_secret,
            refresh_secret,
            access_token_ttl_secs: get("ACCESS_TOKEN_EXPIRES_IN")
                .map(|s| parse_duration(&s))
                .unwrap_or(15 * 60),
            refresh_token_ttl_secs: get("REFRESH_TOKEN_EXPIRES_IN")
                .map(|s| parse_duration(&s))
                .unwrap_or(7 * 24 * 60 * 60),
            allowed_origins,
            bcrypt_cost,
            auth_rate_limit: RateLimitConfig {
                burst: number("AUTH_RATE_LIMIT_BURST", 10).max(1),
                per_minute: number("AUTH_RATE_LIMIT_PER_MINUTE", 10).max(1),
            },
            admin,
            frontend_dir: get("FRONTEND_DIR").map(PathBuf::from),
            log_level: get("LOG_LEVEL"),
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            policy: RolePolicy::from_lookup(&get),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    /// Session cookies carry `Secure` only in production.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "JWT_SECRET" => Some("test-access-secret".to_string()),
        "REFRESH_TOKEN_SECRET" => Some("test-refresh-secret".to_string()),
        "BCRYPT_COST" => Some("4".to_string()),
        _ => None,
    })
    .expect("test config is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("30s"), 30);
        assert_eq!(parse_duration("15m"), 900);
        assert_eq!(parse_duration("2h"), 7200);
        assert_eq!(parse_duration("7d"), 604_800);
    }

    #[test]
    fn test_parse_duration_falls_back() {
        assert_eq!(parse_duration("soon"), DEFAULT_DURATION_SECS);
        assert_eq!(parse_duration("3600"), DEFAULT_DURATION_SECS);
        assert_eq!(parse_duration(""), DEFAULT_DURATION_SECS);
        assert_eq!(parse_duration("-5m"), DEFAULT_DURATION_SECS);
        assert_eq!(parse_duration("1w"), DEFAULT_DURATION_SECS);
    }

    #[test]
    fn test_missing_jwt_secret_fails() {
        let result = config_from(&[("JWT_SECRET", "  ")]);
        assert!(matches!(result, Err(ConfigError::MissingJwtSecret)));
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.refresh_secret, "s3cret");
        assert_eq!(config.access_token_ttl_secs, 900);
        assert_eq!(config.refresh_token_ttl_secs, 604_800);
        assert_eq!(config.bind_addr().unwrap().port(), 3001);
        assert!(config.database.is_none());
        assert!(config.admin.is_none());
        assert!(!config.secure_cookies());
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("JWT_SECRET", "a"),
            ("REFRESH_TOKEN_SECRET", "b"),
            ("ENVIRONMENT", "production"),
            ("ACCESS_TOKEN_EXPIRES_IN", "5m"),
            ("ALLOWED_ORIGINS", "https://news.example.com, ,https://admin.example.com"),
            ("ADMIN_EMAIL", "Chief@Example.com"),
            ("ADMIN_PASSWORD", "correct horse"),
            ("DATABASE_URL", "postgresql://localhost/news"),
        ])
        .unwrap();
        assert!(config.secure_cookies());
        assert_eq!(config.refresh_secret, "b");
        assert_eq!(config.access_token_ttl_secs, 300);
        assert_eq!(
            config.allowed_origins,
            vec!["https://news.example.com", "https://admin.example.com"]
        );
        let admin = config.admin.unwrap();
        assert_eq!(admin.email, "chief@example.com");
        assert_eq!(admin.name, "Administrator");
        assert!(config.database.is_some());
    }

    #[test]
    fn test_rejects_out_of_range_bcrypt_cost() {
        let result = config_from(&[("JWT_SECRET", "a"), ("BCRYPT_COST", "2")]);
        assert!(matches!(result, Err(ConfigError::InvalidBcryptCost(2))));
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = config_from(&[("JWT_SECRET", "a"), ("HOST", "not a host")]).unwrap();
        assert!(matches!(
            config.bind_addr(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }
}
