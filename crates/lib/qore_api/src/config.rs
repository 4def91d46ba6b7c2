//! API server configuration.

use chrono::Duration;
use qore_core::auth::jwt::{DEFAULT_ACCESS_TOKEN_TTL_SECS, resolve_secret};
use qore_core::auth::password::BCRYPT_COST;
use tracing::warn;

/// Deployment environment. Controls error detail in responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse `production` / `test` / anything else (development).
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:5000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Access-token signing secret.
    pub jwt_secret: String,
    /// Refresh-token signing secret.
    pub jwt_refresh_secret: String,
    /// Access-token lifetime.
    pub access_token_ttl: Duration,
    pub environment: Environment,
    /// Allowed CORS origin. `None` allows any origin.
    pub frontend_url: Option<String>,
    pub bcrypt_cost: u32,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable             | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `BIND_ADDR`          | `0.0.0.0:$PORT`                          |
    /// | `PORT`               | `5000`                                   |
    /// | `DATABASE_URL`       | built from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` |
    /// | `JWT_SECRET`         | generated & persisted to file            |
    /// | `JWT_REFRESH_SECRET` | generated & persisted to file            |
    /// | `JWT_EXPIRES_IN`     | `1h`                                     |
    /// | `APP_ENV` / `NODE_ENV` | `development`                          |
    /// | `FRONTEND_URL`       | unset (any origin)                       |
    /// | `BCRYPT_COST`        | `10`                                     |
    pub fn from_env() -> Self {
        let port = env_or("PORT", "5000");
        let access_token_ttl = match std::env::var("JWT_EXPIRES_IN") {
            Ok(raw) => parse_duration(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unparseable JWT_EXPIRES_IN, using default");
                Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS)
            }),
            Err(_) => Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
        };
        let environment = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{port}")),
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| database_url_from_parts()),
            jwt_secret: resolve_secret(&["JWT_SECRET"], "jwt-secret"),
            jwt_refresh_secret: resolve_secret(&["JWT_REFRESH_SECRET"], "jwt-refresh-secret"),
            access_token_ttl,
            environment,
            frontend_url: std::env::var("FRONTEND_URL").ok().filter(|v| !v.is_empty()),
            bcrypt_cost: std::env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(BCRYPT_COST),
        }
    }

    /// Fixed secrets and the cheapest bcrypt cost, for tests.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            jwt_secret: "test-secret".into(),
            jwt_refresh_secret: "test-refresh-secret".into(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            environment: Environment::Test,
            frontend_url: None,
            bcrypt_cost: 4,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn database_url_from_parts() -> String {
    let host = env_or("DB_HOST", "localhost");
    let port = env_or("DB_PORT", "5432");
    let user = env_or("DB_USER", "postgres");
    let password = env_or("DB_PASSWORD", "");
    let name = env_or("DB_NAME", "qore");
    if password.is_empty() {
        format!("postgres://{user}@{host}:{port}/{name}")
    } else {
        format!("postgres://{user}:{password}@{host}:{port}/{name}")
    }
}

/// Parse `30s`, `15m`, `1h`, `7d` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: i64 = digits.parse().ok()?;
    let duration = match unit.trim() {
        "" | "s" => Duration::seconds(amount),
        "m" => Duration::minutes(amount),
        "h" => Duration::hours(amount),
        "d" => Duration::days(amount),
        _ => return None,
    };
    (amount > 0).then_some(duration)
}
