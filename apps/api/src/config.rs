use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    /// When set, rate-limit counters live in Redis; otherwise in process memory.
    pub redis_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub rate_limit_window_ms: i64,
    pub rate_limit_max_requests: u32,
    /// Cap on credential attempts against one CV per window, across all callers.
    pub rate_limit_slug_max_requests: u32,
    /// Honor the last `x-forwarded-for` hop when keying anonymous callers.
    pub trust_forwarded_for: bool,
    /// Base of the public CV pages, used to build share links.
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            rate_limit_window_ms: parse_env("RATE_LIMIT_WINDOW_MS", 60_000)?,
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 10)?,
            rate_limit_slug_max_requests: parse_env("RATE_LIMIT_SLUG_MAX_REQUESTS", 30)?,
            trust_forwarded_for: parse_env("TRUST_FORWARDED_FOR", false)?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Shareable URL for a secret-link CV.
    pub fn share_url(&self, slug: &str, token: &str) -> String {
        format!("{}/cv/{}?token={}", self.public_base_url, slug, token)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/folio_test".to_string(),
            database_max_connections: 1,
            redis_url: None,
            port: 0,
            rust_log: "debug".to_string(),
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 3,
            rate_limit_slug_max_requests: 5,
            trust_forwarded_for: false,
            public_base_url: "https://cv.example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_url_format() {
        let config = Config::for_tests();
        assert_eq!(
            config.share_url("jane-doe", "abc123"),
            "https://cv.example.com/cv/jane-doe?token=abc123"
        );
    }
}
