//! Server configuration loaded from environment variables.

/// Signing secret used when `JWT_SECRET` is unset. Only fit for local runs.
pub const DEV_JWT_SECRET: &str = "storefront-dev-secret-change-me";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// API server configuration.
///
/// Environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL` PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` pool size (default: `5`)
/// - `JWT_SECRET` token signing secret (default: a development secret)
/// - `JWT_TTL_SECS` token lifetime in seconds (default: `86400`)
/// - `RATE_LIMIT_PER_MINUTE` requests per client per minute (default: `100`)
/// - `ADMIN_EMAIL` / `ADMIN_PASSWORD` admin account created at startup when both are set
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub rate_limit_per_minute: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: var("DATABASE_URL"),
            database_max_connections: parsed(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            jwt_secret: var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_ttl_secs: parsed("JWT_TTL_SECS", defaults.jwt_ttl_secs),
            rate_limit_per_minute: parsed("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true when tokens are signed with the built-in development secret.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Returns the admin credentials when both halves are configured.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl_secs: 86_400,
            rate_limit_per_minute: 100,
            admin_email: None,
            admin_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.jwt_ttl_secs, 86_400);
        assert_eq!(config.rate_limit_per_minute, 100);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Pretty);
    }

    #[test]
    fn test_admin_credentials_need_both_values() {
        let mut config = Config {
            admin_email: Some("admin@example.com".to_string()),
            ..Config::default()
        };
        assert!(config.admin_credentials().is_none());

        config.admin_password = Some("correct horse".to_string());
        assert_eq!(
            config.admin_credentials(),
            Some(("admin@example.com", "correct horse"))
        );
    }
}
