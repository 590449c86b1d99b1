use anyhow::{bail, Context, Result};
use std::str::FromStr;

use crate::security::session::SessionConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// `APP_ENV`; `production` requires an explicit CORS origin list.
    pub environment: String,
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub session: SessionConfig,
    pub session_cleanup_secs: u64,
    pub export_max_records: usize,
    pub cors_allowed_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

/// Admin account created at startup when no user with that username exists.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: None,
            session: SessionConfig::default(),
            session_cleanup_secs: 300,
            export_max_records: 10_000,
            cors_allowed_origins: Vec::new(),
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup so it can be tested without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let session_defaults = SessionConfig::default();

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                pool_size: parse_or(&get, "DATABASE_POOL_SIZE", 10)?,
            }),
            None => None,
        };

        let session = SessionConfig {
            idle_timeout_minutes: parse_or(
                &get,
                "SESSION_IDLE_MINUTES",
                session_defaults.idle_timeout_minutes,
            )?,
            absolute_timeout_hours: parse_or(
                &get,
                "SESSION_ABSOLUTE_HOURS",
                session_defaults.absolute_timeout_hours,
            )?,
            max_concurrent_sessions: parse_or(
                &get,
                "SESSION_MAX_CONCURRENT",
                session_defaults.max_concurrent_sessions,
            )?,
            cookie_secure: parse_or(&get, "SESSION_COOKIE_SECURE", session_defaults.cookie_secure)?,
            ..session_defaults
        };

        let cors_allowed_origins: Vec<String> = get("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let environment = get("APP_ENV")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or(defaults.environment.clone());
        if environment == "production" && cors_allowed_origins.is_empty() {
            bail!("CORS_ALLOWED_ORIGINS must be set when APP_ENV=production");
        }

        let bootstrap_admin = match (
            get("BOOTSTRAP_ADMIN_USERNAME"),
            get("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin {
                email: get("BOOTSTRAP_ADMIN_EMAIL")
                    .unwrap_or_else(|| format!("{username}@localhost")),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or(&get, "SERVER_PORT", defaults.server.port)?,
            },
            database,
            session,
            session_cleanup_secs: parse_or(&get, "SESSION_CLEANUP_SECS", defaults.session_cleanup_secs)?,
            export_max_records: parse_or(&get, "EXPORT_MAX_RECORDS", defaults.export_max_records)?,
            cors_allowed_origins,
            bootstrap_admin,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}
