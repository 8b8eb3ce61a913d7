//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use simricare_core::RolePolicy;
use std::net::SocketAddr;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: Option<String>,
    pub skip_db_init: bool,
    pub log_level: Level,
    pub cors_origin: String,
    /// HS256 key for session tokens: `JWT_SECRET`, else `NEXTAUTH_SECRET`.
    pub session_secret: String,
    /// Set when neither secret is configured and a random key was generated.
    /// Sessions then do not survive a restart.
    pub session_secret_generated: bool,
    pub session_ttl_days: i64,
    pub role_policy: RolePolicy,
}

fn parse_flag(name: &str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => {
            Ok(true)
        }
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => {
            Ok(false)
        }
        Some(v) => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", v),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL");
        let skip_db_init = parse_flag("SKIP_DB_INIT", var("SKIP_DB_INIT"))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Auth Settings ---
        let session_ttl_days = match var("SESSION_TTL_DAYS") {
            Some(raw) => raw.parse::<i64>().ok().filter(|d| *d > 0).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SESSION_TTL_DAYS".to_string(),
                    format!("'{}' is not a positive number of days", raw),
                )
            })?,
            None => 30,
        };

        let configured_secret = var("JWT_SECRET").or_else(|| var("NEXTAUTH_SECRET"));
        let session_secret_generated = configured_secret.is_none();
        let session_secret = configured_secret.unwrap_or_else(|| {
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        });

        let role_policy = RolePolicy::from_lists(
            &var("ADMIN_EMAILS").unwrap_or_default(),
            &var("COUNSELOR_EMAILS").unwrap_or_default(),
        );

        Ok(Self {
            bind_address,
            database_url,
            skip_db_init,
            log_level,
            cors_origin,
            session_secret,
            session_secret_generated,
            session_ttl_days,
            role_policy,
        })
    }

    /// The in-memory store is used when database setup is skipped or no
    /// database is configured.
    pub fn use_in_memory_store(&self) -> bool {
        self.skip_db_init || self.database_url.is_none()
    }
}

//=========================================================================================
// Deployment Environment Verification
//=========================================================================================

/// Variables that must be present before a deploy.
pub const REQUIRED_VARS: [&str; 8] = [
    "NEXT_PUBLIC_FIREBASE_API_KEY",
    "NEXT_PUBLIC_FIREBASE_AUTH_DOMAIN",
    "NEXT_PUBLIC_FIREBASE_PROJECT_ID",
    "NEXT_PUBLIC_FIREBASE_STORAGE_BUCKET",
    "NEXT_PUBLIC_FIREBASE_MESSAGING_SENDER_ID",
    "NEXT_PUBLIC_FIREBASE_APP_ID",
    "NEXTAUTH_SECRET",
    "NEXTAUTH_URL",
];

const MIN_SECRET_LEN: usize = 32;

/// Checks the deployment variables and returns every problem found.
pub fn verify_environment<F>(lookup: F) -> Vec<ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut problems = Vec::new();

    for name in REQUIRED_VARS {
        if var(name).is_none() {
            problems.push(ConfigError::MissingVar(name.to_string()));
        }
    }

    for name in ["NEXTAUTH_SECRET", "JWT_SECRET"] {
        if let Some(secret) = var(name) {
            if secret.len() < MIN_SECRET_LEN {
                problems.push(ConfigError::InvalidValue(
                    name.to_string(),
                    format!("must be at least {} characters", MIN_SECRET_LEN),
                ));
            }
        }
    }

    if let Some(url) = var("NEXTAUTH_URL") {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            problems.push(ConfigError::InvalidValue(
                "NEXTAUTH_URL".to_string(),
                format!("'{}' is not an http(s) URL", url),
            ));
        }
    }

    if let Err(e) = parse_flag("SKIP_DB_INIT", var("SKIP_DB_INIT")) {
        problems.push(e);
    }

    problems
}
