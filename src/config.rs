//! Pipeline configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup, validated, and then handed to the
//! pipeline stages as immutable values. Nothing here is mutated per request.
//!
//! ## Shared store
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379/0"
//! # or
//! export REDIS_HOST="localhost"
//! export REDIS_PORT="6379"
//! export REDIS_PASSWORD=""
//! export REDIS_DB="0"
//! ```
//!
//! Without Redis the service runs on an in-process store, which only makes
//! sense for a single instance in development.
//!
//! ## Required Variables
//!
//! - `JWT_SECRET` - HMAC key used to verify bearer credentials
//!
//! ## Optional Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:3000`)
//! - `RUST_LOG` - Log level (default: `info`)
//! - `LOG_FORMAT` - `text` or `json` (default: `text`)
//! - `APP_ENV` - `development`, `staging`, `production`, `testing` (default: `development`)
//! - `DEBUG` - Include internal error detail in responses (default: `false`, refused in production)
//! - `BEHIND_PROXY` - Read client IP from `X-Forwarded-For` / `X-Real-IP` (default: `false`)
//! - `JWT_LEEWAY_SECONDS` - Clock skew tolerance for `exp` (default: 30)
//! - `MAX_REQUEST_SIZE_BYTES` (default: 10 MiB), `MAX_JSON_DEPTH` (10),
//!   `MAX_ARRAY_LENGTH` (1000), `MAX_STRING_LENGTH` (10000), `TRUNCATE_LONG_STRINGS` (true)
//! - `ENABLE_XSS_PROTECTION`, `ENABLE_SQL_INJECTION_PROTECTION`,
//!   `ENABLE_INPUT_SANITIZATION`, `SANITIZE_HTML` (all default: true)
//! - `RATE_LIMIT_REQUESTS` (60), `RATE_LIMIT_WINDOW_SECONDS` (60), `RATE_LIMIT_WHITELIST`
//! - `RATE_LIMIT_REQUESTS_PER_HOUR` (1000), `RATE_LIMIT_REQUESTS_PER_DAY` (10000), 0 disables
//! - `RATE_LIMIT_BLACKLIST` - Identities refused with 403 before any counting
//! - `EXCLUDED_PATHS` (default: `/health,/metrics,/favicon.ico`)
//! - `PUBLIC_PATHS` - Paths where a credential is optional (default: `/health`)
//! - `SENSITIVE_FIELDS` - Redaction denylist, comma separated
//! - `SLOW_REQUEST_THRESHOLD_MS` (1000), `MAX_LOG_BODY_SIZE` (10240)
//! - `LOG_RESPONSES`, `DETECT_BOTS` (both default: true)

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Deployment environment. Only used to refuse unsafe combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
    Testing,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => anyhow::bail!("unknown APP_ENV '{other}'"),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::Testing => "testing",
        };
        f.write_str(name)
    }
}

/// Limits and toggles for the validation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Bodies larger than this are rejected before parsing.
    pub max_request_size_bytes: usize,
    pub max_json_depth: usize,
    pub max_array_length: usize,
    pub max_string_length: usize,
    /// When false, over-long strings are rejected instead of truncated.
    pub truncate_long_strings: bool,
    pub enable_xss_protection: bool,
    pub enable_sql_injection_protection: bool,
    pub enable_input_sanitization: bool,
    /// Entity-escape what is left after tag stripping (vs raw strip only).
    pub sanitize_html: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_request_size_bytes: 10 * 1024 * 1024,
            max_json_depth: 10,
            max_array_length: 1000,
            max_string_length: 10_000,
            truncate_long_strings: true,
            enable_xss_protection: true,
            enable_sql_injection_protection: true,
            enable_input_sanitization: true,
            sanitize_html: true,
        }
    }
}

/// Fixed-window throttle parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests: u64,
    pub window_seconds: u64,
    /// Extra hourly ceiling, counted alongside the primary window.
    pub requests_per_hour: Option<u64>,
    /// Extra daily ceiling, counted alongside the primary window.
    pub requests_per_day: Option<u64>,
    /// Identities (`ip:1.2.3.4`, `user:42`) that are never counted.
    pub whitelist: HashSet<String>,
    /// Identities that are refused outright. Wins over the whitelist.
    pub blacklist: HashSet<String>,
    pub behind_proxy: bool,
}

/// One fixed counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub name: &'static str,
    pub limit: u64,
    pub seconds: u64,
}

impl RateLimitConfig {
    /// Windows a request is counted in, primary first.
    pub fn windows(&self) -> Vec<Window> {
        let mut windows = vec![Window {
            name: "window",
            limit: self.requests,
            seconds: self.window_seconds.max(1),
        }];
        if let Some(limit) = self.requests_per_hour {
            windows.push(Window {
                name: "hour",
                limit,
                seconds: 3_600,
            });
        }
        if let Some(limit) = self.requests_per_day {
            windows.push(Window {
                name: "day",
                limit,
                seconds: 86_400,
            });
        }
        windows
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 60,
            window_seconds: 60,
            requests_per_hour: Some(1_000),
            requests_per_day: Some(10_000),
            whitelist: HashSet::new(),
            blacklist: HashSet::new(),
            behind_proxy: false,
        }
    }
}

/// Bearer credential verification settings.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub leeway_seconds: u64,
    /// Path prefixes where a credential is optional.
    pub public_paths: Vec<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("leeway_seconds", &self.leeway_seconds)
            .field("public_paths", &self.public_paths)
            .finish()
    }
}

impl AuthConfig {
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path_matches(path, p))
    }
}

/// Request logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Paths whose body, performance and analytics records are skipped.
    pub excluded_paths: Vec<String>,
    /// Lowercase keys whose values are replaced by the redaction marker.
    pub sensitive_fields: HashSet<String>,
    pub slow_request_threshold_ms: u64,
    pub max_log_body_size: usize,
    /// Add response headers and size to the `request` record.
    pub log_responses: bool,
    /// Flag crawler and scraper user agents as security events.
    pub detect_bots: bool,
}

pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "access_token",
    "refresh_token",
    "secret",
    "key",
    "api_key",
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "proxy-authorization",
    "credit_card",
    "ssn",
    "social_security",
];

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            excluded_paths: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/favicon.ico".to_string(),
            ],
            sensitive_fields: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            slow_request_threshold_ms: 1000,
            max_log_body_size: 10 * 1024,
            log_responses: true,
            detect_bots: true,
        }
    }
}

impl LoggingConfig {
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| path_matches(path, p))
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub redis_url: Option<String>,
    pub log_level: String,
    pub log_format: String,
    pub environment: Environment,
    /// Include internal error detail in responses. Never in production.
    pub debug: bool,
    pub validation: ValidationConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or `APP_ENV` is unknown.
    pub fn from_env() -> Result<Self> {
        let redis_url = Self::load_redis_url();

        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let environment = env::var("APP_ENV")
            .map(|v| v.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))
            .context("Failed to parse APP_ENV")?;

        let debug = env_flag("DEBUG", false);
        let behind_proxy = env_flag("BEHIND_PROXY", false);

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let defaults = ValidationConfig::default();
        let validation = ValidationConfig {
            max_request_size_bytes: env_or(
                "MAX_REQUEST_SIZE_BYTES",
                defaults.max_request_size_bytes,
            ),
            max_json_depth: env_or("MAX_JSON_DEPTH", defaults.max_json_depth),
            max_array_length: env_or("MAX_ARRAY_LENGTH", defaults.max_array_length),
            max_string_length: env_or("MAX_STRING_LENGTH", defaults.max_string_length),
            truncate_long_strings: env_flag("TRUNCATE_LONG_STRINGS", true),
            enable_xss_protection: env_flag("ENABLE_XSS_PROTECTION", true),
            enable_sql_injection_protection: env_flag("ENABLE_SQL_INJECTION_PROTECTION", true),
            enable_input_sanitization: env_flag("ENABLE_INPUT_SANITIZATION", true),
            sanitize_html: env_flag("SANITIZE_HTML", true),
        };

        let rate_limit = RateLimitConfig {
            requests: env_or("RATE_LIMIT_REQUESTS", 60),
            window_seconds: env_or("RATE_LIMIT_WINDOW_SECONDS", 60),
            requests_per_hour: Some(env_or("RATE_LIMIT_REQUESTS_PER_HOUR", 1_000))
                .filter(|n| *n > 0),
            requests_per_day: Some(env_or("RATE_LIMIT_REQUESTS_PER_DAY", 10_000))
                .filter(|n| *n > 0),
            whitelist: env_list("RATE_LIMIT_WHITELIST").into_iter().collect(),
            blacklist: env_list("RATE_LIMIT_BLACKLIST").into_iter().collect(),
            behind_proxy,
        };

        let auth = AuthConfig {
            jwt_secret,
            leeway_seconds: env_or("JWT_LEEWAY_SECONDS", 30),
            public_paths: env_list_or("PUBLIC_PATHS", &["/health"]),
        };

        let log_defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            excluded_paths: env_list_or("EXCLUDED_PATHS", &["/health", "/metrics", "/favicon.ico"]),
            sensitive_fields: env_list_or("SENSITIVE_FIELDS", DEFAULT_SENSITIVE_FIELDS)
                .into_iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            slow_request_threshold_ms: env_or(
                "SLOW_REQUEST_THRESHOLD_MS",
                log_defaults.slow_request_threshold_ms,
            ),
            max_log_body_size: env_or("MAX_LOG_BODY_SIZE", log_defaults.max_log_body_size),
            log_responses: env_flag("LOG_RESPONSES", true),
            detect_bots: env_flag("DETECT_BOTS", true),
        };

        Ok(Self {
            listen_addr,
            redis_url,
            log_level,
            log_format,
            environment,
            debug,
            validation,
            rate_limit,
            auth,
            logging,
        })
    }

    /// Loads Redis URL with fallback to component-based configuration.
    ///
    /// Priority:
    /// 1. `REDIS_URL` environment variable
    /// 2. Constructed from `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`
    ///
    /// Returns `None` if Redis is not configured.
    fn load_redis_url() -> Option<String> {
        if let Ok(url) = env::var("REDIS_URL") {
            return Some(url);
        }

        let host = env::var("REDIS_HOST").ok()?;
        let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        let password = env::var("REDIS_PASSWORD").ok();
        let db = env::var("REDIS_DB").unwrap_or_else(|_| "0".to_string());

        let url = match password {
            // Empty password means no authentication
            Some(pwd) if !pwd.is_empty() => format!("redis://:{}@{}:{}/{}", pwd, host, port, db),
            _ => format!("redis://{}:{}/{}", host, port, db),
        };

        Some(url)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - debug mode is enabled in production
    /// - any size/depth/rate limit is zero
    /// - `log_format` is not `text` or `json`
    /// - `listen_addr` or the Redis URL is malformed
    /// - `JWT_SECRET` is empty
    pub fn validate(&self) -> Result<()> {
        if self.debug && self.environment == Environment::Production {
            anyhow::bail!("DEBUG must be disabled when APP_ENV=production");
        }

        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if let Some(ref redis_url) = self.redis_url
            && !redis_url.starts_with("redis://")
            && !redis_url.starts_with("rediss://")
        {
            anyhow::bail!(
                "REDIS_URL must start with 'redis://' or 'rediss://', got '{}'",
                mask_connection_string(redis_url)
            );
        }

        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let v = &self.validation;
        if v.max_request_size_bytes == 0 {
            anyhow::bail!("MAX_REQUEST_SIZE_BYTES must be greater than 0");
        }
        if v.max_json_depth == 0 {
            anyhow::bail!("MAX_JSON_DEPTH must be greater than 0");
        }
        if v.max_array_length == 0 {
            anyhow::bail!("MAX_ARRAY_LENGTH must be greater than 0");
        }
        if v.max_string_length == 0 {
            anyhow::bail!("MAX_STRING_LENGTH must be greater than 0");
        }

        if self.rate_limit.requests == 0 {
            anyhow::bail!("RATE_LIMIT_REQUESTS must be at least 1");
        }
        if self.rate_limit.window_seconds == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECONDS must be greater than 0");
        }
        if self.rate_limit.requests_per_hour == Some(0) || self.rate_limit.requests_per_day == Some(0)
        {
            anyhow::bail!("Hourly and daily ceilings must be at least 1 when set");
        }

        Ok(())
    }

    /// Prints configuration summary (without sensitive data).
    pub fn print_summary(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Environment: {}", self.environment);

        if let Some(ref redis_url) = self.redis_url {
            tracing::info!("  Shared store: {} (redis)", mask_connection_string(redis_url));
        } else {
            tracing::info!("  Shared store: in-memory (single instance only)");
        }

        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
        tracing::info!(
            "  Rate limit: {} requests / {}s",
            self.rate_limit.requests,
            self.rate_limit.window_seconds
        );
        if let Some(per_hour) = self.rate_limit.requests_per_hour {
            tracing::info!("  Hourly ceiling: {}", per_hour);
        }
        if let Some(per_day) = self.rate_limit.requests_per_day {
            tracing::info!("  Daily ceiling: {}", per_day);
        }
        if !self.rate_limit.blacklist.is_empty() {
            tracing::info!("  Blacklisted identities: {}", self.rate_limit.blacklist.len());
        }
        tracing::info!(
            "  Max request size: {} bytes",
            self.validation.max_request_size_bytes
        );

        if self.debug {
            tracing::warn!("  Debug mode: ON (internal error detail is exposed to callers)");
        }
    }
}

/// True if `path` equals `prefix` or sits below it (`/health` matches `/health/db`).
fn path_matches(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

fn env_list_or(name: &str, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Ok(v) => split_list(&v),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Masks sensitive information in connection strings for logging.
///
/// - `redis://:password@host:port/db` → `redis://:***@host:port/db`
pub fn mask_connection_string(url: &str) -> String {
    if let Some(start) = url.find("://") {
        let scheme_end = start + 3;
        let rest = &url[scheme_end..];

        if let Some(at_pos) = rest.find('@') {
            let credentials = &rest[..at_pos];
            let host_part = &rest[at_pos..];

            if let Some(colon_pos) = credentials.rfind(':') {
                let username = &credentials[..colon_pos];
                return format!("{}://{}:***{}", &url[..start], username, host_part);
            }
        }
    }

    url.to_string()
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if required variables are missing or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> Config {
        Config {
            listen_addr: "0.0.0.0:3000".to_string(),
            redis_url: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            environment: Environment::Development,
            debug: false,
            validation: ValidationConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                leeway_seconds: 0,
                public_paths: vec!["/health".to_string()],
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_mask_connection_string() {
        assert_eq!(
            mask_connection_string("redis://:password@localhost:6379/0"),
            "redis://:***@localhost:6379/0"
        );
        assert_eq!(
            mask_connection_string("redis://localhost:6379/0"),
            "redis://localhost:6379/0"
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.log_format = "invalid".to_string();
        assert!(config.validate().is_err());
        config.log_format = "json".to_string();
        assert!(config.validate().is_ok());

        config.listen_addr = "3000".to_string();
        assert!(config.validate().is_err());
        config.listen_addr = "0.0.0.0:3000".to_string();

        config.redis_url = Some("memcached://localhost".to_string());
        assert!(config.validate().is_err());
        config.redis_url = None;

        config.rate_limit.window_seconds = 0;
        assert!(config.validate().is_err());
        config.rate_limit.window_seconds = 60;

        config.rate_limit.requests_per_hour = Some(0);
        assert!(config.validate().is_err());
        config.rate_limit.requests_per_hour = None;
        assert!(config.validate().is_ok());

        config.validation.max_json_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_refused_in_production() {
        let mut config = valid_config();
        config.debug = true;
        assert!(config.validate().is_ok());

        config.environment = Environment::Production;
        assert!(config.validate().is_err());

        config.debug = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut config = valid_config();
        config.auth.jwt_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_matches_prefix_boundaries() {
        assert!(path_matches("/health", "/health"));
        assert!(path_matches("/health/db", "/health"));
        assert!(!path_matches("/healthz", "/health"));
        assert!(path_matches("/", "/"));
        assert!(!path_matches("/api", "/"));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    #[serial]
    fn test_load_redis_url_from_components() {
        // SAFETY: Tests are run serially due to #[serial], so no concurrent access
        unsafe {
            env::remove_var("REDIS_URL");
            env::set_var("REDIS_HOST", "redis-host");
            env::set_var("REDIS_PORT", "6380");
            env::set_var("REDIS_DB", "1");
        }

        let url = Config::load_redis_url().unwrap();
        assert_eq!(url, "redis://redis-host:6380/1");

        unsafe {
            env::set_var("REDIS_PASSWORD", "secret");
        }
        let url = Config::load_redis_url().unwrap();
        assert_eq!(url, "redis://:secret@redis-host:6380/1");

        unsafe {
            env::set_var("REDIS_PASSWORD", "");
        }
        let url = Config::load_redis_url().unwrap();
        assert_eq!(url, "redis://redis-host:6380/1");

        unsafe {
            env::remove_var("REDIS_HOST");
            env::remove_var("REDIS_PORT");
            env::remove_var("REDIS_DB");
            env::remove_var("REDIS_PASSWORD");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_reads_limits_and_lists() {
        // SAFETY: Tests are run serially
        unsafe {
            env::set_var("JWT_SECRET", "s3cret");
            env::set_var("MAX_JSON_DEPTH", "4");
            env::set_var("RATE_LIMIT_REQUESTS", "10");
            env::set_var("RATE_LIMIT_REQUESTS_PER_DAY", "0");
            env::set_var("RATE_LIMIT_BLACKLIST", "ip:203.0.113.9, user:mallory");
            env::set_var("EXCLUDED_PATHS", "/health, /ready ,");
            env::set_var("SENSITIVE_FIELDS", "Password,PIN");
            env::set_var("ENABLE_XSS_PROTECTION", "false");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.validation.max_json_depth, 4);
        assert_eq!(config.rate_limit.requests, 10);
        assert_eq!(config.rate_limit.requests_per_hour, Some(1_000));
        assert_eq!(config.rate_limit.requests_per_day, None);
        assert!(config.rate_limit.blacklist.contains("user:mallory"));
        assert!(config.rate_limit.blacklist.contains("ip:203.0.113.9"));
        assert_eq!(config.logging.excluded_paths, vec!["/health", "/ready"]);
        assert!(config.logging.sensitive_fields.contains("password"));
        assert!(config.logging.sensitive_fields.contains("pin"));
        assert!(!config.validation.enable_xss_protection);
        assert!(config.validation.enable_sql_injection_protection);

        unsafe {
            env::remove_var("JWT_SECRET");
            env::remove_var("MAX_JSON_DEPTH");
            env::remove_var("RATE_LIMIT_REQUESTS");
            env::remove_var("RATE_LIMIT_REQUESTS_PER_DAY");
            env::remove_var("RATE_LIMIT_BLACKLIST");
            env::remove_var("EXCLUDED_PATHS");
            env::remove_var("SENSITIVE_FIELDS");
            env::remove_var("ENABLE_XSS_PROTECTION");
        }
    }

    #[test]
    #[serial]
    fn test_missing_secret_fails() {
        // SAFETY: Tests are run serially
        unsafe {
            env::remove_var("JWT_SECRET");
        }
        assert!(Config::from_env().is_err());
    }
}
