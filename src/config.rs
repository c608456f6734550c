//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with defaults.
//! A `.env` file in the working directory is honored if present.
//!
//! # Environment
//!
//! - `APP_ENV`: `production` (default) or `development`. Development exposes
//!   raw failure detail in error envelopes and logs.
//!
//! # Admission Control
//!
//! - `RATE_LIMIT_WINDOW_MS`: Sliding window length (default: 60000)
//! - `RATE_LIMIT_MAX_REQUESTS`: Requests per client per window (default: 100, 0 = disabled)
//! - `RATE_LIMIT_SWEEP_INTERVAL_SECS`: Idle client eviction period (default: 60, 0 = disabled)
//! - `TRUSTED_PROXIES`: Comma-separated CIDRs whose forwarding headers are honored

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::limiter::RateLimiterConfig;
use crate::middleware::DetailPolicy;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    /// How much failure detail this environment may reveal.
    pub fn detail_policy(self) -> DetailPolicy {
        if self.is_production() {
            DetailPolicy::Conceal
        } else {
            DetailPolicy::Expose
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!(
                "unknown environment '{other}', expected 'production' or 'development'"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected 'text' or 'json'")),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 5000)
    pub port: u16,

    /// Deployment environment (default: production)
    pub environment: Environment,

    // =========================================================================
    // Admission Control Configuration
    // =========================================================================
    /// Sliding window length (default: 60s)
    pub rate_limit_window: Duration,

    /// Admissions per client per window (default: 100)
    /// Set to 0 to disable rate limiting
    pub rate_limit_max_requests: u32,

    /// Period of the idle client sweep (default: 60s, zero disables)
    pub rate_limit_sweep_interval: Duration,

    /// Trusted proxy CIDR ranges. Forwarding headers are believed only from
    /// peers inside these networks.
    ///
    /// Format: Comma-separated CIDR notation (e.g., "10.0.0.0/8,172.16.0.0/12")
    /// Default: Empty (forwarding headers ignored)
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log filter (e.g., "info", "request_guard=debug")
    pub log_level: String,

    /// Log output format (default: text)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a variable cannot be parsed or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 5000)?,
            environment: Self::parse_env("APP_ENV", Environment::Production)?,

            rate_limit_window: Duration::from_millis(Self::parse_env(
                "RATE_LIMIT_WINDOW_MS",
                60_000,
            )?),
            rate_limit_max_requests: Self::parse_env("RATE_LIMIT_MAX_REQUESTS", 100)?,
            rate_limit_sweep_interval: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                60,
            )?),
            trusted_proxies: Self::parse_list("TRUSTED_PROXIES"),

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Text)?,
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency.
    fn validate(&self) -> AppResult<()> {
        if self.rate_limiting_enabled() && self.rate_limit_window.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_WINDOW_MS must be greater than 0 when rate limiting is enabled"
                    .to_string(),
            ));
        }

        if self.metrics_enabled() && self.metrics_port == self.port {
            return Err(AppError::ConfigError(format!(
                "METRICS_PORT ({}) must differ from PORT",
                self.metrics_port
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_max_requests > 0
    }

    /// Limiter settings, or `None` when rate limiting is disabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::LimiterConfig` if the window is zero.
    pub fn limiter_config(&self) -> AppResult<Option<RateLimiterConfig>> {
        if !self.rate_limiting_enabled() {
            return Ok(None);
        }
        Ok(Some(RateLimiterConfig::new(
            self.rate_limit_window,
            self.rate_limit_max_requests,
        )?))
    }

    /// Check if the idle client sweep should run.
    pub fn sweep_enabled(&self) -> bool {
        self.rate_limiting_enabled() && !self.rate_limit_sweep_interval.is_zero()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address, `None` if metrics are disabled.
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping blank entries.
    fn parse_list(name: &str) -> Vec<String> {
        env::var(name)
            .map(|s| split_list(&s))
            .unwrap_or_default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            environment: Environment::Production,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 100,
            rate_limit_sweep_interval: Duration::from_secs(60),
            trusted_proxies: vec![],
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: 9090,
        }
    }
}
