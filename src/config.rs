//! Process configuration from the environment.
//!
//! Credentials are required and their absence is a startup-fatal
//! configuration error. Everything else carries a default tuned against the
//! live terminal, overridable per deployment.

use crate::backoff::BackoffPolicy;
use crate::error::StreamError;
use std::time::Duration;

/// Entry page of the trading terminal. Fixed for this producer.
pub const ENTRY_URL: &str = "https://trader.tradovate.com/welcome";

/// Default pub/sub channel for published snapshots.
pub const DEFAULT_CHANNEL: &str = "NQH5_PRICESTREAM";

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Terminal account identifier.
    pub username: String,
    /// Terminal account secret.
    pub password: String,
    /// Pub/sub channel snapshots are published to.
    pub channel: String,
    /// Run the browser without a visible window.
    pub headless: bool,
    pub redis: RedisConfig,
    pub login: LoginTuning,
    pub backoff: BackoffPolicy,
}

/// Redis connection parameters.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub tls: bool,
}

impl RedisConfig {
    /// Connection URL for the redis client.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        match &self.password {
            Some(password) => format!("{scheme}://:{password}@{}:{}", self.host, self.port),
            None => format!("{scheme}://{}:{}", self.host, self.port),
        }
    }
}

/// Timing knobs for the login flow.
///
/// The terminal is a single-page app with no readiness event exposed to the
/// automation layer. The login form is awaited by polling for its landmark
/// element; the post-submit waits remain fixed settles because no stable
/// landmark survives the workspace transition.
#[derive(Debug, Clone, Copy)]
pub struct LoginTuning {
    /// How long to poll for the login form landmark.
    pub form_wait: Duration,
    /// Settle after filling the credential fields.
    pub field_settle: Duration,
    /// Settle after submitting the login form.
    pub submit_settle: Duration,
    /// Settle after clicking the optional workspace launch control.
    pub launch_settle: Duration,
}

impl Default for LoginTuning {
    fn default() -> Self {
        Self {
            form_wait: Duration::from_secs(15),
            field_settle: Duration::from_secs(2),
            submit_settle: Duration::from_secs(5),
            launch_settle: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `TRADOVATE_USERNAME` and `TRADOVATE_PASSWORD` are required; missing
    /// either fails with [`StreamError::Config`].
    pub fn from_env() -> Result<Self, StreamError> {
        let username = require_env("TRADOVATE_USERNAME")?;
        let password = require_env("TRADOVATE_PASSWORD")?;

        let defaults = LoginTuning::default();
        let login = LoginTuning {
            form_wait: read_env_ms("PRICESTREAM_LOGIN_WAIT_MS", defaults.form_wait),
            field_settle: read_env_ms("PRICESTREAM_FIELD_SETTLE_MS", defaults.field_settle),
            submit_settle: read_env_ms("PRICESTREAM_SUBMIT_SETTLE_MS", defaults.submit_settle),
            launch_settle: read_env_ms("PRICESTREAM_LAUNCH_SETTLE_MS", defaults.launch_settle),
        };

        let backoff_defaults = BackoffPolicy::default();
        let backoff = BackoffPolicy {
            base: read_env_ms("PRICESTREAM_BACKOFF_BASE_MS", backoff_defaults.base),
            cap: read_env_ms("PRICESTREAM_BACKOFF_CAP_MS", backoff_defaults.cap),
            max_attempts: read_env_u32("PRICESTREAM_MAX_ATTEMPTS", backoff_defaults.max_attempts)
                .max(1),
        };

        Ok(Self {
            username,
            password,
            channel: read_env_string("PRICESTREAM_CHANNEL")
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            headless: true,
            redis: RedisConfig {
                host: read_env_string("REDIS_HOST").unwrap_or_else(|| "redis".to_string()),
                port: read_env_u16("REDIS_PORT", 6379),
                password: read_env_string("REDIS_PASSWORD"),
                tls: read_env_bool("REDIS_TLS", false),
            },
            login,
            backoff,
        })
    }
}

fn require_env(name: &str) -> Result<String, StreamError> {
    match read_env_string(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(StreamError::Config(format!(
            "required environment variable {name} is not set"
        ))),
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

fn read_env_u16(name: &str, default_value: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_ms(name: &str, default_value: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default_value)
}

fn read_env_bool(name: &str, default_value: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default_value,
    }
}
