//! Pipeline configuration.
//!
//! Values start from [`PipelineConfig::default`], are overridden by `RESERVATION_*`
//! environment variables, and finally by command-line flags in `main`.

use std::time::Duration;

use thiserror::Error;

use crate::services::ai::{RateLimit, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidEnvOverride { key: String, value: String },

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// `openai`, `deepseek` or `custom` (requires `base_url`).
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            api_key: String::new(),
            base_url: None,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Items dispatched concurrently per group.
    pub batch_size: usize,
    /// Pause between groups.
    pub batch_delay: Duration,

    /// Total attempts per request, first try included.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,

    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_cooldown: Duration,

    pub request_timeout: Duration,

    pub provider: ProviderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_secs(6),
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            rate_limit_requests: 50,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_cooldown: Duration::from_secs(20),
            request_timeout: Duration::from_secs(60),
            provider: ProviderConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(read_env)?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RESERVATION_BATCH_SIZE") {
            self.batch_size = parse_num("RESERVATION_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_BATCH_DELAY_SECS") {
            self.batch_delay = parse_secs("RESERVATION_BATCH_DELAY_SECS", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_MAX_RETRIES") {
            self.max_retries = parse_num("RESERVATION_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_INITIAL_DELAY_SECS") {
            self.initial_delay = parse_secs("RESERVATION_INITIAL_DELAY_SECS", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_MAX_DELAY_SECS") {
            self.max_delay = parse_secs("RESERVATION_MAX_DELAY_SECS", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_RATE_LIMIT_REQUESTS") {
            self.rate_limit_requests = parse_num("RESERVATION_RATE_LIMIT_REQUESTS", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit_window = parse_secs("RESERVATION_RATE_LIMIT_WINDOW_SECS", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_RATE_LIMIT_COOLDOWN_SECS") {
            self.rate_limit_cooldown = parse_secs("RESERVATION_RATE_LIMIT_COOLDOWN_SECS", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = parse_secs("RESERVATION_REQUEST_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = lookup("RESERVATION_PROVIDER") {
            self.provider.provider = v.trim().to_lowercase();
        }
        if let Some(v) = lookup("RESERVATION_MODEL") {
            self.provider.model = v.trim().to_string();
        }
        if let Some(v) = lookup("RESERVATION_BASE_URL") {
            self.provider.base_url = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("RESERVATION_TEMPERATURE") {
            self.provider.temperature = parse_num("RESERVATION_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("RESERVATION_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.provider.api_key = v.trim().to_string();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Validation(
                "max_retries must allow at least one attempt".to_string(),
            ));
        }
        if self.rate_limit_requests == 0 {
            return Err(ConfigError::Validation(
                "rate_limit_requests must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit_window.is_zero() {
            return Err(ConfigError::Validation(
                "rate_limit_window must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::Validation(
                "initial_delay must not exceed max_delay".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Validation(
                "temperature must be in range 0..=2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
        }
    }

    pub fn rate_limit(&self) -> RateLimit {
        RateLimit {
            max_requests: self.rate_limit_requests,
            window: self.rate_limit_window,
            cooldown: self.rate_limit_cooldown,
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Seconds, fractional allowed.
pub fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse_num(key, value)?;
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
