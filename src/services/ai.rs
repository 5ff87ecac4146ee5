use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rand::{thread_rng, Rng};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, warn};

use crate::config::{ConfigError, PipelineConfig, ProviderConfig};
use crate::error::ServiceError;

const SYSTEM_PROMPT: &str = "You are a restaurant reservation specialist. You manage bookings, \
handle special requests, and make sure dietary requirements are noted.";

/// Remote text-completion capability.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

fn endpoint_for(provider: &str, base_url: Option<&str>) -> Result<String, ConfigError> {
    match provider {
        "openai" => Ok("https://api.openai.com/v1/chat/completions".into()),
        "deepseek" => Ok("https://api.deepseek.com/v1/chat/completions".into()),
        "custom" => base_url
            .map(|url| format!("{}/chat/completions", url.trim_end_matches('/')))
            .ok_or_else(|| ConfigError::Validation("provider `custom` requires a base URL".into())),
        other => Err(ConfigError::Validation(format!(
            "unsupported provider `{other}`"
        ))),
    }
}

/// OpenAI-compatible chat-completions provider.
pub struct HttpProvider {
    client: Client,
    name: String,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl HttpProvider {
    pub fn new(cfg: &ProviderConfig) -> Result<Self, ConfigError> {
        if cfg.api_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "an API key is required (RESERVATION_API_KEY or OPENAI_API_KEY)".into(),
            ));
        }
        if cfg.model.trim().is_empty() {
            return Err(ConfigError::Validation("model is required".into()));
        }

        let endpoint = endpoint_for(&cfg.provider, cfg.base_url.as_deref())?;

        // Per-attempt deadlines are enforced by RequestClient.
        let client = Client::builder()
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            name: cfg.provider.clone(),
            endpoint,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();

        // Read as text first so an error body survives a failed JSON parse.
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        if !status.is_success() {
            let message = extract_error_message(status, &text);
            return Err(if should_retry_http(status) {
                ServiceError::Transient(message)
            } else {
                ServiceError::NonTransient(message)
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|_| ServiceError::Transient("invalid JSON from provider".into()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| {
                ServiceError::Transient(
                    "invalid provider response: missing choices[0].message.content".into(),
                )
            })
    }
}

fn classify_transport(err: reqwest::Error) -> ServiceError {
    if err.is_builder() {
        ServiceError::NonTransient(err.to_string())
    } else {
        ServiceError::Transient(err.to_string())
    }
}

fn should_retry_http(status: StatusCode) -> bool {
    // 408/429/5xx are usually temporary
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // Common shapes: { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
    }

    let trimmed = body_text.trim();
    let snippet = match trimmed.char_indices().nth(400) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    };

    format!("HTTP {}: {}", status.as_u16(), snippet)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 50,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(20),
        }
    }
}

/// Returned by [`RateWindow::try_acquire`] when the window is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttled {
    pub window_start: Instant,
    pub cooldown: Duration,
}

/// Request count within the current fixed window.
#[derive(Debug)]
pub struct RateWindow {
    limit: RateLimit,
    window_start: Instant,
    count: u32,
}

impl RateWindow {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Counts one request if the window has room, otherwise reports which window was full
    /// and how long to cool down.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Throttled> {
        if now.duration_since(self.window_start) >= self.limit.window {
            self.reset(now);
        }

        if self.count < self.limit.max_requests {
            self.count += 1;
            Ok(())
        } else {
            Err(Throttled {
                window_start: self.window_start,
                cooldown: self.limit.cooldown,
            })
        }
    }

    /// Starts a fresh window only if the full window seen by `throttled` is still current.
    /// A window some other waiter already reset and refilled is left alone.
    pub fn reset_if_stale(&mut self, throttled: &Throttled, now: Instant) {
        if self.window_start == throttled.window_start && self.count >= self.limit.max_requests {
            self.reset(now);
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// A rate window shared by several clients. Each `RequestClient` gets its own by default.
#[derive(Debug, Clone)]
pub struct SharedRateWindow(Arc<Mutex<RateWindow>>);

impl SharedRateWindow {
    pub fn new(limit: RateLimit) -> Self {
        Self(Arc::new(Mutex::new(RateWindow::new(limit))))
    }

    fn lock(&self) -> MutexGuard<'_, RateWindow> {
        // The window holds two plain counters; a poisoned lock is still usable.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits until a request may be issued. The lock is never held across a sleep.
    pub async fn acquire(&self) {
        loop {
            let throttled = match self.lock().try_acquire(Instant::now()) {
                Ok(()) => return,
                Err(throttled) => throttled,
            };

            warn!(
                cooldown_secs = throttled.cooldown.as_secs_f64(),
                "local rate limit reached, cooling down"
            );
            sleep(throttled.cooldown).await;
            self.lock().reset_if_stale(&throttled, Instant::now());
        }
    }

    pub fn count(&self) -> u32 {
        self.lock().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based) without jitter:
    /// `min(initial_delay * 2^(retry - 1), max_delay)`.
    pub fn backoff_base(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// `backoff_base` plus 0-10% jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.backoff_base(retry);
        let jitter: f64 = thread_rng().gen_range(0.0..=0.1);
        base + base.mul_f64(jitter)
    }
}

/// Issues prompts to a provider under a local rate limit, a per-attempt timeout and
/// retry with exponential backoff. The only component that performs network I/O.
pub struct RequestClient {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    request_timeout: Duration,
    rate: SharedRateWindow,
}

impl RequestClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        retry: RetryPolicy,
        rate_limit: RateLimit,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            retry,
            request_timeout,
            rate: SharedRateWindow::new(rate_limit),
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &PipelineConfig) -> Self {
        Self::new(
            provider,
            config.retry_policy(),
            config.rate_limit(),
            config.request_timeout,
        )
    }

    /// Replaces this client's own window with one shared across clients.
    pub fn with_shared_rate_window(mut self, rate: SharedRateWindow) -> Self {
        self.rate = rate;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn rate_window(&self) -> &SharedRateWindow {
        &self.rate
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.rate.acquire().await;

            let result = match timeout(self.request_timeout, self.provider.complete(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Transient(format!(
                    "request timed out after {}s",
                    self.request_timeout.as_secs_f64()
                ))),
            };

            match result {
                Ok(text) => {
                    debug!(provider = self.provider.name(), attempt, "request succeeded");
                    return Ok(text);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(ServiceError::Transient(last)) => {
                    error!(
                        provider = self.provider.name(),
                        attempts = attempt,
                        error = %last,
                        "retries exhausted"
                    );
                    return Err(ServiceError::Exhausted {
                        attempts: attempt,
                        last,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
