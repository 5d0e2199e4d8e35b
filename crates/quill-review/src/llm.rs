use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{LlmConfig, QuillError, ReviewRequest, ReviewResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::ports::ReviewModel;

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use quill_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this code".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use quill_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Bounded retry with linear backoff for rate-limited calls.
///
/// Every wait is capped at `max_delay`. When the provider's `Retry-After`
/// asks for longer than the cap, the call fails instead of sleeping.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use quill_review::llm::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(10));
/// assert_eq!(policy.delay(1, None), Duration::from_millis(500));
/// assert_eq!(policy.delay(2, None), Duration::from_millis(1000));
/// assert_eq!(policy.delay(1, Some(5)), Duration::from_secs(5));
/// assert_eq!(policy.delay(1, Some(86_400)), Duration::from_secs(10));
/// assert!(policy.exceeds_cap(Some(86_400)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` retries after the first attempt,
    /// with waits capped at 60 seconds.
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Replace the cap on a single wait.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `attempt` (1-based), never shorter than the
    /// provider's `Retry-After` and never longer than the cap.
    pub fn delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let linear = self.base_backoff.saturating_mul(attempt);
        let wanted = match retry_after_secs {
            Some(secs) => linear.max(Duration::from_secs(secs)),
            None => linear,
        };
        wanted.min(self.max_delay)
    }

    /// Whether the provider asked for a wait longer than the cap.
    pub fn exceeds_cap(&self, retry_after_secs: Option<u64>) -> bool {
        retry_after_secs.is_some_and(|secs| Duration::from_secs(secs) > self.max_delay)
    }

    /// Run `op`, retrying while it fails with a retryable error.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable one once
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, QuillError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QuillError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(QuillError::RateLimited {
                    message,
                    retry_after,
                }) if attempt < self.max_retries && !self.exceeds_cap(retry_after) => {
                    attempt += 1;
                    let delay = self.delay(attempt, retry_after);
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited by model provider, retrying: {message}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(QuillError::RateLimited {
                    message,
                    retry_after: Some(secs),
                }) if self.exceeds_cap(Some(secs)) => {
                    tracing::warn!(
                        retry_after_secs = secs,
                        max_delay_secs = self.max_delay.as_secs(),
                        "rate limit wait exceeds the retry cap, giving up"
                    );
                    return Err(QuillError::RateLimited {
                        message,
                        retry_after: Some(secs),
                    });
                }
                other => return other,
            }
        }
    }
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Azure-style proxies, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use quill_core::LlmConfig;
/// use quill_review::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.model(), "gpt-4o");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Auth`] if no API key is configured, or
    /// [`QuillError::Model`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, QuillError> {
        if config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(QuillError::Auth("no API key configured".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuillError::Model(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_backoff_ms),
            )
            .with_max_delay(Duration::from_secs(config.max_retry_delay_secs)),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    /// Send one chat completion request and return the text response.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Auth`] on 401/403, [`QuillError::RateLimited`]
    /// on 429, and [`QuillError::Model`] on any other failure.
    pub async fn complete(&self, request: &ReviewRequest) -> Result<String, QuillError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: Role::User,
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut http = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            http = http.bearer_auth(api_key);
        }

        let response = http
            .json(&body)
            .send()
            .await
            .map_err(|e| QuillError::Model(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body_text, retry_after));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QuillError::Model(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                QuillError::Model(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl ReviewModel for LlmClient {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewResult, QuillError> {
        tracing::info!(
            model = %request.model,
            files = request.paths.len(),
            "requesting review"
        );
        let body = self.retry.run(|| self.complete(request)).await?;
        Ok(ReviewResult {
            body,
            paths: request.paths.clone(),
            model: request.model.clone(),
        })
    }
}

fn classify_failure(status: StatusCode, body: &str, retry_after: Option<u64>) -> QuillError {
    let detail = provider_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            QuillError::Auth(format!("{status}: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS => QuillError::RateLimited {
            message: format!("{status}: {detail}"),
            retry_after,
        },
        _ => QuillError::Model(format!("LLM API error {status}: {detail}")),
    }
}

fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
