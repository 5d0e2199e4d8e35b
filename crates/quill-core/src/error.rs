use std::path::PathBuf;

/// Errors that can occur while reviewing a pull request.
///
/// Each variant maps to one failure of the review pipeline. Library crates
/// use this type directly; the binary renders it through `miette`.
///
/// # Examples
///
/// ```
/// use quill_core::QuillError;
///
/// let err = QuillError::Config("OPENAI_API_KEY is not set".into());
/// assert!(err.to_string().contains("OPENAI_API_KEY"));
/// assert!(!err.is_soft());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum QuillError {
    /// Missing or invalid required input, detected before any network call.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(quill::config),
        help("set the value through the action inputs, an env var, or .quill.toml")
    )]
    Config(String),

    /// The hosting platform could not be reached or the PR does not exist.
    #[error("source unavailable: {0}")]
    #[diagnostic(code(quill::source_unavailable))]
    SourceUnavailable(String),

    /// The pull request has no reviewable changes.
    #[error("pull request has no reviewable changes")]
    #[diagnostic(code(quill::empty_change_set))]
    EmptyChangeSet,

    /// A single changed item does not fit the prompt token budget.
    #[error("{} is too large to review: ~{estimated} tokens (limit {limit})", .path.display())]
    #[diagnostic(
        code(quill::content_too_large),
        help("raise review.max_prompt_tokens or switch to patch mode")
    )]
    ContentTooLarge {
        /// File whose prompt exceeded the budget.
        path: PathBuf,
        /// Estimated prompt size in tokens.
        estimated: usize,
        /// Configured limit in tokens.
        limit: usize,
    },

    /// The model provider rejected the API key.
    #[error("authentication failed: {0}")]
    #[diagnostic(code(quill::auth), help("check the OPENAI_API_KEY secret"))]
    Auth(String),

    /// The model provider throttled the request.
    #[error("rate limited by model provider: {message}")]
    #[diagnostic(code(quill::rate_limited))]
    RateLimited {
        /// Provider error text.
        message: String,
        /// Seconds to wait, from the `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// Any other model API or response failure.
    #[error("model error: {0}")]
    #[diagnostic(code(quill::model))]
    Model(String),

    /// The platform rejected a comment.
    #[error("failed to publish comment: {0}")]
    #[diagnostic(
        code(quill::publish),
        help("the token needs `pull-requests: write` permission")
    )]
    Publish(String),

    /// Malformed unified diff from the platform.
    #[error("parse error: {0}")]
    #[diagnostic(code(quill::parse))]
    Parse(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl QuillError {
    /// Whether this error ends the run successfully instead of failing it.
    ///
    /// # Examples
    ///
    /// ```
    /// use quill_core::QuillError;
    ///
    /// assert!(QuillError::EmptyChangeSet.is_soft());
    /// assert!(!QuillError::Model("boom".into()).is_soft());
    /// ```
    pub fn is_soft(&self) -> bool {
        matches!(self, QuillError::EmptyChangeSet)
    }

    /// Whether the failed call may be retried after a backoff.
    ///
    /// Only provider throttling qualifies.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuillError::RateLimited { .. })
    }
}
