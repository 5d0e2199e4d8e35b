use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::QuillError;
use crate::types::{PullRequestRef, ReviewMode};

/// Top-level configuration loaded from `.quill.toml`.
///
/// Supports layered resolution: CLI flags / env vars > local config > defaults.
/// The binary applies the upper layers; call [`QuillConfig::validate`] once
/// everything is merged.
///
/// # Examples
///
/// ```
/// use quill_core::QuillConfig;
///
/// let config = QuillConfig::default();
/// assert_eq!(config.review.language, "en");
/// assert_eq!(config.llm.max_tokens, 2000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    /// GitHub access and the pull request under review.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
}

impl QuillConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Io`] if the file cannot be read, or
    /// [`QuillError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quill_core::QuillConfig;
    /// use std::path::Path;
    ///
    /// let config = QuillConfig::from_file(Path::new(".quill.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, QuillError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use quill_core::{QuillConfig, ReviewMode};
    ///
    /// let toml = r#"
    /// [review]
    /// mode = "files"
    /// "#;
    /// let config = QuillConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.mode, ReviewMode::Files);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, QuillError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check that every required input is present and in range.
    ///
    /// Runs before any network call so a misconfigured workflow fails fast.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Config`] naming the first offending input.
    pub fn validate(&self) -> Result<(), QuillError> {
        if is_blank(self.llm.api_key.as_deref()) {
            return Err(QuillError::Config(
                "OPENAI_API_KEY is not set (input `openai_api_key`)".into(),
            ));
        }
        if is_blank(self.github.token.as_deref()) {
            return Err(QuillError::Config(
                "GITHUB_TOKEN is not set (input `github_token`)".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(QuillError::Config("model name must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(QuillError::Config(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(QuillError::Config("max_tokens must be a positive integer".into()));
        }
        if self.llm.max_retries == 0 {
            return Err(QuillError::Config("llm.max_retries must be at least 1".into()));
        }
        if self.llm.max_retry_delay_secs == 0 {
            return Err(QuillError::Config(
                "llm.max_retry_delay_secs must be a positive integer".into(),
            ));
        }
        if self.review.max_prompt_tokens == 0 {
            return Err(QuillError::Config(
                "review.max_prompt_tokens must be a positive integer".into(),
            ));
        }
        self.pull_request()?;
        Ok(())
    }

    /// Resolve the pull request under review.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Config`] if the repository or PR number is
    /// missing or malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use quill_core::QuillConfig;
    ///
    /// let mut config = QuillConfig::default();
    /// config.github.repository = Some("octocat/hello-world".into());
    /// config.github.pr_number = Some(42);
    /// assert_eq!(config.pull_request().unwrap().to_string(), "octocat/hello-world#42");
    /// ```
    pub fn pull_request(&self) -> Result<PullRequestRef, QuillError> {
        let Some(repository) = self.github.repository.as_deref() else {
            return Err(QuillError::Config(
                "GITHUB_REPOSITORY is not set (expected owner/repo)".into(),
            ));
        };
        let Some(number) = self.github.pr_number else {
            return Err(QuillError::Config(
                "GITHUB_PR_ID is not set (input `github_pr_id`)".into(),
            ));
        };
        if number == 0 {
            return Err(QuillError::Config("GITHUB_PR_ID must be positive".into()));
        }
        PullRequestRef::from_repository(repository, number)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// GitHub access configuration.
///
/// # Examples
///
/// ```
/// use quill_core::GitHubConfig;
///
/// let config = GitHubConfig::default();
/// assert!(config.reviewers.is_empty());
/// assert!(config.api_url.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Token used to read the PR and write comments.
    pub token: Option<String>,
    /// Repository slug (`owner/repo`).
    pub repository: Option<String>,
    /// Pull request number.
    pub pr_number: Option<u64>,
    /// Reviewer allow-list; empty disables the gate.
    #[serde(default)]
    pub reviewers: Vec<String>,
    /// Custom API base URL (GitHub Enterprise).
    pub api_url: Option<String>,
}

/// Model provider configuration.
///
/// # Examples
///
/// ```
/// use quill_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for an OpenAI-compatible endpoint.
    pub base_url: Option<String>,
    /// Sampling temperature (default: 0.7).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum completion tokens (default: 2000).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Retries after a rate-limited response (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds (default: 1000).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Longest wait before a retry, in seconds (default: 60). A provider
    /// asking for a longer `Retry-After` is not retried.
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_max_retry_delay_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use quill_core::{ReviewConfig, ReviewMode};
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.mode, ReviewMode::Patch);
/// assert_eq!(config.max_prompt_tokens, 8000);
/// assert!(!config.inline_file_comments);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Whether to send full files or diffs (default: patch).
    #[serde(default)]
    pub mode: ReviewMode,
    /// Language the review is written in (default: `en`).
    #[serde(default = "default_language")]
    pub language: String,
    /// Extra instructions appended to the prompt verbatim.
    pub custom_prompt: Option<String>,
    /// Prompt size above which each file is reviewed separately (default: 8000).
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,
    /// Post per-file reviews as file-level review comments (default: false).
    #[serde(default)]
    pub inline_file_comments: bool,
}

fn default_language() -> String {
    "en".into()
}

fn default_max_prompt_tokens() -> usize {
    8000
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            mode: ReviewMode::default(),
            language: default_language(),
            custom_prompt: None,
            max_prompt_tokens: default_max_prompt_tokens(),
            inline_file_comments: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> QuillConfig {
        let mut config = QuillConfig::default();
        config.llm.api_key = Some("sk-test".into());
        config.github.token = Some("ghp_test".into());
        config.github.repository = Some("octocat/hello-world".into());
        config.github.pr_number = Some(42);
        config
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = QuillConfig::default();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.llm.retry_backoff_ms, 1000);
        assert_eq!(config.llm.max_retry_delay_secs, 60);
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.review.mode, ReviewMode::Patch);
        assert_eq!(config.review.language, "en");
        assert!(config.review.custom_prompt.is_none());
        assert!(config.github.reviewers.is_empty());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[github]
repository = "octocat/hello-world"
reviewers = ["review-bot", "octocat"]

[llm]
model = "gpt-4o-mini"
base_url = "http://localhost:11434"
temperature = 0.2
max_tokens = 4096
max_retries = 5

[review]
mode = "files"
language = "pt-BR"
custom_prompt = "Focus on SQL injection"
max_prompt_tokens = 16000
inline_file_comments = true
"#;
        let config = QuillConfig::from_toml(toml).unwrap();
        assert_eq!(config.github.reviewers, vec!["review-bot", "octocat"]);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.max_retries, 5);
        assert_eq!(config.review.mode, ReviewMode::Files);
        assert_eq!(config.review.language, "pt-BR");
        assert_eq!(
            config.review.custom_prompt.as_deref(),
            Some("Focus on SQL injection")
        );
        assert_eq!(config.review.max_prompt_tokens, 16000);
        assert!(config.review.inline_file_comments);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = QuillConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.review.mode, ReviewMode::Patch);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(QuillConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn unknown_mode_in_toml_is_rejected() {
        let result = QuillConfig::from_toml("[review]\nmode = \"both\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".quill.toml");
        std::fs::write(&path, "[llm]\nmodel = \"gpt-4.1\"\n").unwrap();
        let config = QuillConfig::from_file(&path).unwrap();
        assert_eq!(config.llm.model, "gpt-4.1");
    }

    #[test]
    fn complete_config_validates() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let mut config = complete_config();
        config.llm.api_key = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, QuillError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn blank_api_key_is_config_error() {
        let mut config = complete_config();
        config.llm.api_key = Some("   ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_github_token_is_config_error() {
        let mut config = complete_config();
        config.github.token = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let mut config = complete_config();
        config.llm.temperature = 1.5;
        assert!(config.validate().is_err());
        config.llm.temperature = -0.1;
        assert!(config.validate().is_err());
        config.llm.temperature = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let mut config = complete_config();
        config.llm.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_retries_is_rejected() {
        let mut config = complete_config();
        config.llm.max_retries = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
        config.llm.max_retries = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_retry_delay_cap_is_rejected() {
        let mut config = complete_config();
        config.llm.max_retry_delay_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_pr_number_is_rejected() {
        let mut config = complete_config();
        config.github.pr_number = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GITHUB_PR_ID"));
    }

    #[test]
    fn malformed_repository_is_rejected() {
        let mut config = complete_config();
        config.github.repository = Some("hello-world".into());
        assert!(config.validate().is_err());
    }
}
