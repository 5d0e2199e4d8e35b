use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use quill_core::{QuillConfig, QuillError, ReviewMode};
use quill_review::github::GitHubClient;
use quill_review::llm::LlmClient;
use quill_review::pipeline::{ReviewOutcome, ReviewPipeline};
use quill_review::ports::CommentPublisher;
use quill_review::publish::{PrintPublisher, PrintTarget};

mod doctor;
mod logging;

const CONFIG_FILE: &str = ".quill.toml";

#[derive(Parser)]
#[command(
    name = "quill",
    version,
    about = "LLM pull request reviewer for GitHub Actions",
    long_about = "Quill sends the changes of a GitHub pull request to an OpenAI-compatible\n\
                   model and posts the feedback back on the pull request.\n\n\
                   Every input can come from a flag, an environment variable (as set by the\n\
                   action's `with:` inputs), or .quill.toml.\n\n\
                   Examples:\n  \
                     quill review                             Review $GITHUB_PR_ID in $GITHUB_REPOSITORY\n  \
                     quill review --pr 42 --mode files        Review full file contents of PR #42\n  \
                     quill review --dry-run                   Print the review instead of posting it\n  \
                     quill doctor                             Check configuration without network calls"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .quill.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull request and post the feedback as comments
    #[command(long_about = "Review a pull request and post the feedback as comments.\n\n\
        Fetches the PR changes (full files or per-file diffs), asks the model for a\n\
        review, and posts one comment. Large pull requests are reviewed file by file.\n\
        Exits 0 when the reviewer gate does not match or there is nothing to review.\n\n\
        Examples:\n  quill review\n  quill review --repo octocat/hello-world --pr 42 --mode patch\n  quill review --reviewer review-bot --inline-file-comments")]
    Review(ReviewArgs),
    /// Create a default .quill.toml configuration file
    #[command(long_about = "Create a default .quill.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .quill.toml already exists.")]
    Init,
    /// Check configuration and environment without calling any API
    #[command(long_about = "Check configuration and environment without calling any API.\n\n\
        Resolves flags, environment variables and .quill.toml exactly like `review`\n\
        and reports which required inputs are missing or invalid. Use --format json\n\
        for machine-readable output.")]
    Doctor(ReviewArgs),
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// Machine-readable JSON with camelCase keys
    Json,
}

/// Review inputs. Values are taken as strings so that empty workflow inputs
/// (exported as empty env vars) fall back to the configured defaults.
#[derive(Args, Debug, Default, Clone)]
struct ReviewArgs {
    /// API key for the model provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// GitHub token with pull-requests write permission
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, env = "GH_TOKEN", hide = true, hide_env_values = true)]
    gh_token: Option<String>,

    /// Repository slug (owner/repo)
    #[arg(long = "repo", env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Pull request number
    #[arg(long = "pr", env = "GITHUB_PR_ID")]
    pr_number: Option<String>,

    /// Only review when one of these logins is requested, assigned, or the latest reviewer (comma-separated)
    #[arg(long, env = "GITHUB_REVIEWER")]
    reviewer: Option<String>,

    /// Model identifier (default: gpt-4o)
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Sampling temperature between 0.0 and 1.0 (default: 0.7)
    #[arg(long, env = "OPENAI_TEMPERATURE")]
    temperature: Option<String>,

    /// Maximum completion tokens (default: 2000)
    #[arg(long, env = "OPENAI_MAX_TOKENS")]
    max_tokens: Option<String>,

    /// Review mode: files or patch (default: patch)
    #[arg(long, env = "MODE")]
    mode: Option<String>,

    /// Language code the review is written in (default: en)
    #[arg(long, env = "LANGUAGE")]
    language: Option<String>,

    /// Extra instructions prepended to the code, passed through verbatim
    #[arg(long, env = "CUSTOM_PROMPT")]
    custom_prompt: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// GitHub API base URL (GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL")]
    github_api_url: Option<String>,

    /// Prompt size in tokens above which each file is reviewed separately (default: 8000)
    #[arg(long)]
    max_prompt_tokens: Option<usize>,

    /// Post per-file reviews as file-level review comments
    #[arg(long)]
    inline_file_comments: bool,

    /// Print the comments to stdout instead of posting them
    #[arg(long)]
    dry_run: bool,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_input<T: FromStr>(name: &str, value: &str, expected: &str) -> Result<T, QuillError> {
    value
        .parse()
        .map_err(|_| QuillError::Config(format!("{name} must be {expected}, got '{value}'")))
}

impl ReviewArgs {
    /// Layer flags and environment variables over the file configuration.
    fn apply(&self, config: &mut QuillConfig) -> Result<(), QuillError> {
        if let Some(key) = non_empty(&self.openai_api_key) {
            config.llm.api_key = Some(key.to_string());
        }
        if let Some(token) = non_empty(&self.github_token).or(non_empty(&self.gh_token)) {
            config.github.token = Some(token.to_string());
        }
        if let Some(repository) = non_empty(&self.repository) {
            config.github.repository = Some(repository.to_string());
        }
        if let Some(pr) = non_empty(&self.pr_number) {
            config.github.pr_number =
                Some(parse_input("GITHUB_PR_ID", pr, "a positive integer")?);
        }
        if let Some(reviewer) = non_empty(&self.reviewer) {
            config.github.reviewers = reviewer
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = non_empty(&self.github_api_url) {
            config.github.api_url = Some(url.to_string());
        }
        if let Some(model) = non_empty(&self.model) {
            config.llm.model = model.to_string();
        }
        if let Some(temperature) = non_empty(&self.temperature) {
            config.llm.temperature = parse_input(
                "OPENAI_TEMPERATURE",
                temperature,
                "a number between 0.0 and 1.0",
            )?;
        }
        if let Some(max_tokens) = non_empty(&self.max_tokens) {
            config.llm.max_tokens =
                parse_input("OPENAI_MAX_TOKENS", max_tokens, "a positive integer")?;
        }
        if let Some(url) = non_empty(&self.openai_base_url) {
            config.llm.base_url = Some(url.to_string());
        }
        if let Some(mode) = non_empty(&self.mode) {
            config.review.mode = ReviewMode::from_str(mode)
                .map_err(|e| QuillError::Config(format!("MODE: {e}")))?;
        }
        if let Some(language) = non_empty(&self.language) {
            config.review.language = language.to_string();
        }
        if non_empty(&self.custom_prompt).is_some() {
            config.review.custom_prompt = self.custom_prompt.clone();
        }
        if let Some(max_prompt_tokens) = self.max_prompt_tokens {
            config.review.max_prompt_tokens = max_prompt_tokens;
        }
        if self.inline_file_comments {
            config.review.inline_file_comments = true;
        }
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<QuillConfig, QuillError> {
    match path {
        Some(path) => QuillConfig::from_file(path),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                QuillConfig::from_file(default_path)
            } else {
                Ok(QuillConfig::default())
            }
        }
    }
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mquill\x1b[0m v{version} - LLM pull request reviewer\n");
        println!("Quick start:");
        println!("  \x1b[36mquill init\x1b[0m      Create a .quill.toml config file");
        println!("  \x1b[36mquill doctor\x1b[0m    Check your configuration");
        println!("  \x1b[36mquill review\x1b[0m    Review the pull request in $GITHUB_PR_ID\n");
    } else {
        println!("quill v{version} - LLM pull request reviewer\n");
        println!("Quick start:");
        println!("  quill init      Create a .quill.toml config file");
        println!("  quill doctor    Check your configuration");
        println!("  quill review    Review the pull request in $GITHUB_PR_ID\n");
    }

    println!("Run 'quill <command> --help' for details.");
}

async fn run_review(config: QuillConfig, dry_run: bool, format: OutputFormat) -> Result<()> {
    config.validate()?;
    let pr = config.pull_request()?;

    let github = Arc::new(GitHubClient::new(&config.github)?);
    let llm = Arc::new(LlmClient::new(&config.llm)?);
    let publisher: Arc<dyn CommentPublisher> = if dry_run {
        let target = match format {
            OutputFormat::Json => PrintTarget::Stderr,
            OutputFormat::Text => PrintTarget::Stdout,
        };
        Arc::new(PrintPublisher::new(target))
    } else {
        github.clone()
    };

    tracing::info!(
        %pr,
        mode = %config.review.mode,
        model = %config.llm.model,
        temperature = config.llm.temperature,
        max_tokens = config.llm.max_tokens,
        language = %config.review.language,
        dry_run,
        "starting quill review"
    );

    let pipeline = ReviewPipeline::new(github, llm, publisher, &config);
    let outcome = pipeline.run(&pr).await?;

    match &outcome {
        ReviewOutcome::Skipped { reason } => tracing::info!(%pr, "no review posted: {reason}"),
        ReviewOutcome::Reviewed(summary) => tracing::info!(%pr, "{summary}"),
    }
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).into_diagnostic()?
        );
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Quill Configuration
# Flags and environment variables (action inputs) override these values.

[github]
# repository = "owner/repo"          # GITHUB_REPOSITORY
# reviewers = ["review-bot"]         # GITHUB_REVIEWER, empty disables the gate
# api_url = "https://api.github.com" # GITHUB_API_URL

[llm]
# model = "gpt-4o"                   # OPENAI_MODEL
# base_url = "https://api.openai.com"  # OPENAI_BASE_URL
# temperature = 0.7                  # OPENAI_TEMPERATURE
# max_tokens = 2000                  # OPENAI_MAX_TOKENS
# max_retries = 3
# retry_backoff_ms = 1000
# timeout_secs = 120

[review]
# mode = "patch"                     # MODE: "files" or "patch"
# language = "en"                    # LANGUAGE
# custom_prompt = ""                 # CUSTOM_PROMPT
# max_prompt_tokens = 8000
# inline_file_comments = false
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(false)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match cli.command {
        None => {
            print_welcome(std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err());
        }
        Some(Command::Review(args)) => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply(&mut config)?;
            run_review(config, args.dry_run, cli.format).await?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor(args)) => {
            doctor::run_doctor(cli.config.as_deref(), &args, cli.format == OutputFormat::Json)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quill", &mut std::io::stdout());
        }
    }

    Ok(())
}
