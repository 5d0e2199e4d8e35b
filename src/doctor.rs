use std::path::Path;

use miette::{IntoDiagnostic, Result};
use quill_core::QuillConfig;
use quill_review::pipeline::ReviewerGate;

use crate::{load_config, ReviewArgs, CONFIG_FILE};

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn collect_checks(config_path: Option<&Path>, args: &ReviewArgs) -> Vec<CheckResult> {
    let mut checks = Vec::new();

    // Config file
    let path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    let mut config = match load_config(config_path) {
        Ok(config) => {
            if path.exists() {
                checks.push(CheckResult::pass(
                    "config_file",
                    format!("{} found", path.display()),
                ));
            } else {
                checks.push(CheckResult::info(
                    "config_file",
                    format!("{} not found, using defaults", path.display()),
                ));
            }
            config
        }
        Err(e) => {
            checks.push(CheckResult::fail(
                "config_file",
                e.to_string(),
                format!("fix {} or run 'quill init' in a clean directory", path.display()),
            ));
            QuillConfig::default()
        }
    };

    if let Err(e) = args.apply(&mut config) {
        checks.push(CheckResult::fail(
            "inputs",
            e.to_string(),
            "check the action inputs and environment variables",
        ));
        return checks;
    }

    if is_set(config.llm.api_key.as_deref()) {
        checks.push(CheckResult::pass("openai_api_key", "OPENAI_API_KEY set"));
    } else {
        checks.push(CheckResult::fail(
            "openai_api_key",
            "OPENAI_API_KEY not set",
            "add the secret and pass it as `openai_api_key`",
        ));
    }

    if is_set(config.github.token.as_deref()) {
        checks.push(CheckResult::pass("github_token", "GitHub token set"));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "GITHUB_TOKEN not set",
            "pass ${{ secrets.GITHUB_TOKEN }} as `github_token`",
        ));
    }

    match config.pull_request() {
        Ok(pr) => checks.push(CheckResult::pass("pull_request", pr.to_string())),
        Err(e) => checks.push(CheckResult::fail(
            "pull_request",
            e.to_string(),
            "set GITHUB_REPOSITORY and GITHUB_PR_ID",
        )),
    }

    let model = format!(
        "{} (temperature {}, max tokens {})",
        config.llm.model, config.llm.temperature, config.llm.max_tokens
    );
    let mut params = config.clone();
    params.llm.api_key = Some("set".into());
    params.github.token = Some("set".into());
    params.github.repository = Some("owner/repo".into());
    params.github.pr_number = Some(1);
    match params.validate() {
        Ok(()) => checks.push(CheckResult::pass("model", model)),
        Err(e) => checks.push(CheckResult::fail(
            "model",
            e.to_string(),
            "adjust openai_model, openai_temperature or openai_max_tokens",
        )),
    }

    checks.push(CheckResult::info(
        "review",
        format!(
            "mode {}, language {}, custom prompt {}",
            config.review.mode,
            config.review.language,
            if config.review.custom_prompt.is_some() { "set" } else { "not set" }
        ),
    ));

    let gate = ReviewerGate::from_list(&config.github.reviewers);
    if gate.is_active() {
        checks.push(CheckResult::info(
            "reviewer_gate",
            format!("reviews only when {} is on the PR", gate.logins().join(", ")),
        ));
    } else {
        checks.push(CheckResult::info("reviewer_gate", "off, every run reviews"));
    }

    checks
}

/// Report configuration problems without touching the network.
pub fn run_doctor(config_path: Option<&Path>, args: &ReviewArgs, json: bool) -> Result<()> {
    let checks = collect_checks(config_path, args);
    let version = env!("CARGO_PKG_VERSION");

    if json {
        let report = serde_json::json!({
            "version": version,
            "checks": checks,
        });
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        println!("quill v{version} - environment check\n");
        for check in &checks {
            let label = check.name.replace('_', " ");
            println!("  {} {label:<16} {}", check.symbol(), check.detail);
            if let Some(hint) = &check.hint {
                println!("    hint: {hint}");
            }
        }
        let passed = checks.iter().filter(|c| c.status == "pass").count();
        let failed = checks.iter().filter(|c| c.status == "fail").count();
        let info = checks.iter().filter(|c| c.status == "info").count();
        println!("\n{passed} checks passed, {failed} failed, {info} info");
    }

    let failed = checks.iter().filter(|c| c.status == "fail").count();
    if failed > 0 {
        miette::bail!("{failed} check(s) failed");
    }
    Ok(())
}
