use std::process::{Command, Output};

fn quill(dir: &std::path::Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quill"))
        .args(args)
        .env_clear()
        .envs(env.iter().copied())
        .current_dir(dir)
        .output()
        .unwrap()
}

const COMPLETE_ENV: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "sk-test"),
    ("GITHUB_TOKEN", "ghp_test"),
    ("GITHUB_REPOSITORY", "octocat/hello-world"),
    ("GITHUB_PR_ID", "42"),
];

#[test]
fn missing_api_key_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let output = quill(
        dir.path(),
        &["review"],
        &[
            ("GITHUB_TOKEN", "ghp_test"),
            ("GITHUB_REPOSITORY", "octocat/hello-world"),
            ("GITHUB_PR_ID", "42"),
            ("OPENAI_BASE_URL", "http://127.0.0.1:9"),
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
}

#[test]
fn empty_api_key_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = COMPLETE_ENV.to_vec();
    env[0] = ("OPENAI_API_KEY", "");
    let output = quill(dir.path(), &["review"], &env);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
}

#[test]
fn invalid_mode_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = COMPLETE_ENV.to_vec();
    env.push(("MODE", "everything"));
    let output = quill(dir.path(), &["review"], &env);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("MODE"));
}

#[test]
fn temperature_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = COMPLETE_ENV.to_vec();
    env.push(("OPENAI_TEMPERATURE", "1.5"));
    let output = quill(dir.path(), &["review"], &env);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("temperature"));
}

#[test]
fn doctor_reports_missing_inputs_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = quill(dir.path(), &["doctor", "--format", "json"], &[]);
    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let checks = report["checks"].as_array().unwrap();
    let api_key = checks
        .iter()
        .find(|c| c["name"] == "openai_api_key")
        .unwrap();
    assert_eq!(api_key["status"], "fail");
}

#[test]
fn doctor_passes_with_complete_env() {
    let dir = tempfile::tempdir().unwrap();
    let output = quill(dir.path(), &["doctor"], COMPLETE_ENV);
    assert!(
        output.status.success(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("octocat/hello-world#42"));
}

#[test]
fn dry_run_json_keeps_stdout_parseable() {
    let mut github = mockito::Server::new();
    let mut openai = mockito::Server::new();
    let _diff = github
        .mock("GET", "/repos/octocat/hello-world/pulls/42")
        .with_status(200)
        .with_body(
            "diff --git a/src/lib.rs b/src/lib.rs\n\
             --- a/src/lib.rs\n\
             +++ b/src/lib.rs\n\
             @@ -1 +1,2 @@\n \
             fn main() {}\n\
             +fn helper() {}\n",
        )
        .create();
    let _completion = openai
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Unused helper."}}]}"#)
        .create();
    let comment = github
        .mock("POST", "/repos/octocat/hello-world/issues/42/comments")
        .expect(0)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let github_url = github.url();
    let openai_url = openai.url();
    let mut env: Vec<(&str, &str)> = COMPLETE_ENV.to_vec();
    env.push(("GITHUB_API_URL", github_url.as_str()));
    env.push(("OPENAI_BASE_URL", openai_url.as_str()));
    let output = quill(dir.path(), &["review", "--dry-run", "--format", "json"], &env);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["outcome"], "reviewed");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unused helper."));
    comment.assert();
}
