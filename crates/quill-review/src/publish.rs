use std::io::Write;

use async_trait::async_trait;
use quill_core::{Comment, QuillError, ReviewMode, ReviewResult};

use crate::ports::CommentPublisher;

/// Render the comment body for one review result.
///
/// The header names the model, mode and temperature so readers can tell how
/// the feedback was produced. Per-file results also name the file.
///
/// # Examples
///
/// ```
/// use quill_core::{ReviewMode, ReviewResult};
/// use quill_review::publish::format_comment_body;
///
/// let result = ReviewResult {
///     body: "Looks good.".into(),
///     paths: vec!["src/lib.rs".into()],
///     model: "gpt-4o".into(),
/// };
/// let body = format_comment_body(&result, ReviewMode::Patch, 0.7, false);
/// assert!(body.starts_with("**Model:** gpt-4o | **Mode:** patch | **Temperature:** 0.7"));
/// assert!(body.ends_with("Looks good."));
/// ```
pub fn format_comment_body(
    result: &ReviewResult,
    mode: ReviewMode,
    temperature: f32,
    per_file: bool,
) -> String {
    let mut body = format!(
        "**Model:** {} | **Mode:** {mode} | **Temperature:** {temperature}\n",
        result.model
    );
    if per_file {
        if let [path] = result.paths.as_slice() {
            body.push_str(&format!("**File:** `{}`\n", path.display()));
        }
    }
    body.push('\n');
    body.push_str(result.body.trim_end());
    body
}

/// Where [`PrintPublisher`] writes comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintTarget {
    /// Standard output.
    Stdout,
    /// Standard error, leaving stdout free for machine-readable output.
    Stderr,
}

/// Prints comments instead of posting them (`--dry-run`).
#[derive(Debug, Clone, Copy)]
pub struct PrintPublisher {
    target: PrintTarget,
}

impl PrintPublisher {
    pub fn new(target: PrintTarget) -> Self {
        Self { target }
    }
}

fn write_comment(out: &mut impl Write, comment: &Comment) -> std::io::Result<()> {
    match &comment.anchor {
        Some(anchor) => writeln!(
            out,
            "--- review comment for {} on {} ---",
            comment.pr,
            anchor.path.display()
        )?,
        None => writeln!(out, "--- comment for {} ---", comment.pr)?,
    }
    writeln!(out, "{}\n", comment.body)
}

#[async_trait]
impl CommentPublisher for PrintPublisher {
    async fn publish(&self, comment: &Comment) -> Result<(), QuillError> {
        match self.target {
            PrintTarget::Stdout => write_comment(&mut std::io::stdout().lock(), comment)?,
            PrintTarget::Stderr => write_comment(&mut std::io::stderr().lock(), comment)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use quill_core::PullRequestRef;

    use super::*;

    fn result(paths: &[&str]) -> ReviewResult {
        ReviewResult {
            body: "Consider handling the error.\n\n".into(),
            paths: paths.iter().map(PathBuf::from).collect(),
            model: "gpt-4o-mini".into(),
        }
    }

    #[test]
    fn header_lists_model_mode_and_temperature() {
        let body = format_comment_body(&result(&["a.rs", "b.rs"]), ReviewMode::Files, 0.2, false);
        assert!(body.contains("**Model:** gpt-4o-mini"));
        assert!(body.contains("**Mode:** files"));
        assert!(body.contains("**Temperature:** 0.2"));
        assert!(!body.contains("**File:**"));
    }

    #[test]
    fn per_file_body_names_the_file() {
        let body = format_comment_body(&result(&["src/db.py"]), ReviewMode::Patch, 0.7, true);
        assert!(body.contains("**File:** `src/db.py`"));
        assert!(body.ends_with("Consider handling the error."));
    }

    #[test]
    fn printed_comment_names_pr_and_file() {
        let pr = PullRequestRef::from_repository("octocat/hello-world", 1).unwrap();
        let mut out = Vec::new();
        write_comment(&mut out, &Comment::new(pr, "dry run")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "--- comment for octocat/hello-world#1 ---\ndry run\n\n"
        );
    }

    #[tokio::test]
    async fn print_publisher_accepts_comments() {
        let pr = PullRequestRef::from_repository("octocat/hello-world", 1).unwrap();
        PrintPublisher::new(PrintTarget::Stderr)
            .publish(&Comment::new(pr, "dry run"))
            .await
            .unwrap();
    }
}
