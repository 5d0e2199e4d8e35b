use std::fmt;
use std::sync::Arc;

use quill_core::{
    Comment, CommentAnchor, PullRequestRef, QuillConfig, QuillError, ReviewAssignment, ReviewMode,
    ReviewResult,
};
use serde::Serialize;

use crate::ports::{ChangeSource, CommentPublisher, ReviewModel};
use crate::prompt::PromptBuilder;
use crate::publish::format_comment_body;

/// Allow-list of reviewer logins that must be on the pull request before a
/// review runs. An empty list disables the gate.
///
/// # Examples
///
/// ```
/// use quill_core::ReviewAssignment;
/// use quill_review::pipeline::ReviewerGate;
///
/// let gate = ReviewerGate::from_list(["review-bot, ", " octocat"]);
/// assert!(gate.is_active());
///
/// let assignment = ReviewAssignment {
///     requested_reviewers: vec!["Review-Bot".into()],
///     ..ReviewAssignment::default()
/// };
/// assert!(gate.admits(&assignment));
/// assert!(ReviewerGate::default().admits(&ReviewAssignment::default()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewerGate {
    logins: Vec<String>,
}

impl ReviewerGate {
    /// Build a gate from logins; each entry may itself be comma-separated.
    pub fn from_list<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let logins = entries
            .into_iter()
            .flat_map(|e| {
                e.as_ref()
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { logins }
    }

    /// Whether any login is configured.
    pub fn is_active(&self) -> bool {
        !self.logins.is_empty()
    }

    /// Configured logins.
    pub fn logins(&self) -> &[String] {
        &self.logins
    }

    /// Whether the review may proceed for this assignment.
    pub fn admits(&self, assignment: &ReviewAssignment) -> bool {
        !self.is_active() || self.logins.iter().any(|l| assignment.includes(l))
    }
}

/// Why a run finished without posting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// None of the gate's logins is requested, assigned, or the latest reviewer.
    ReviewerNotAssigned,
    /// The pull request has nothing reviewable.
    NoChanges,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ReviewerNotAssigned => write!(f, "configured reviewer is not assigned"),
            SkipReason::NoChanges => write!(f, "pull request has no reviewable changes"),
        }
    }
}

/// Statistics about a completed review run.
///
/// # Examples
///
/// ```
/// use quill_core::ReviewMode;
/// use quill_review::pipeline::ReviewSummary;
///
/// let summary = ReviewSummary {
///     files_reviewed: 3,
///     requests_sent: 1,
///     comments_posted: 1,
///     mode: ReviewMode::Patch,
///     model_used: "gpt-4o".into(),
/// };
/// assert_eq!(summary.to_string(), "reviewed 3 file(s) in 1 request(s) with gpt-4o (patch), posted 1 comment(s)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    /// Number of changed items sent to the model.
    pub files_reviewed: usize,
    /// Number of model calls made.
    pub requests_sent: usize,
    /// Number of comments created.
    pub comments_posted: usize,
    /// Mode the review ran in.
    pub mode: ReviewMode,
    /// Model identifier used for the review.
    pub model_used: String,
}

impl fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reviewed {} file(s) in {} request(s) with {} ({}), posted {} comment(s)",
            self.files_reviewed,
            self.requests_sent,
            self.model_used,
            self.mode,
            self.comments_posted
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ReviewOutcome {
    /// Nothing was sent to the model.
    Skipped {
        /// Why the run was skipped.
        reason: SkipReason,
    },
    /// Feedback was generated and posted.
    Reviewed(ReviewSummary),
}

/// Review orchestrator that drives fetch, prompt, model, and publish once.
pub struct ReviewPipeline {
    source: Arc<dyn ChangeSource>,
    model: Arc<dyn ReviewModel>,
    publisher: Arc<dyn CommentPublisher>,
    builder: PromptBuilder,
    gate: ReviewerGate,
    mode: ReviewMode,
    inline_file_comments: bool,
    temperature: f32,
}

impl ReviewPipeline {
    /// Create a pipeline over the given ports and a validated configuration.
    pub fn new(
        source: Arc<dyn ChangeSource>,
        model: Arc<dyn ReviewModel>,
        publisher: Arc<dyn CommentPublisher>,
        config: &QuillConfig,
    ) -> Self {
        Self {
            source,
            model,
            publisher,
            builder: PromptBuilder::new(&config.llm, &config.review),
            gate: ReviewerGate::from_list(&config.github.reviewers),
            mode: config.review.mode,
            inline_file_comments: config.review.inline_file_comments,
            temperature: config.llm.temperature,
        }
    }

    /// Run the review for `pr`.
    ///
    /// Every model call completes before the first comment is posted, so a
    /// model failure leaves the pull request untouched.
    ///
    /// # Errors
    ///
    /// Propagates any fatal [`QuillError`] from the ports or the prompt
    /// builder. An empty change set is reported as a skip instead.
    pub async fn run(&self, pr: &PullRequestRef) -> Result<ReviewOutcome, QuillError> {
        let assignment = if self.gate.is_active() || self.inline_file_comments {
            Some(self.source.review_assignment(pr).await?)
        } else {
            None
        };

        if let Some(assignment) = &assignment {
            if !self.gate.admits(assignment) {
                tracing::info!(
                    %pr,
                    reviewers = ?self.gate.logins(),
                    "no configured reviewer is assigned, skipping review"
                );
                return Ok(ReviewOutcome::Skipped {
                    reason: SkipReason::ReviewerNotAssigned,
                });
            }
        }

        let items = match self.source.changed_items(pr, self.mode).await {
            Ok(items) if items.is_empty() => return Ok(self.no_changes(pr)),
            Ok(items) => items,
            Err(e) if e.is_soft() => return Ok(self.no_changes(pr)),
            Err(e) => return Err(e),
        };

        let requests = self.builder.build(&items)?;
        let per_file = requests.len() > 1;
        tracing::info!(
            %pr,
            mode = %self.mode,
            files = items.len(),
            requests = requests.len(),
            "starting review"
        );

        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            results.push(self.model.review(request).await?);
        }

        let head_sha = assignment.map(|a| a.head_sha).unwrap_or_default();
        let mut comments_posted = 0;
        for result in &results {
            let body = format_comment_body(result, self.mode, self.temperature, per_file);
            let mut comment = Comment::new(pr.clone(), body);
            if per_file && self.inline_file_comments && !head_sha.is_empty() {
                if let [path] = result.paths.as_slice() {
                    comment = comment.anchored(CommentAnchor {
                        path: path.clone(),
                        commit_sha: head_sha.clone(),
                        line: None,
                    });
                }
            }
            self.publisher.publish(&comment).await?;
            comments_posted += 1;
        }

        Ok(ReviewOutcome::Reviewed(ReviewSummary {
            files_reviewed: items.len(),
            requests_sent: requests.len(),
            comments_posted,
            mode: self.mode,
            model_used: model_used(&results),
        }))
    }

    fn no_changes(&self, pr: &PullRequestRef) -> ReviewOutcome {
        tracing::info!(%pr, mode = %self.mode, "pull request has no reviewable changes, skipping");
        ReviewOutcome::Skipped {
            reason: SkipReason::NoChanges,
        }
    }
}

fn model_used(results: &[ReviewResult]) -> String {
    results
        .first()
        .map(|r| r.model.clone())
        .unwrap_or_default()
}
