//! Seams between the orchestrator and the remote systems it drives.

use async_trait::async_trait;
use quill_core::{
    ChangedItem, Comment, PullRequestRef, Result, ReviewAssignment, ReviewMode, ReviewRequest,
    ReviewResult,
};

/// Reads pull request metadata and changes from the hosting platform.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Who is requested, assigned, or last reviewed the pull request.
    async fn review_assignment(&self, pr: &PullRequestRef) -> Result<ReviewAssignment>;

    /// Changed items of the pull request in the given mode, in platform order.
    ///
    /// Fails with `EmptyChangeSet` when nothing reviewable changed.
    async fn changed_items(&self, pr: &PullRequestRef, mode: ReviewMode)
        -> Result<Vec<ChangedItem>>;
}

/// Generates review text for a composed request.
#[async_trait]
pub trait ReviewModel: Send + Sync {
    /// Send one request and return the model's feedback.
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewResult>;
}

/// Creates comments on the pull request.
#[async_trait]
pub trait CommentPublisher: Send + Sync {
    /// Create one new comment.
    async fn publish(&self, comment: &Comment) -> Result<()>;
}
