use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuillError;

/// Identifies a pull request on the hosting platform.
///
/// # Examples
///
/// ```
/// use quill_core::PullRequestRef;
///
/// let pr: PullRequestRef = "rust-lang/rust#12345".parse().unwrap();
/// assert_eq!(pr.owner, "rust-lang");
/// assert_eq!(pr.repo, "rust");
/// assert_eq!(pr.number, 12345);
/// assert_eq!(pr.to_string(), "rust-lang/rust#12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
}

impl PullRequestRef {
    /// Build a reference from an `owner/repo` slug (as in `GITHUB_REPOSITORY`)
    /// and a PR number.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Config`] if the slug is not `owner/repo`.
    ///
    /// # Examples
    ///
    /// ```
    /// use quill_core::PullRequestRef;
    ///
    /// let pr = PullRequestRef::from_repository("octocat/hello-world", 42).unwrap();
    /// assert_eq!(pr.to_string(), "octocat/hello-world#42");
    /// assert!(PullRequestRef::from_repository("hello-world", 42).is_err());
    /// ```
    pub fn from_repository(repository: &str, number: u64) -> Result<Self, QuillError> {
        let Some((owner, repo)) = repository.trim().split_once('/') else {
            return Err(QuillError::Config(format!(
                "invalid repository '{repository}', expected owner/repo"
            )));
        };
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(QuillError::Config(format!(
                "invalid repository '{repository}', expected owner/repo"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

impl FromStr for PullRequestRef {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((owner_repo, number_str)) = s.split_once('#') else {
            return Err(QuillError::Config(format!(
                "invalid PR reference '{s}', expected owner/repo#number"
            )));
        };
        let number: u64 = number_str
            .parse()
            .map_err(|_| QuillError::Config(format!("invalid PR number: {number_str}")))?;
        Self::from_repository(owner_repo, number)
    }
}

/// Selects what the reviewer sees: full file content or only the diff.
///
/// # Examples
///
/// ```
/// use quill_core::ReviewMode;
///
/// assert_eq!("files".parse::<ReviewMode>().unwrap(), ReviewMode::Files);
/// assert_eq!(ReviewMode::default(), ReviewMode::Patch);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// Complete post-change content of every touched file.
    Files,
    /// Unified diff text per file.
    #[default]
    Patch,
}

impl fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewMode::Files => write!(f, "files"),
            ReviewMode::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for ReviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "files" => Ok(ReviewMode::Files),
            "patch" => Ok(ReviewMode::Patch),
            other => Err(format!(
                "unknown mode '{other}', choose either 'files' or 'patch'"
            )),
        }
    }
}

/// One unit of reviewable change, tagged by the mode that produced it.
///
/// # Examples
///
/// ```
/// use quill_core::{ChangedItem, ReviewMode};
/// use std::path::PathBuf;
///
/// let item = ChangedItem::Patch {
///     path: PathBuf::from("src/lib.rs"),
///     diff: "@@ -1 +1 @@\n-a\n+b\n".into(),
/// };
/// assert_eq!(item.mode(), ReviewMode::Patch);
/// assert!(item.body().contains("+b"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangedItem {
    /// Whole file at the PR head.
    File {
        /// Repository-relative path.
        path: PathBuf,
        /// Full post-change content.
        content: String,
    },
    /// Diff text for one file.
    Patch {
        /// Repository-relative path.
        path: PathBuf,
        /// Unified diff text for this file only.
        diff: String,
    },
}

impl ChangedItem {
    /// Path of the changed file.
    pub fn path(&self) -> &Path {
        match self {
            ChangedItem::File { path, .. } | ChangedItem::Patch { path, .. } => path,
        }
    }

    /// Text sent to the model for this item.
    pub fn body(&self) -> &str {
        match self {
            ChangedItem::File { content, .. } => content,
            ChangedItem::Patch { diff, .. } => diff,
        }
    }

    /// Mode this item belongs to.
    pub fn mode(&self) -> ReviewMode {
        match self {
            ChangedItem::File { .. } => ReviewMode::Files,
            ChangedItem::Patch { .. } => ReviewMode::Patch,
        }
    }
}

/// A composed prompt plus the model parameters it is sent with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Reviewer persona sent as the system message.
    pub system: String,
    /// Composed user prompt.
    pub prompt: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature in `[0.0, 1.0]`.
    pub temperature: f32,
    /// Maximum completion tokens.
    pub max_tokens: u32,
    /// Language code the review is written in.
    pub language: String,
    /// Custom instructions passed through verbatim.
    pub custom_instructions: Option<String>,
    /// Paths of the changed items covered by this request.
    pub paths: Vec<PathBuf>,
}

/// Free-text feedback returned by the model for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// Generated review text.
    pub body: String,
    /// Paths of the changed items the review covers.
    pub paths: Vec<PathBuf>,
    /// Model that produced the review.
    pub model: String,
}

/// Location a comment is attached to inside the pull request diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAnchor {
    /// File the comment refers to.
    pub path: PathBuf,
    /// Head commit the comment is made against.
    pub commit_sha: String,
    /// Line on the right side of the diff; `None` anchors to the whole file.
    pub line: Option<u32>,
}

/// A comment to create on a pull request.
///
/// # Examples
///
/// ```
/// use quill_core::{Comment, PullRequestRef};
///
/// let pr = PullRequestRef::from_repository("octocat/hello-world", 7).unwrap();
/// let comment = Comment::new(pr, "Looks good");
/// assert!(comment.anchor.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Pull request the comment is posted on.
    pub pr: PullRequestRef,
    /// Markdown body.
    pub body: String,
    /// Optional file/line anchor.
    pub anchor: Option<CommentAnchor>,
}

impl Comment {
    /// Create a conversation-level comment.
    pub fn new(pr: PullRequestRef, body: impl Into<String>) -> Self {
        Self {
            pr,
            body: body.into(),
            anchor: None,
        }
    }

    /// Attach the comment to a file or line.
    pub fn anchored(mut self, anchor: CommentAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

/// Who is assigned to review a pull request.
///
/// # Examples
///
/// ```
/// use quill_core::ReviewAssignment;
///
/// let assignment = ReviewAssignment {
///     requested_reviewers: vec!["octocat".into()],
///     assignees: vec![],
///     latest_reviewer: None,
///     head_sha: "abc123".into(),
/// };
/// assert!(assignment.includes("OctoCat"));
/// assert!(!assignment.includes("hubot"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAssignment {
    /// Logins with a pending review request.
    pub requested_reviewers: Vec<String>,
    /// Logins assigned to the pull request.
    pub assignees: Vec<String>,
    /// Author of the most recently submitted review.
    pub latest_reviewer: Option<String>,
    /// Head commit of the pull request.
    pub head_sha: String,
}

impl ReviewAssignment {
    /// Whether `login` is requested, assigned, or authored the latest review.
    ///
    /// Logins compare case-insensitively, as on GitHub.
    pub fn includes(&self, login: &str) -> bool {
        let login = login.trim();
        self.requested_reviewers
            .iter()
            .chain(self.assignees.iter())
            .chain(self.latest_reviewer.iter())
            .any(|candidate| candidate.eq_ignore_ascii_case(login))
    }
}
