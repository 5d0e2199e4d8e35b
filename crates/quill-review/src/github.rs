use std::path::PathBuf;

use async_trait::async_trait;
use quill_core::{
    ChangedItem, Comment, GitHubConfig, PullRequestRef, QuillError, ReviewAssignment, ReviewMode,
};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::ports::{ChangeSource, CommentPublisher};

const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

const LATEST_REVIEW_QUERY: &str = "\
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      reviews(last: 1) {
        nodes { author { login } }
      }
    }
  }
}";

/// GitHub Pull Request client for reading changes and posting comments.
///
/// JSON endpoints go through `octocrab`; the diff and raw-content media
/// types are fetched with plain `reqwest`.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestInfo {
    head: HeadRef,
    #[serde(default)]
    requested_reviewers: Vec<Account>,
    #[serde(default)]
    assignees: Vec<Account>,
}

/// One entry of `GET /repos/{owner}/{repo}/pulls/{number}/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestFile {
    /// Path of the file after the change.
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, ...
    pub status: String,
}

#[derive(Serialize)]
struct PageParams {
    per_page: u32,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    repository: Option<GraphQlRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRepository {
    pull_request: Option<GraphQlPullRequest>,
}

#[derive(Debug, Deserialize)]
struct GraphQlPullRequest {
    reviews: GraphQlReviews,
}

#[derive(Debug, Deserialize)]
struct GraphQlReviews {
    nodes: Vec<GraphQlReview>,
}

#[derive(Debug, Deserialize)]
struct GraphQlReview {
    author: Option<Account>,
}

impl GitHubClient {
    /// Create a client from the GitHub configuration.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Config`] if no token is configured or the API
    /// URL is invalid, or [`QuillError::SourceUnavailable`] if the client
    /// cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quill_core::GitHubConfig;
    /// use quill_review::github::GitHubClient;
    ///
    /// # async fn example() {
    /// let config = GitHubConfig {
    ///     token: Some("ghp_xxxx".into()),
    ///     ..GitHubConfig::default()
    /// };
    /// let client = GitHubClient::new(&config).unwrap();
    /// # }
    /// ```
    pub fn new(config: &GitHubConfig) -> Result<Self, QuillError> {
        let token = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                QuillError::Config(
                    "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.clone())
            .base_uri(api_url.as_str())
            .map_err(|e| QuillError::Config(format!("invalid GitHub API URL {api_url}: {e}")))?
            .build()
            .map_err(|e| {
                QuillError::SourceUnavailable(format!("failed to create GitHub client: {e}"))
            })?;

        let http = reqwest::Client::builder()
            .user_agent("quill")
            .build()
            .map_err(|e| {
                QuillError::SourceUnavailable(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            octocrab,
            http,
            token,
            api_url,
        })
    }

    fn repo_url(&self, pr: &PullRequestRef, tail: &[&str]) -> Result<Url, QuillError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| QuillError::Config(format!("invalid GitHub API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| QuillError::Config(format!("invalid GitHub API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["repos", pr.owner.as_str(), pr.repo.as_str()])
            .extend(tail);
        Ok(url)
    }

    /// Fetch the unified diff for a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::SourceUnavailable`] on network or API errors.
    pub async fn get_pr_diff(&self, pr: &PullRequestRef) -> Result<String, QuillError> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["pulls", number.as_str()])?;

        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3.diff")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| QuillError::SourceUnavailable(format!("failed to fetch PR diff: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(QuillError::SourceUnavailable(format!(
                "pull request {pr} not found"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuillError::SourceUnavailable(format!(
                "GitHub API error {status}: {body}"
            )));
        }

        response.text().await.map_err(|e| {
            QuillError::SourceUnavailable(format!("failed to read diff response: {e}"))
        })
    }

    async fn pull_request_info(&self, pr: &PullRequestRef) -> Result<PullRequestInfo, QuillError> {
        let route = format!("/repos/{}/{}/pulls/{}", pr.owner, pr.repo, pr.number);
        self.octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| source_error(pr, "failed to fetch pull request", e))
    }

    /// Author of the most recently submitted review, if any.
    ///
    /// Best effort: a failing GraphQL call is logged and treated as "none".
    async fn latest_reviewer(&self, pr: &PullRequestRef) -> Option<String> {
        let payload = serde_json::json!({
            "query": LATEST_REVIEW_QUERY,
            "variables": {
                "owner": pr.owner,
                "repo": pr.repo,
                "number": pr.number,
            },
        });
        let response: GraphQlResponse = match self.octocrab.graphql(&payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%pr, "failed to query latest review: {e}");
                return None;
            }
        };
        response
            .data?
            .repository?
            .pull_request?
            .reviews
            .nodes
            .pop()?
            .author
            .map(|a| a.login)
    }

    /// List every file touched by the pull request, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::SourceUnavailable`] on API errors.
    pub async fn list_files(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<PullRequestFile>, QuillError> {
        let route = format!("/repos/{}/{}/pulls/{}/files", pr.owner, pr.repo, pr.number);
        let mut files = Vec::new();
        let mut page = 1;
        loop {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<PullRequestFile> = self
                .octocrab
                .get(&route, Some(&params))
                .await
                .map_err(|e| source_error(pr, "failed to list pull request files", e))?;
            let done = batch.len() < PER_PAGE as usize;
            files.extend(batch);
            if done {
                return Ok(files);
            }
            page += 1;
        }
    }

    /// Fetch the content of `path` at commit `sha`.
    ///
    /// Returns `None` for content that is not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::SourceUnavailable`] on network or API errors.
    pub async fn file_content(
        &self,
        pr: &PullRequestRef,
        path: &str,
        sha: &str,
    ) -> Result<Option<String>, QuillError> {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.repo_url(pr, &segments)?;
        url.query_pairs_mut().append_pair("ref", sha);

        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.raw")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                QuillError::SourceUnavailable(format!("failed to fetch {path} at {sha}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuillError::SourceUnavailable(format!(
                "failed to fetch {path} at {sha}: GitHub API error {status}: {body}"
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            QuillError::SourceUnavailable(format!("failed to read {path}: {e}"))
        })?;
        Ok(String::from_utf8(bytes.to_vec()).ok())
    }

    async fn file_items(&self, pr: &PullRequestRef) -> Result<Vec<ChangedItem>, QuillError> {
        let info = self.pull_request_info(pr).await?;
        let files = self.list_files(pr).await?;
        let mut items = Vec::with_capacity(files.len());
        for file in files {
            if file.status == "removed" {
                tracing::debug!(path = %file.filename, "skipping removed file");
                continue;
            }
            match self.file_content(pr, &file.filename, &info.head.sha).await? {
                Some(content) => items.push(ChangedItem::File {
                    path: PathBuf::from(file.filename),
                    content,
                }),
                None => tracing::warn!(path = %file.filename, "skipping non-text file"),
            }
        }
        Ok(items)
    }

    async fn patch_items(&self, pr: &PullRequestRef) -> Result<Vec<ChangedItem>, QuillError> {
        let diff = self.get_pr_diff(pr).await?;
        quill_difflens::parser::split_into_items(&diff)
    }

    /// Create a conversation comment on the pull request.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Publish`] on API errors.
    pub async fn post_issue_comment(
        &self,
        pr: &PullRequestRef,
        body: &str,
    ) -> Result<(), QuillError> {
        let route = format!("/repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number);
        let payload = serde_json::json!({ "body": body });
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| QuillError::Publish(format!("failed to post comment on {pr}: {e}")))?;
        Ok(())
    }

    /// Create a review comment attached to a file or a line of the diff.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Publish`] on API errors.
    pub async fn post_review_comment(
        &self,
        pr: &PullRequestRef,
        body: &str,
        anchor: &quill_core::CommentAnchor,
    ) -> Result<(), QuillError> {
        let route = format!("/repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number);
        let path = anchor.path.to_string_lossy();
        let payload = match anchor.line {
            Some(line) => serde_json::json!({
                "body": body,
                "commit_id": anchor.commit_sha,
                "path": path,
                "line": line,
                "side": "RIGHT",
            }),
            None => serde_json::json!({
                "body": body,
                "commit_id": anchor.commit_sha,
                "path": path,
                "subject_type": "file",
            }),
        };
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| {
                QuillError::Publish(format!("failed to post review comment on {path}: {e}"))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ChangeSource for GitHubClient {
    async fn review_assignment(&self, pr: &PullRequestRef) -> Result<ReviewAssignment, QuillError> {
        let info = self.pull_request_info(pr).await?;
        let latest_reviewer = self.latest_reviewer(pr).await;
        Ok(ReviewAssignment {
            requested_reviewers: info.requested_reviewers.into_iter().map(|a| a.login).collect(),
            assignees: info.assignees.into_iter().map(|a| a.login).collect(),
            latest_reviewer,
            head_sha: info.head.sha,
        })
    }

    async fn changed_items(
        &self,
        pr: &PullRequestRef,
        mode: ReviewMode,
    ) -> Result<Vec<ChangedItem>, QuillError> {
        let items = match mode {
            ReviewMode::Files => self.file_items(pr).await?,
            ReviewMode::Patch => self.patch_items(pr).await?,
        };
        tracing::info!(%pr, %mode, items = items.len(), "fetched pull request changes");
        if items.is_empty() {
            return Err(QuillError::EmptyChangeSet);
        }
        Ok(items)
    }
}

#[async_trait]
impl CommentPublisher for GitHubClient {
    async fn publish(&self, comment: &Comment) -> Result<(), QuillError> {
        match &comment.anchor {
            Some(anchor) => {
                self.post_review_comment(&comment.pr, &comment.body, anchor)
                    .await?
            }
            None => self.post_issue_comment(&comment.pr, &comment.body).await?,
        }
        tracing::info!(pr = %comment.pr, anchored = comment.anchor.is_some(), "posted comment");
        Ok(())
    }
}

fn source_error(pr: &PullRequestRef, context: &str, err: octocrab::Error) -> QuillError {
    if let octocrab::Error::GitHub { source, .. } = &err {
        if source.status_code.as_u16() == 404 {
            return QuillError::SourceUnavailable(format!("pull request {pr} not found"));
        }
    }
    QuillError::SourceUnavailable(format!("{context} {pr}: {err}"))
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use quill_core::CommentAnchor;

    use super::*;

    fn pr() -> PullRequestRef {
        PullRequestRef::from_repository("octocat/hello-world", 42).unwrap()
    }

    fn client(url: &str) -> GitHubClient {
        GitHubClient::new(&GitHubConfig {
            token: Some("ghp_test".into()),
            api_url: Some(url.into()),
            ..GitHubConfig::default()
        })
        .unwrap()
    }

    const TWO_FILE_DIFF: &str = "\
diff --git a/src/app.py b/src/app.py
index 1111111..2222222 100644
--- a/src/app.py
+++ b/src/app.py
@@ -1,2 +1,3 @@
 import os
+import sys
 print(os.getcwd())
diff --git a/README.md b/README.md
index 3333333..4444444 100644
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-# Hello
+# Hello, world
";

    #[tokio::test]
    async fn new_requires_token() {
        let err = GitHubClient::new(&GitHubConfig::default()).err().unwrap();
        assert!(matches!(err, QuillError::Config(_)));
    }

    #[tokio::test]
    async fn patch_mode_splits_diff_per_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42")
            .match_header("accept", "application/vnd.github.v3.diff")
            .match_header("authorization", "Bearer ghp_test")
            .with_status(200)
            .with_body(TWO_FILE_DIFF)
            .create_async()
            .await;

        let items = client(&server.url())
            .changed_items(&pr(), ReviewMode::Patch)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path(), std::path::Path::new("src/app.py"));
        assert!(items[0].body().contains("+import sys"));
        assert_eq!(items[1].path(), std::path::Path::new("README.md"));
    }

    #[tokio::test]
    async fn empty_diff_is_empty_change_set() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let err = client(&server.url())
            .changed_items(&pr(), ReviewMode::Patch)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::EmptyChangeSet));
    }

    #[tokio::test]
    async fn missing_pull_request_is_source_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).get_pr_diff(&pr()).await.unwrap_err();
        assert!(matches!(err, QuillError::SourceUnavailable(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn files_mode_fetches_content_at_head_and_skips_removed() {
        let mut server = mockito::Server::new_async().await;
        let _info = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"head":{"sha":"abc123"},"requested_reviewers":[],"assignees":[]}"#)
            .create_async()
            .await;
        let _files = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"filename":"src/main.py","status":"modified"},
                    {"filename":"old.py","status":"removed"}]"#,
            )
            .create_async()
            .await;
        let content = server
            .mock("GET", "/repos/octocat/hello-world/contents/src/main.py")
            .match_query(Matcher::UrlEncoded("ref".into(), "abc123".into()))
            .match_header("accept", "application/vnd.github.raw")
            .with_status(200)
            .with_body("print('hello')\n")
            .create_async()
            .await;

        let items = client(&server.url())
            .changed_items(&pr(), ReviewMode::Files)
            .await
            .unwrap();
        content.assert_async().await;
        assert_eq!(
            items,
            vec![ChangedItem::File {
                path: PathBuf::from("src/main.py"),
                content: "print('hello')\n".into(),
            }]
        );
    }

    #[tokio::test]
    async fn review_assignment_collects_reviewers_assignees_and_latest() {
        let mut server = mockito::Server::new_async().await;
        let _info = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"head":{"sha":"abc123"},
                    "requested_reviewers":[{"login":"review-bot"}],
                    "assignees":[{"login":"octocat"}]}"#,
            )
            .create_async()
            .await;
        let _graphql = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"repository":{"pullRequest":{"reviews":{"nodes":[{"author":{"login":"hubot"}}]}}}}}"#,
            )
            .create_async()
            .await;

        let assignment = client(&server.url())
            .review_assignment(&pr())
            .await
            .unwrap();
        assert_eq!(assignment.requested_reviewers, vec!["review-bot"]);
        assert_eq!(assignment.assignees, vec!["octocat"]);
        assert_eq!(assignment.latest_reviewer.as_deref(), Some("hubot"));
        assert_eq!(assignment.head_sha, "abc123");
    }

    #[tokio::test]
    async fn failed_graphql_leaves_latest_reviewer_empty() {
        let mut server = mockito::Server::new_async().await;
        let _info = server
            .mock("GET", "/repos/octocat/hello-world/pulls/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"head":{"sha":"abc123"}}"#)
            .create_async()
            .await;
        let _graphql = server
            .mock("POST", "/graphql")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let assignment = client(&server.url())
            .review_assignment(&pr())
            .await
            .unwrap();
        assert!(assignment.latest_reviewer.is_none());
        assert!(assignment.requested_reviewers.is_empty());
    }

    #[tokio::test]
    async fn unanchored_comment_goes_to_conversation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octocat/hello-world/issues/42/comments")
            .match_body(Matcher::Json(serde_json::json!({"body": "Looks good"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":1}"#)
            .create_async()
            .await;

        client(&server.url())
            .publish(&Comment::new(pr(), "Looks good"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn anchored_comment_is_file_level_review_comment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octocat/hello-world/pulls/42/comments")
            .match_body(Matcher::Json(serde_json::json!({
                "body": "Consider a context manager",
                "commit_id": "abc123",
                "path": "src/db.py",
                "subject_type": "file",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":2}"#)
            .create_async()
            .await;

        let comment = Comment::new(pr(), "Consider a context manager").anchored(CommentAnchor {
            path: PathBuf::from("src/db.py"),
            commit_sha: "abc123".into(),
            line: None,
        });
        client(&server.url()).publish(&comment).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_comment_is_publish_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octocat/hello-world/issues/42/comments")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Resource not accessible by integration"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .publish(&Comment::new(pr(), "body"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Publish(_)));
    }
}
