//! Core types, configuration, and error handling for quill.
//!
//! This crate provides the shared foundation used by the other quill crates:
//! - [`QuillError`] — unified error type using `thiserror` and `miette`
//! - [`QuillConfig`] — layered configuration loaded from `.quill.toml`
//! - Shared types: [`PullRequestRef`], [`ReviewMode`], [`ChangedItem`],
//!   [`ReviewRequest`], [`ReviewResult`], [`Comment`], [`ReviewAssignment`]

mod config;
mod error;
mod types;

pub use config::{GitHubConfig, LlmConfig, QuillConfig, ReviewConfig};
pub use error::QuillError;
pub use types::{
    ChangedItem, Comment, CommentAnchor, PullRequestRef, ReviewAssignment, ReviewMode,
    ReviewRequest, ReviewResult,
};

/// A convenience `Result` type for quill operations.
pub type Result<T> = std::result::Result<T, QuillError>;
