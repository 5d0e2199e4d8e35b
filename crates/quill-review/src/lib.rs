//! Pull request review pipeline.
//!
//! Fetches PR changes from GitHub, composes review prompts, calls an
//! OpenAI-compatible model, and posts the feedback back as PR comments.

pub mod github;
pub mod llm;
pub mod pipeline;
pub mod ports;
pub mod prompt;
pub mod publish;
