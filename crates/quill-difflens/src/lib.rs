//! Unified diff parsing for patch-mode reviews.
//!
//! Splits the diff the hosting platform returns for a pull request into
//! per-file sections, keeping each section's raw text for the prompt and the
//! parsed hunks for change statistics.

pub mod parser;
