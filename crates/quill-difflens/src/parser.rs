use std::fmt;
use std::path::{Path, PathBuf};

use quill_core::{ChangedItem, QuillError};

/// One `@@` hunk of a file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
    /// Body lines (`+`, `-`, and context), newline-terminated.
    pub content: String,
}

impl Hunk {
    /// Whether the body already holds every line the header announced.
    fn is_complete(&self) -> bool {
        let (mut old, mut new) = (0, 0);
        for line in self.content.lines() {
            match line.as_bytes().first() {
                Some(b' ') => {
                    old += 1;
                    new += 1;
                }
                Some(b'-') => old += 1,
                Some(b'+') => new += 1,
                _ => {}
            }
        }
        old >= self.old_lines && new >= self.new_lines
    }
}

/// The diff section of a single file.
///
/// # Examples
///
/// ```
/// use quill_difflens::parser::parse_unified_diff;
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n\
///             --- a/hello.rs\n\
///             +++ b/hello.rs\n\
///             @@ -1,3 +1,4 @@\n\
///              fn main() {\n\
///             +    println!(\"hello\");\n\
///              }\n";
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunks.len(), 1);
/// assert!(files[0].raw.starts_with("diff --git"));
/// ```
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version.
    pub new_path: PathBuf,
    /// Parsed hunks for this file.
    pub hunks: Vec<Hunk>,
    /// Raw text of this file's section, headers included.
    pub raw: String,
    /// Whether this is a newly created file.
    pub is_new_file: bool,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
    /// Whether this file was renamed.
    pub is_rename: bool,
}

impl FileDiff {
    fn empty() -> Self {
        Self {
            old_path: PathBuf::new(),
            new_path: PathBuf::new(),
            hunks: Vec::new(),
            raw: String::new(),
            is_new_file: false,
            is_deleted_file: false,
            is_rename: false,
        }
    }

    /// Path the change is reported under: the old path for deletions,
    /// the new path otherwise.
    pub fn path(&self) -> &Path {
        if self.is_deleted_file {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// Number of added lines across all hunks.
    pub fn additions(&self) -> usize {
        self.count_lines('+')
    }

    /// Number of removed lines across all hunks.
    pub fn deletions(&self) -> usize {
        self.count_lines('-')
    }

    fn count_lines(&self, marker: char) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| h.content.lines())
            .filter(|l| l.starts_with(marker))
            .count()
    }

    /// Convert into a patch-mode [`ChangedItem`] carrying only this file's diff.
    pub fn into_changed_item(self) -> ChangedItem {
        let path = self.path().to_path_buf();
        ChangedItem::Patch {
            path,
            diff: self.raw,
        }
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} hunks, +{} -{})",
            self.path().display(),
            self.hunks.len(),
            self.additions(),
            self.deletions()
        )
    }
}

/// Parse a unified diff string (as served by GitHub or `git diff`) into
/// per-file [`FileDiff`] sections.
///
/// Handles new files, deleted files, renamed files, and binary files (which
/// are skipped).
///
/// # Errors
///
/// Returns [`QuillError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use quill_difflens::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>, QuillError> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut current_hunk: Option<Hunk> = None;
    let mut is_binary = false;

    let mut lines = input.lines().peekable();
    while let Some(line) = lines.next() {
        if line.starts_with("diff --git ") {
            finish_file(&mut files, &mut current, &mut current_hunk, is_binary);
            is_binary = false;
            let mut file = FileDiff::empty();
            push_raw(&mut file, line);
            current = Some(file);
            continue;
        }

        // Patches without a "diff --git" line start each file at a "---"/"+++" pair
        let file_header =
            line.starts_with("--- ") && lines.peek().is_some_and(|next| next.starts_with("+++ "));
        let starts_file = match &current_hunk {
            Some(hunk) => hunk.is_complete(),
            None => current.is_none(),
        };
        if file_header && starts_file {
            finish_file(&mut files, &mut current, &mut current_hunk, is_binary);
            is_binary = false;
            current = Some(FileDiff::empty());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };
        push_raw(file, line);

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            is_binary = true;
            continue;
        }

        if line.starts_with("new file mode") {
            file.is_new_file = true;
            continue;
        }

        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }

        if line.starts_with("rename from ") || line.starts_with("rename to ") {
            file.is_rename = true;
            if let Some(path) = line.strip_prefix("rename from ") {
                file.old_path = PathBuf::from(path);
            } else if let Some(path) = line.strip_prefix("rename to ") {
                file.new_path = PathBuf::from(path);
            }
            continue;
        }

        if line.starts_with("index ") || line.starts_with("similarity index") {
            continue;
        }

        if current_hunk.is_none() {
            if let Some(path) = line.strip_prefix("--- ") {
                file.old_path = parse_path(path);
                continue;
            }

            if let Some(path) = line.strip_prefix("+++ ") {
                file.new_path = parse_path(path);
                if path == "/dev/null" {
                    file.is_deleted_file = true;
                }
                continue;
            }
        }

        if line.starts_with("@@ ") {
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            flush_hunk(&mut current, &mut current_hunk);
            current_hunk = Some(Hunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                content: String::new(),
            });
            continue;
        }

        if line == "\\ No newline at end of file" {
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if line.starts_with('+') || line.starts_with('-') || line.starts_with(' ') {
                hunk.content.push_str(line);
                hunk.content.push('\n');
            }
        }
    }

    finish_file(&mut files, &mut current, &mut current_hunk, is_binary);
    Ok(files)
}

/// Split a pull request diff into patch-mode [`ChangedItem`]s, one per file.
///
/// Binary files and sections without hunks (pure renames, mode changes) carry
/// nothing to review and are dropped.
///
/// # Errors
///
/// Returns [`QuillError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use quill_difflens::parser::split_into_items;
///
/// let diff = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1,2 @@\n line1\n+line2\n";
/// let items = split_into_items(diff).unwrap();
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].path().to_str(), Some("a.rs"));
/// ```
pub fn split_into_items(input: &str) -> Result<Vec<ChangedItem>, QuillError> {
    Ok(parse_unified_diff(input)?
        .into_iter()
        .filter(|f| !f.hunks.is_empty())
        .map(FileDiff::into_changed_item)
        .collect())
}

fn push_raw(file: &mut FileDiff, line: &str) {
    file.raw.push_str(line);
    file.raw.push('\n');
}

fn flush_hunk(current: &mut Option<FileDiff>, hunk: &mut Option<Hunk>) {
    if let Some(h) = hunk.take() {
        if let Some(file) = current.as_mut() {
            file.hunks.push(h);
        }
    }
}

fn finish_file(
    files: &mut Vec<FileDiff>,
    current: &mut Option<FileDiff>,
    hunk: &mut Option<Hunk>,
    is_binary: bool,
) {
    flush_hunk(current, hunk);
    if let Some(file) = current.take() {
        if !is_binary {
            files.push(file);
        }
    }
}

fn parse_path(raw: &str) -> PathBuf {
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), QuillError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| QuillError::Parse(format!("invalid hunk header: {line}")))?;

    let Some((old, new)) = inner.split_once(' ') else {
        return Err(QuillError::Parse(format!("invalid hunk header: {line}")));
    };

    let old = old
        .strip_prefix('-')
        .ok_or_else(|| QuillError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = new
        .strip_prefix('+')
        .ok_or_else(|| QuillError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), QuillError> {
    let invalid = || QuillError::Parse(format!("invalid range in: {context}"));
    match range.split_once(',') {
        Some((start, count)) => Ok((
            start.parse().map_err(|_| invalid())?,
            count.parse().map_err(|_| invalid())?,
        )),
        None => Ok((range.parse().map_err(|_| invalid())?, 1)),
    }
}
