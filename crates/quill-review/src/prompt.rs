use std::path::Path;

use quill_core::{ChangedItem, LlmConfig, QuillError, ReviewConfig, ReviewRequest};

const SYSTEM_PROMPT: &str = "\
You are an expert code reviewer. Review the code in the pull request for \
clarity, efficiency, and adherence to best practices. Identify areas for \
improvement, suggest specific optimizations, and point out potential bugs or \
security vulnerabilities. Explain how to address each issue with a focus on \
maintainability and scalability, and include short code examples where they help.

### Review Guidelines
1. **Clarity**: Is the code easy to understand?
2. **Efficiency**: Are there any performance improvements?
3. **Best Practices**: Does the code follow standard coding conventions?
4. **Bugs/Security**: Are there any potential bugs or security vulnerabilities?
5. **Maintainability**: Is the code easy to maintain and scale?

Use markdown formatting for your response. Do not repeat the code or these \
guidelines in the review. Only write the review itself.";

/// Build the system prompt for the reviewer persona.
///
/// # Examples
///
/// ```
/// use quill_review::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt("pt-BR", 1500);
/// assert!(prompt.contains("pt-BR"));
/// assert!(prompt.contains("1500"));
/// ```
pub fn build_system_prompt(language: &str, max_tokens: u32) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\n\
         Keep the review within {max_tokens} tokens. If you have to summarize to \
         stay within that limit, say so.\n\
         Write the review in the following language: {language}."
    )
}

/// Build the user prompt: custom instructions (if any) followed by the code.
///
/// Custom instructions are passed through verbatim and never interpreted.
///
/// # Examples
///
/// ```
/// use quill_core::ChangedItem;
/// use quill_review::prompt::build_review_prompt;
///
/// let items = vec![ChangedItem::Patch {
///     path: "src/db.py".into(),
///     diff: "@@ -1 +1 @@\n-a\n+b\n".into(),
/// }];
/// let prompt = build_review_prompt(&items, Some("Focus on SQL injection"));
/// assert!(prompt.starts_with("Focus on SQL injection"));
/// assert!(prompt.contains("### File: src/db.py"));
/// assert!(prompt.contains("```diff"));
/// ```
pub fn build_review_prompt(items: &[ChangedItem], custom_prompt: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(custom) = custom_prompt.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(custom);
        prompt.push_str("\n\n");
    }
    prompt.push_str("### Code\n");
    for item in items {
        prompt.push_str(&render_item(item));
    }
    prompt
}

/// Rough token estimate: one token per four characters, rounded up.
///
/// # Examples
///
/// ```
/// use quill_review::prompt::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcd"), 1);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn render_item(item: &ChangedItem) -> String {
    let body = item.body();
    let fence = fence_for(body);
    let info = match item {
        ChangedItem::Patch { .. } => "diff".to_string(),
        ChangedItem::File { path, .. } => fence_language(path),
    };
    let newline = if body.ends_with('\n') { "" } else { "\n" };
    format!(
        "\n### File: {}\n{fence}{info}\n{body}{newline}{fence}\n",
        item.path().display()
    )
}

// A fence must be longer than any backtick run inside the block.
fn fence_for(body: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

fn fence_language(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Turns changed items into one or more review requests.
///
/// All items go into a single request when the prompt fits
/// `max_prompt_tokens`. Otherwise every item gets its own request, and an
/// item that still does not fit fails the build. Content is never truncated.
///
/// # Examples
///
/// ```
/// use quill_core::{ChangedItem, LlmConfig, ReviewConfig};
/// use quill_review::prompt::PromptBuilder;
///
/// let builder = PromptBuilder::new(&LlmConfig::default(), &ReviewConfig::default());
/// let items = vec![
///     ChangedItem::Patch { path: "a.rs".into(), diff: "+a\n".into() },
///     ChangedItem::Patch { path: "b.rs".into(), diff: "+b\n".into() },
/// ];
/// let requests = builder.build(&items).unwrap();
/// assert_eq!(requests.len(), 1);
/// assert_eq!(requests[0].paths.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    temperature: f32,
    max_tokens: u32,
    language: String,
    custom_prompt: Option<String>,
    max_prompt_tokens: usize,
}

impl PromptBuilder {
    /// Create a builder from the model and review settings.
    pub fn new(llm: &LlmConfig, review: &ReviewConfig) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            language: review.language.clone(),
            custom_prompt: review
                .custom_prompt
                .clone()
                .filter(|c| !c.trim().is_empty()),
            max_prompt_tokens: review.max_prompt_tokens,
        }
    }

    /// Compose the review requests for `items`, in item order.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::EmptyChangeSet`] if `items` is empty, or
    /// [`QuillError::ContentTooLarge`] if one item alone exceeds the budget.
    pub fn build(&self, items: &[ChangedItem]) -> Result<Vec<ReviewRequest>, QuillError> {
        if items.is_empty() {
            return Err(QuillError::EmptyChangeSet);
        }

        let system = build_system_prompt(&self.language, self.max_tokens);
        let combined = self.request(&system, items);
        let estimated = estimate_tokens(&combined.system) + estimate_tokens(&combined.prompt);
        if estimated <= self.max_prompt_tokens {
            return Ok(vec![combined]);
        }

        tracing::info!(
            estimated,
            limit = self.max_prompt_tokens,
            items = items.len(),
            "prompt exceeds budget, reviewing each file separately"
        );

        items
            .iter()
            .map(|item| {
                let request = self.request(&system, std::slice::from_ref(item));
                let estimated =
                    estimate_tokens(&request.system) + estimate_tokens(&request.prompt);
                if estimated > self.max_prompt_tokens {
                    return Err(QuillError::ContentTooLarge {
                        path: item.path().to_path_buf(),
                        estimated,
                        limit: self.max_prompt_tokens,
                    });
                }
                Ok(request)
            })
            .collect()
    }

    fn request(&self, system: &str, items: &[ChangedItem]) -> ReviewRequest {
        ReviewRequest {
            system: system.to_string(),
            prompt: build_review_prompt(items, self.custom_prompt.as_deref()),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            language: self.language.clone(),
            custom_instructions: self.custom_prompt.clone(),
            paths: items.iter().map(|i| i.path().to_path_buf()).collect(),
        }
    }
}
