use prism_core::directives::{
    CHAT_DIRECTIVE, CONSTRAINT_BLOCK_TAG, DEFAULT_GENERATION_PROMPT, GENERATION_DIRECTIVE,
};
use prism_core::NewConstraint;

/// System prompt for the conversational assistant.
pub fn chat_system_prompt() -> String {
    format!(
        "{}\n\n\
## Constraint block format\n\
```{}\n\
[\"A bare rule, filed under General\", {{\"category\": \"Auth\", \"content\": \"Password must be 8 chars\"}}]\n\
```",
        CHAT_DIRECTIVE, CONSTRAINT_BLOCK_TAG
    )
}

/// System prompt for the document writer, with the constraint list embedded
/// verbatim as JSON.
pub fn generation_system_prompt(constraints: &[NewConstraint]) -> serde_json::Result<String> {
    let listed = serde_json::to_string_pretty(constraints)?;
    Ok(format!("{}\n\nConstraints:\n{}", GENERATION_DIRECTIVE, listed))
}

/// The drafting instruction, falling back to the default when blank.
pub fn generation_user_prompt(prompt: Option<&str>) -> &str {
    prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_GENERATION_PROMPT)
}
