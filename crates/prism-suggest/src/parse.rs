use prism_core::directives::CONSTRAINT_BLOCK_TAG;
use prism_core::{NewConstraint, DEFAULT_CATEGORY};
use serde_json::Value;

const FENCE: &str = "```";

/// A `json:constraints` fenced block located inside assistant text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintBlock<'a> {
    /// Byte offset of the opening fence.
    pub start: usize,
    /// Byte offset just past the closing fence.
    pub end: usize,
    /// Text between the opening line and the closing fence.
    pub body: &'a str,
}

/// Find the first constraint block in `text`.
///
/// The opening fence may follow other text on its line, but its info string
/// must be exactly the constraint tag. The body runs to the next fence.
/// An unterminated block counts as absent.
pub fn find_constraint_block(text: &str) -> Option<ConstraintBlock<'_>> {
    let opener = format!("{FENCE}{CONSTRAINT_BLOCK_TAG}");
    let mut from = 0;
    loop {
        let start = from + text[from..].find(&opener)?;
        let after_tag = start + opener.len();
        let line_end = after_tag + text[after_tag..].find('\n')?;

        // "```json:constraintsX" or "```json:constraints foo" is some other fence
        if !text[after_tag..line_end].trim().is_empty() {
            from = after_tag;
            continue;
        }

        let body_start = line_end + 1;
        let body_end = body_start + text[body_start..].find(FENCE)?;
        return Some(ConstraintBlock {
            start,
            end: body_end + FENCE.len(),
            body: &text[body_start..body_end],
        });
    }
}

/// Turn one completed assistant reply into constraint records.
///
/// Replies without a block yield nothing. A block that is not a JSON array
/// is logged and dropped; it never fails the conversation.
pub fn extract_constraints(text: &str) -> Vec<NewConstraint> {
    let Some(block) = find_constraint_block(text) else {
        tracing::debug!("no constraint block in reply");
        return vec![];
    };

    let entries = match serde_json::from_str::<Value>(block.body) {
        Ok(Value::Array(entries)) => entries,
        Ok(other) => {
            tracing::warn!(kind = json_kind(&other), "discarding constraint block: not an array");
            return vec![];
        }
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed constraint block");
            return vec![];
        }
    };

    let total = entries.len();
    let constraints: Vec<NewConstraint> = entries.into_iter().filter_map(normalize_entry).collect();
    if constraints.len() < total {
        tracing::debug!(
            skipped = total - constraints.len(),
            "skipped constraint entries without usable content"
        );
    }
    constraints
}

/// Bare strings become "General" constraints; objects need a string
/// `content` and may carry a `category`.
fn normalize_entry(entry: Value) -> Option<NewConstraint> {
    match entry {
        Value::String(content) => usable(content).map(NewConstraint::general),
        Value::Object(mut fields) => {
            let content = match fields.remove("content") {
                Some(Value::String(content)) => usable(content)?,
                _ => return None,
            };
            let category = match fields.remove("category") {
                Some(Value::String(category)) if !category.trim().is_empty() => category,
                _ => DEFAULT_CATEGORY.to_string(),
            };
            Some(NewConstraint { category, content })
        }
        _ => None,
    }
}

fn usable(content: String) -> Option<String> {
    if content.trim().is_empty() {
        None
    } else {
        Some(content)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reply text as shown in a transcript: the constraint block removed.
pub fn strip_constraint_block(text: &str) -> String {
    match find_constraint_block(text) {
        Some(block) => {
            let mut shown = String::with_capacity(text.len());
            shown.push_str(text[..block.start].trim_end());
            let rest = text[block.end..].trim();
            if !rest.is_empty() {
                if !shown.is_empty() {
                    shown.push_str("\n\n");
                }
                shown.push_str(rest);
            }
            shown
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_without_block_yields_nothing() {
        assert!(extract_constraints("What should happen when login fails?").is_empty());
        assert!(extract_constraints("```json\n[\"not ours\"]\n```").is_empty());
    }

    #[test]
    fn inline_opening_fence_is_found() {
        let text = "Sure. ```json:constraints\n[{\"category\":\"Auth\",\"content\":\"Password must be 8 chars\"}]\n```";
        assert_eq!(
            extract_constraints(text),
            vec![NewConstraint::new("Auth", "Password must be 8 chars")]
        );
    }

    #[test]
    fn entries_keep_order_and_default_category() {
        let text = "Noted.\n\n```json:constraints\n[\n  \"Works offline\",\n  {\"content\": \"Sync every 5 minutes\"},\n  {\"category\": \"UI\", \"content\": \"Button is blue\"},\n  {\"category\": 7, \"content\": \"Max 3 retries\"}\n]\n```\n";
        let got = extract_constraints(text);
        assert_eq!(
            got,
            vec![
                NewConstraint::general("Works offline"),
                NewConstraint::general("Sync every 5 minutes"),
                NewConstraint::new("UI", "Button is blue"),
                NewConstraint::general("Max 3 retries"),
            ]
        );
    }

    #[test]
    fn entries_without_usable_content_are_skipped() {
        let text = "```json:constraints\n[{\"category\": \"UI\"}, {\"content\": 42}, 3, null, \"  \", \"kept\"]\n```";
        assert_eq!(extract_constraints(text), vec![NewConstraint::general("kept")]);
    }

    #[test]
    fn malformed_block_is_discarded() {
        assert!(extract_constraints("```json:constraints\n[{\"content\": \n```").is_empty());
        assert!(extract_constraints("```json:constraints\n{\"content\": \"x\"}\n```").is_empty());
    }

    #[test]
    fn unterminated_block_is_absent() {
        assert!(find_constraint_block("```json:constraints\n[\"x\"]").is_none());
    }

    #[test]
    fn tag_must_match_exactly() {
        assert!(find_constraint_block("```json:constraintsv2\n[\"x\"]\n```").is_none());

        let text = "```json:constraints-old\n[\"a\"]\n```\n```json:constraints\n[\"b\"]\n```";
        assert_eq!(extract_constraints(text), vec![NewConstraint::general("b")]);
    }

    #[test]
    fn first_block_wins() {
        let text = "```json:constraints\n[\"one\"]\n```\nand\n```json:constraints\n[\"two\"]\n```";
        assert_eq!(extract_constraints(text), vec![NewConstraint::general("one")]);
    }

    #[test]
    fn transcript_hides_block() {
        let text = "Got it. Anything about retries?\n\n```json:constraints\n[\"Max 3 retries\"]\n```\n";
        assert_eq!(strip_constraint_block(text), "Got it. Anything about retries?");

        let text = "Before\n```json:constraints\n[]\n```\nAfter";
        assert_eq!(strip_constraint_block(text), "Before\n\nAfter");

        assert_eq!(strip_constraint_block("plain"), "plain");
    }
}
