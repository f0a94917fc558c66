//! Line diff between the current and the rewritten rules file
//!
//! Used by `--dry-run` to show what would be written.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write;

/// Renders changed lines with `-`/`+` prefixes plus `context` lines of
/// surrounding unchanged text. Returns `None` when the texts are identical.
pub fn render_diff(old_text: &str, new_text: &str, context: usize) -> Option<String> {
    let diff = TextDiff::from_lines(old_text, new_text);
    let mut result = String::new();

    for group in diff.grouped_ops(context) {
        if !result.is_empty() {
            result.push_str("  ...\n");
        }
        for op in group {
            for change in diff.iter_changes(&op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "- ",
                    ChangeTag::Insert => "+ ",
                    ChangeTag::Equal => "  ",
                };
                let _ = write!(result, "{sign}{change}");
                if change.missing_newline() {
                    result.push('\n');
                }
            }
        }
    }

    if result.is_empty() { None } else { Some(result) }
}
