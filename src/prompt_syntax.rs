// invokeai-bridge/src/prompt_syntax.rs
//! Rewrites the old bracket-count attention syntax into explicit weight suffixes.
//!
//! `(word)` becomes `(word)+`, `((word))` becomes `(word)++`, and curly
//! braces map to `-` the same way. Escaped parentheses (`\(`, `\)`) are
//! literal text and never form a group.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

// Private-use code points, they cannot collide with delimiters.
const ESCAPED_OPEN: &str = "\u{E000}";
const ESCAPED_CLOSE: &str = "\u{E001}";

static NUMERIC_WEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)\d.\d+").expect("numeric weight pattern is valid"));

/// Converts a prompt written with the old syntax. Prompts that already look
/// like the new syntax come back untouched.
pub fn convert_old_attention_syntax(prompt: &str) -> String {
    if !prompt.contains('(') && !prompt.contains('{') {
        return prompt.to_string();
    }

    if uses_new_syntax(prompt) {
        debug!("[PROMPT_SYNTAX] Prompt already uses weight suffixes, leaving it as is");
        return prompt.to_string();
    }

    let escaped = prompt
        .replace("\\(", ESCAPED_OPEN)
        .replace("\\)", ESCAPED_CLOSE);

    let converted = rewrite_groups(&escaped, b'(', b')', '+');
    let converted = rewrite_groups(&converted, b'{', b'}', '-');

    converted
        .replace(ESCAPED_OPEN, "\\(")
        .replace(ESCAPED_CLOSE, "\\)")
}

/// Heuristic only: `)+`, `)-` or `)1.2` anywhere counts as new syntax.
pub fn uses_new_syntax(prompt: &str) -> bool {
    prompt.contains(")+") || prompt.contains(")-") || NUMERIC_WEIGHT.is_match(prompt)
}

// Every group found in the original text is replaced wherever it occurs
// verbatim, so identical groups are rewritten once per occurrence.
fn rewrite_groups(prompt: &str, open: u8, close: u8, suffix: char) -> String {
    let groups: Vec<String> = find_balanced_groups(prompt, open, close)
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rewritten = prompt.to_string();
    for group in &groups {
        let depth = group.bytes().filter(|&b| b == close).count();
        let inner: String = group
            .chars()
            .filter(|&c| c != open as char && c != close as char)
            .collect();
        let converted = format!("({}){}", inner, suffix.to_string().repeat(depth));
        debug!("[PROMPT_SYNTAX] '{}' -> '{}'", group, converted);
        rewritten = rewritten.replace(group.as_str(), &converted);
    }
    rewritten
}

/// Returns the maximal balanced groups in `text`, left to right and
/// non-overlapping. An opener without a partner is skipped and the scan
/// resumes right after it. Empty groups never match.
pub fn find_balanced_groups(text: &str, open: u8, close: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut groups = Vec::new();
    let mut start = 0;

    while start < bytes.len() {
        if bytes[start] == open {
            if let Some(end) = matching_close(bytes, start, open, close) {
                if end > start + 1 {
                    // Delimiters are ASCII so both ends sit on char boundaries.
                    groups.push(&text[start..=end]);
                    start = end + 1;
                    continue;
                }
            }
        }
        start += 1;
    }
    groups
}

fn matching_close(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_group() {
        assert_eq!(convert_old_attention_syntax("a (b) c"), "a (b)+ c");
        assert_eq!(convert_old_attention_syntax("a {b} c"), "a (b)- c");
    }

    #[test]
    fn test_nested_groups_collapse() {
        assert_eq!(convert_old_attention_syntax("((a))"), "(a)++");
        assert_eq!(convert_old_attention_syntax("(a (b) c)"), "(a b c)++");
        assert_eq!(convert_old_attention_syntax("{{{dark}}} sky"), "(dark)--- sky");
    }

    #[test]
    fn test_parens_then_braces() {
        assert_eq!(convert_old_attention_syntax("(a) {b}"), "(a)+ (b)-");
        assert_eq!(convert_old_attention_syntax("{x (y)}"), "(x (y)+)-");
    }

    #[test]
    fn test_plain_prompt_untouched() {
        assert_eq!(convert_old_attention_syntax("a castle at dusk"), "a castle at dusk");
        assert_eq!(convert_old_attention_syntax("()"), "()");
    }

    #[test]
    fn test_escaped_parentheses_are_literal() {
        assert_eq!(convert_old_attention_syntax("\\(a\\)"), "\\(a\\)");
        assert_eq!(convert_old_attention_syntax("\\(a\\) (b)"), "\\(a\\) (b)+");
    }

    #[test]
    fn test_new_syntax_left_alone() {
        assert_eq!(convert_old_attention_syntax("(a)+ (b)"), "(a)+ (b)");
        assert_eq!(convert_old_attention_syntax("(a)- {b}"), "(a)- {b}");
        assert_eq!(convert_old_attention_syntax("(a)1.5 (b)"), "(a)1.5 (b)");
    }

    #[test]
    fn test_conversion_is_idempotent() {
        for prompt in ["a (b) c", "((a)) {b}", "{x}", "(a (b) c) d"] {
            let once = convert_old_attention_syntax(prompt);
            assert_eq!(convert_old_attention_syntax(&once), once);
        }
    }

    // Known edge case: the new-syntax heuristic fires on coincidental text.
    #[test]
    fn test_heuristic_false_positive() {
        assert_eq!(convert_old_attention_syntax("(x)2a5 (y)"), "(x)2a5 (y)");
    }

    // Known edge case: a repeated group is rewritten once per occurrence.
    #[test]
    fn test_repeated_group_is_replaced_everywhere() {
        assert_eq!(convert_old_attention_syntax("(a) (a)"), "(a)++ (a)++");
    }

    #[test]
    fn test_unbalanced_opener_skipped() {
        assert_eq!(convert_old_attention_syntax("((a) b"), "((a)+ b");
        assert_eq!(convert_old_attention_syntax("a) (b"), "a) (b");
    }

    #[test]
    fn test_find_balanced_groups() {
        assert_eq!(find_balanced_groups("x (a (b)) y (c)", b'(', b')'), vec!["(a (b))", "(c)"]);
        assert_eq!(find_balanced_groups("(()x)", b'(', b')'), vec!["(()x)"]);
        assert!(find_balanced_groups("(()", b'(', b')').is_empty());
    }

    #[test]
    fn test_deep_nesting() {
        let prompt = format!("{}a{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(convert_old_attention_syntax(&prompt), format!("(a){}", "+".repeat(200)));
    }

    #[test]
    fn test_non_ascii_text() {
        assert_eq!(convert_old_attention_syntax("(café) über"), "(café)+ über");
    }
}
