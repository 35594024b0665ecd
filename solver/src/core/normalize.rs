//! Whitespace normalization and diff rendering for program outputs.

/// Default number of characters of each side shown in a diff summary.
pub const DEFAULT_EXCERPT_CHARS: usize = 1000;

/// Literal returned by [`render_diff_summary`] when both sides agree.
pub const MATCH_SUMMARY: &str = "Outputs match!";

/// Normalize output text for comparison.
///
/// Each line is trimmed, then the joined content is trimmed, which drops
/// leading and trailing blank lines. Interior runs of whitespace inside a line
/// are kept as-is.
pub fn normalize_output(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Whether two outputs are equal after [`normalize_output`].
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    normalize_output(expected) == normalize_output(actual)
}

/// 1-indexed number of the first normalized line that differs.
///
/// Returns `None` when the normalized outputs are identical.
pub fn first_difference(expected: &str, actual: &str) -> Option<usize> {
    let expected = normalize_output(expected);
    let actual = normalize_output(actual);
    if expected == actual {
        return None;
    }
    let mut left = expected.lines();
    let mut right = actual.lines();
    let mut line = 1;
    loop {
        match (left.next(), right.next()) {
            (Some(a), Some(b)) if a == b => line += 1,
            _ => return Some(line),
        }
    }
}

/// Render a human-readable summary of two outputs.
///
/// Matching outputs render as [`MATCH_SUMMARY`]. Otherwise the summary carries
/// the `Outputs differ`, `Expected:` and `Actual:` markers followed by an
/// excerpt of each side capped at `excerpt_chars` characters.
pub fn render_diff_summary(expected: &str, actual: &str, excerpt_chars: usize) -> String {
    let Some(line) = first_difference(expected, actual) else {
        return MATCH_SUMMARY.to_string();
    };
    let expected_lines = normalize_output(expected).lines().count();
    let actual_lines = normalize_output(actual).lines().count();
    format!(
        "Outputs differ (first difference at line {line}; \
         expected {expected_lines} lines, actual {actual_lines} lines)\n\n\
         Expected:\n{}\n\nActual:\n{}",
        excerpt(expected, excerpt_chars),
        excerpt(actual, excerpt_chars),
    )
}

fn excerpt(text: &str, limit: usize) -> String {
    let text = text.trim_end();
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            let dropped = text[cut..].chars().count();
            format!("{}\n... [truncated {dropped} chars]", &text[..cut])
        }
        None => text.to_string(),
    }
}
