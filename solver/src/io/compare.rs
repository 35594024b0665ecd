//! File-level output comparison.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::normalize::{DEFAULT_EXCERPT_CHARS, outputs_match, render_diff_summary};
use crate::core::types::Verdict;

/// Compares an expected-output file with an actual-output file.
///
/// Stateless; a missing or unreadable file on either side is a mismatch, not an
/// error.
#[derive(Debug, Clone, Copy)]
pub struct OutputComparator {
    excerpt_chars: usize,
}

impl Default for OutputComparator {
    fn default() -> Self {
        Self {
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

impl OutputComparator {
    pub fn with_excerpt_chars(excerpt_chars: usize) -> Self {
        Self { excerpt_chars }
    }

    /// Whether both files exist and hold the same output after normalization.
    pub fn compare(&self, expected: &Path, actual: &Path) -> bool {
        match (read_text(expected), read_text(actual)) {
            (Some(expected), Some(actual)) => outputs_match(&expected, &actual),
            _ => false,
        }
    }

    /// `"Outputs match!"` on match, otherwise a summary showing both sides.
    pub fn diff_summary(&self, expected: &Path, actual: &Path) -> String {
        let expected_text = read_text(expected).unwrap_or_else(|| missing(expected));
        let actual_text = read_text(actual).unwrap_or_else(|| missing(actual));
        if !self.compare(expected, actual) && outputs_match(&expected_text, &actual_text) {
            // Both sides missing renders identical placeholders; still a mismatch.
            return format!(
                "Outputs differ\n\nExpected:\n{expected_text}\n\nActual:\n{actual_text}"
            );
        }
        render_diff_summary(&expected_text, &actual_text, self.excerpt_chars)
    }

    /// Compare and, on mismatch, attach the diff summary.
    pub fn verdict(&self, expected: &Path, actual: &Path) -> Verdict {
        if self.compare(expected, actual) {
            Verdict::matched()
        } else {
            Verdict::mismatch(self.diff_summary(expected, actual))
        }
    }
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            debug!(path = %path.display(), err = %err, "output file unreadable");
            None
        }
    }
}

fn missing(path: &Path) -> String {
    format!("<file not found: {}>", path.display())
}
