//! Regular-expression matching on ripgrep's matcher stack.

use crate::error::{Result, TailscanError};
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};

/// Compiled regex tested against one field at a time.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    matcher: RegexMatcher,
}

impl PatternMatcher {
    /// Compile `pattern`. Case folding is a compile flag; whole-text mode anchors the
    /// pattern to both ends of the field.
    pub fn new(pattern: &str, case_sensitive: bool, whole_text: bool) -> Result<Self> {
        let source = if whole_text {
            format!("^(?:{})$", pattern)
        } else {
            pattern.to_string()
        };

        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(!case_sensitive)
            .build(&source)
            .map_err(|e| TailscanError::pattern(pattern, e))?;

        Ok(Self { matcher })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text.as_bytes()).unwrap_or(false)
    }
}
