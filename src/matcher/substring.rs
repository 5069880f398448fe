//! Plain substring matching.

use memchr::memmem;

/// Literal needle matcher. Case folding happens once for the needle and once per
/// tested field.
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    needle: String,
    finder: memmem::Finder<'static>,
    case_sensitive: bool,
    whole_text: bool,
}

impl SubstringMatcher {
    pub fn new(pattern: &str, case_sensitive: bool, whole_text: bool) -> Self {
        let needle = if case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };
        let finder = memmem::Finder::new(needle.as_bytes()).into_owned();
        Self {
            needle,
            finder,
            case_sensitive,
            whole_text,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        if self.case_sensitive {
            self.test(text)
        } else {
            self.test(&text.to_lowercase())
        }
    }

    fn test(&self, text: &str) -> bool {
        if self.whole_text {
            text == self.needle
        } else {
            self.finder.find(text.as_bytes()).is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_folding() {
        let insensitive = SubstringMatcher::new("BANANA", false, false);
        assert!(insensitive.is_match("Banana"));
        assert!(insensitive.is_match("a banana split"));
        assert!(!insensitive.is_match("apple"));

        let sensitive = SubstringMatcher::new("apple", true, false);
        assert!(sensitive.is_match("apple pie"));
        assert!(!sensitive.is_match("Apple"));
    }

    #[test]
    fn test_whole_text() {
        let matcher = SubstringMatcher::new("apple", false, true);
        assert!(matcher.is_match("APPLE"));
        assert!(!matcher.is_match("apple pie"));

        let matcher = SubstringMatcher::new("apple", true, true);
        assert!(!matcher.is_match("Apple"));
    }
}
