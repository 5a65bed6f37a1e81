// Identifier matching: first (leftmost) pattern match in a text string
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::DEFAULT_PATTERN;

static DEFAULT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_PATTERN).expect("default identifier pattern compiles"));

/// Applies the configured pattern to page text.
#[derive(Debug, Clone)]
pub struct IdentifierMatcher {
    pattern: Regex,
}

impl Default for IdentifierMatcher {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_REGEX.clone(),
        }
    }
}

impl IdentifierMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Leftmost match, or `None`. No match is not an error.
    pub fn find(&self, text: &str) -> Option<String> {
        self.pattern.find(text).map(|m| m.as_str().to_string())
    }
}
