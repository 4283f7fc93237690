//! Identity filter over `user@stack`.

use regex::Regex;
use trailcast_types::AgentKey;

/// Errors that can occur when compiling a filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The pattern is not a valid regular expression.
    #[error("invalid filter pattern {pattern:?}: {source}")]
    Pattern {
        /// The pattern as given.
        pattern: String,
        /// The underlying regex error.
        source: regex::Error,
    },
}

/// A compiled identity filter. The empty pattern matches every agent.
#[derive(Debug, Clone, Default)]
pub struct IdentityFilter {
    regex: Option<Regex>,
}

impl IdentityFilter {
    /// A filter that matches everything.
    pub const fn allow_all() -> Self {
        Self { regex: None }
    }

    /// Compile `pattern`. Surrounding whitespace is ignored.
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(Self::allow_all());
        }
        let regex = Regex::new(pattern).map_err(|source| FilterError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self { regex: Some(regex) })
    }

    /// The active pattern, if any.
    pub fn pattern(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }

    /// Whether `key` passes the filter.
    pub fn matches(&self, key: &AgentKey) -> bool {
        self.regex
            .as_ref()
            .is_none_or(|regex| regex.is_match(&key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use trailcast_types::StackId;

    use super::*;

    #[test]
    fn empty_pattern_matches_everything() {
        let filter = IdentityFilter::new("  ").unwrap();
        assert!(filter.pattern().is_none());
        assert!(filter.matches(&AgentKey::new("anyone", StackId::Explicit(1))));
    }

    #[test]
    fn pattern_sees_user_and_stack() {
        let filter = IdentityFilter::new("^alice@7$").unwrap();
        assert!(filter.matches(&AgentKey::new("alice", StackId::Explicit(7))));
        assert!(!filter.matches(&AgentKey::new("alice", StackId::Explicit(8))));
        assert!(!filter.matches(&AgentKey::new("bob", StackId::Explicit(7))));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(matches!(
            IdentityFilter::new("(unclosed"),
            Err(FilterError::Pattern { .. })
        ));
    }
}
