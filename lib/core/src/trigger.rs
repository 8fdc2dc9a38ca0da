//! Trigger matching for plugin activation.
//!
//! A trigger decides whether an otherwise-unassociated inbound message
//! activates a plugin. Two modes exist: literal exact-string equality
//! (case-sensitive), and pattern mode, selected by the reserved
//! `"regexp "` prefix, which tests the remainder as a regular expression
//! against the whole text.

use regex::Regex;
use std::fmt;

/// Reserved prefix selecting pattern mode for a trigger string.
pub const PATTERN_PREFIX: &str = "regexp ";

/// Errors from trigger construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// The trigger string was empty.
    Empty,
    /// The pattern after the `regexp ` prefix failed to compile.
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "trigger is empty"),
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid trigger pattern '{pattern}': {reason}")
            }
        }
    }
}

impl std::error::Error for TriggerError {}

/// A parsed plugin trigger.
///
/// Parsing happens once at plugin construction; matching is a pure
/// function with no side effects.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Literal exact-string match, case-sensitive.
    Exact(String),
    /// Regular-expression match against the whole text (unanchored).
    Pattern(Regex),
}

impl Trigger {
    /// Parses a raw trigger string.
    ///
    /// An empty string is a configuration error. A `"regexp "` prefix
    /// selects pattern mode; the remainder must compile.
    pub fn parse(raw: &str) -> Result<Self, TriggerError> {
        if raw.is_empty() {
            return Err(TriggerError::Empty);
        }

        if let Some(pattern) = raw.strip_prefix(PATTERN_PREFIX) {
            Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|e| TriggerError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
        } else {
            Ok(Self::Exact(raw.to_string()))
        }
    }

    /// Returns true if the message text activates this trigger.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(literal) => literal == text,
            Self::Pattern(re) => re.is_match(text),
        }
    }
}
