//! Strongly-typed ID types for domain entities.
//!
//! Two families exist: IDs generated by this framework use ULID
//! (Universally Unique Lexicographically Sortable Identifier) format, and
//! IDs assigned by the chat platform arrive as opaque strings through the
//! transport adapter and are wrapped without interpretation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Try with prefix first
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = if let Some(stripped) = s.strip_prefix(prefix_with_underscore) {
                    stripped
                } else {
                    // Try parsing as raw ULID
                    s
                };

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }
    };
}

/// Macro to generate a newtype around a platform-assigned string ID.
///
/// These IDs come from the transport adapter exactly as the chat platform
/// issued them; the framework never inspects their contents.
macro_rules! define_platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a platform-assigned identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a conversation session.
    SessionId,
    "sess"
);

define_platform_id!(
    /// Platform-assigned identifier for a user.
    UserId
);

define_platform_id!(
    /// Platform-assigned identifier for a chat.
    ChatId
);

define_platform_id!(
    /// Platform-assigned identifier for a message.
    MessageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_format() {
        let id = SessionId::new();
        let display = id.to_string();
        assert!(display.starts_with("sess_"));
    }

    #[test]
    fn session_id_parse_with_prefix() {
        let id = SessionId::new();
        let display = id.to_string();
        let parsed: SessionId = display.parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_parse_without_prefix() {
        let ulid = Ulid::new();
        let id: SessionId = ulid.to_string().parse().expect("should parse");
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn session_id_parse_invalid() {
        let result: Result<SessionId, _> = "not_a_ulid".parse();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.id_type, "SessionId");
    }

    #[test]
    fn user_id_wraps_platform_string() {
        let id = UserId::new("12345678");
        assert_eq!(id.as_str(), "12345678");
        assert_eq!(id.to_string(), "12345678");
    }

    #[test]
    fn user_id_equality_and_hash() {
        use std::collections::HashSet;

        let a = UserId::from("alice");
        let b = UserId::from("bob");

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(b);
        set.insert(a); // duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn platform_id_serde_roundtrip() {
        let id = ChatId::new("chat-42");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"chat-42\"");
        let parsed: ChatId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_serde_roundtrip() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        let parsed: SessionId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }
}
