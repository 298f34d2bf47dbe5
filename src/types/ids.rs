//! Newtype wrappers for git identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when a string is not a full hexadecimal commit id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid SHA: {0:?}")]
pub struct InvalidSha(pub String);

/// A git commit SHA (40 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(String);

impl Sha {
    /// Parses a full SHA, accepting surrounding whitespace (as printed by git).
    pub fn parse(s: impl AsRef<str>) -> Result<Self, InvalidSha> {
        let trimmed = s.as_ref().trim();
        let valid = trimmed.len() == 40
            && trimmed
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Sha(trimmed.to_string()))
        } else {
            Err(InvalidSha(s.as_ref().to_string()))
        }
    }

    /// Returns the SHA as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short (7-character) version of the SHA for display.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Sha {
    type Error = InvalidSha;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Sha::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_accepts_full_hex() {
        let sha = Sha::parse("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(sha.short(), "0123456");
    }

    #[test]
    fn parse_trims_trailing_newline() {
        let sha = Sha::parse(format!("{}\n", "a".repeat(40))).unwrap();
        assert_eq!(sha.as_str(), "a".repeat(40));
    }

    #[test]
    fn parse_rejects_short_and_non_hex() {
        assert!(Sha::parse("abc123").is_err());
        assert!(Sha::parse("g".repeat(40)).is_err());
        assert!(Sha::parse("A".repeat(40)).is_err());
        assert!(Sha::parse("").is_err());
    }

    proptest! {
        #[test]
        fn serde_is_transparent(s in "[0-9a-f]{40}") {
            let sha = Sha::parse(&s).unwrap();
            let json = serde_json::to_string(&sha).unwrap();
            prop_assert_eq!(json, format!("\"{}\"", s));
        }
    }
}
