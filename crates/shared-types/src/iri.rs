//! # IRI Value Object
//!
//! Absolute IRIs are the identity type for every object exchanged over the
//! federation overlay. Cross-object edges (witness -> credential -> activity)
//! are IRIs resolved through a store, never in-memory pointers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from IRI validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IriError {
    /// The string is empty.
    #[error("IRI is empty")]
    Empty,
    /// The string has no scheme separator.
    #[error("IRI is not absolute: {0}")]
    NotAbsolute(String),
    /// The string contains whitespace.
    #[error("IRI contains whitespace: {0}")]
    Whitespace(String),
}

/// A validated absolute IRI.
///
/// Stored as the original string; equality and hashing are byte-wise, which
/// matches the federation rule that identity is the exact IRI string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    /// Parse and validate an absolute IRI.
    pub fn parse(s: impl Into<String>) -> Result<Self, IriError> {
        let s = s.into();
        if s.is_empty() {
            return Err(IriError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(IriError::Whitespace(s));
        }
        // Absolute form: "<scheme>:<rest>" with a non-empty alphabetic-led scheme.
        let Some((scheme, rest)) = s.split_once(':') else {
            return Err(IriError::NotAbsolute(s));
        };
        if rest.is_empty()
            || scheme.is_empty()
            || !scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(IriError::NotAbsolute(s));
        }
        Ok(Self(s))
    }

    /// The IRI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a path segment, inserting a single `/` separator.
    #[must_use]
    pub fn join(&self, segment: &str) -> Iri {
        let base = self.0.trim_end_matches('/');
        let seg = segment.trim_start_matches('/');
        Iri(format!("{base}/{seg}"))
    }

    /// The `scheme://authority` prefix, if this is a hierarchical IRI.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        let rest = self.0.split_once("://")?.1;
        let end = rest.find('/').map_or(self.0.len(), |i| {
            self.0.len() - rest.len() + i
        });
        Some(&self.0[..end])
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Iri {
    type Error = IriError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Iri::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https() {
        let iri = Iri::parse("https://peer1.example.com/services/anchor").unwrap();
        assert_eq!(iri.as_str(), "https://peer1.example.com/services/anchor");
    }

    #[test]
    fn test_parse_did() {
        assert!(Iri::parse("did:web:peer1.example.com").is_ok());
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert_eq!(
            Iri::parse("/services/anchor"),
            Err(IriError::NotAbsolute("/services/anchor".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_whitespace() {
        assert_eq!(Iri::parse(""), Err(IriError::Empty));
        assert!(matches!(
            Iri::parse("https://a b"),
            Err(IriError::Whitespace(_))
        ));
    }

    #[test]
    fn test_join() {
        let base = Iri::parse("https://peer1.example.com/cas/").unwrap();
        assert_eq!(
            base.join("uEiAsiw").as_str(),
            "https://peer1.example.com/cas/uEiAsiw"
        );
    }

    #[test]
    fn test_origin() {
        let iri = Iri::parse("https://peer1.example.com/services/anchor").unwrap();
        assert_eq!(iri.origin(), Some("https://peer1.example.com"));
        assert_eq!(Iri::parse("did:web:x").unwrap().origin(), None);
    }

    #[test]
    fn test_serde_transparent() {
        let iri = Iri::parse("https://peer1.example.com/a1").unwrap();
        let json = serde_json::to_string(&iri).unwrap();
        assert_eq!(json, "\"https://peer1.example.com/a1\"");
        let back: Iri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, iri);
    }
}
