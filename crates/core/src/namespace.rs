//! Tenant namespaces.
//!
//! A namespace is the project identifier that isolates one tenant's
//! knowledge from another's. It is lowercase ASCII alphanumerics and
//! hyphens, at most [`Namespace::MAX_LEN`] characters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Separator between a namespace and a group name in qualified group ids.
pub const NAMESPACE_DELIMITER: &str = "__";

/// A validated tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    pub const MAX_LEN: usize = 50;

    /// Validate an explicit project id.
    ///
    /// Uppercase letters are folded to lowercase; any other character
    /// outside `[a-z0-9-]` is rejected.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
        let value = value.as_ref();
        let invalid = |reason: &str| ConfigError::InvalidProjectId {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if value.is_empty() {
            return Err(invalid("project_id cannot be empty"));
        }
        if value.chars().count() > Self::MAX_LEN {
            return Err(invalid("project_id must be at most 50 characters"));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid(
                "project_id may only contain alphanumeric characters and hyphens",
            ));
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Derive a namespace from an arbitrary name such as a directory name.
    ///
    /// Lowercases, turns whitespace and underscores into hyphens, drops any
    /// other non-alphanumeric character, collapses hyphen runs and trims
    /// to [`Self::MAX_LEN`]. Returns `None` when nothing usable remains.
    pub fn normalize(raw: &str) -> Option<Self> {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            let mapped = if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '_' || c == '-' {
                Some('-')
            } else {
                None
            };
            if let Some(m) = mapped {
                if m == '-' && (out.is_empty() || out.ends_with('-')) {
                    continue;
                }
                out.push(m);
            }
        }

        out.truncate(Self::MAX_LEN);
        let trimmed = out.trim_end_matches('-');
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix a group name with this namespace.
    pub fn prefix(&self, group: &str) -> String {
        format!("{}{}{}", self.0, NAMESPACE_DELIMITER, group)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases() {
        assert_eq!(Namespace::normalize("MyProject").unwrap().as_str(), "myproject");
    }

    #[test]
    fn normalize_replaces_spaces() {
        assert_eq!(
            Namespace::normalize("My Project Name").unwrap().as_str(),
            "my-project-name"
        );
    }

    #[test]
    fn normalize_drops_punctuation() {
        assert_eq!(
            Namespace::normalize("project@name#123").unwrap().as_str(),
            "projectname123"
        );
    }

    #[test]
    fn normalize_handles_underscores_and_runs() {
        let ns = Namespace::normalize("my__project   name").unwrap();
        assert!(!ns.as_str().contains('_'));
        assert!(!ns.as_str().contains("--"));
        assert_eq!(ns.as_str(), "my-project-name");
    }

    #[test]
    fn normalize_truncates_long_names() {
        let long = "a".repeat(80);
        assert_eq!(Namespace::normalize(&long).unwrap().as_str().len(), 50);
    }

    #[test]
    fn normalize_empty_is_none() {
        assert!(Namespace::normalize("").is_none());
        assert!(Namespace::normalize("   ").is_none());
        assert!(Namespace::normalize("@@@").is_none());
    }

    #[test]
    fn normalize_preserves_valid_ids() {
        assert_eq!(
            Namespace::normalize("my-existing-project").unwrap().as_str(),
            "my-existing-project"
        );
    }

    #[test]
    fn new_rejects_invalid_characters() {
        let err = Namespace::new("invalid@project#name").unwrap_err();
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn new_enforces_length_limit() {
        assert!(Namespace::new("a".repeat(50)).is_ok());
        let err = Namespace::new("a".repeat(51)).unwrap_err();
        assert!(err.to_string().contains("50 characters"));
    }

    #[test]
    fn prefix_uses_double_underscore() {
        let ns = Namespace::new("my-project").unwrap();
        assert_eq!(ns.prefix("feature_specs"), "my-project__feature_specs");
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Namespace>(r#""ok-project""#).is_ok());
        assert!(serde_json::from_str::<Namespace>(r#""bad project!""#).is_err());
    }
}
