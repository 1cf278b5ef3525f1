//! Search tag normalization.
//!
//! Every tag a caller supplies is canonicalized before it is used to build
//! an index path: lower-cased, trimmed, and stripped of `/`, `#` and `%`.

use serde::{Deserialize, Serialize};

use crate::core::NozomiError;

/// A tag that has passed [`sanitize`]
///
/// Never empty and never starts with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SanitizedTag(String);

impl SanitizedTag {
    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SanitizedTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SanitizedTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for SanitizedTag {
    type Err = NozomiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        sanitize(s)
    }
}

impl TryFrom<String> for SanitizedTag {
    type Error = NozomiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        sanitize(&value)
    }
}

impl From<SanitizedTag> for String {
    fn from(tag: SanitizedTag) -> Self {
        tag.0
    }
}

/// Canonicalize a raw search tag.
///
/// Fails with [`NozomiError::InvalidTagFormat`] when nothing is left after
/// stripping, or when the result begins with `-` (the catalog reserves a
/// leading dash for exclusion syntax).
pub fn sanitize(tag: &str) -> Result<SanitizedTag, NozomiError> {
    let stripped: String = tag
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '/' | '#' | '%'))
        .collect();
    // Trim after stripping so "/ a" and "a" canonicalize identically.
    let sanitized = stripped.trim().to_string();

    if sanitized.is_empty() {
        return Err(NozomiError::InvalidTagFormat {
            tag: tag.to_string(),
            reason: "cannot be empty after sanitization",
        });
    }
    if sanitized.starts_with('-') {
        return Err(NozomiError::InvalidTagFormat {
            tag: tag.to_string(),
            reason: "cannot begin with character '-'",
        });
    }

    Ok(SanitizedTag(sanitized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_valid_tag() {
        let tag = sanitize("shuten_douji_(fate/grand_order)").unwrap();
        assert_eq!(tag.as_str(), "shuten_douji_(fategrand_order)");
    }

    #[test]
    fn test_sanitize_lowercases_and_trims() {
        assert_eq!(sanitize("  Akali ").unwrap().as_str(), "akali");
        assert_eq!(sanitize("#100%").unwrap().as_str(), "100");
    }

    #[test]
    fn test_sanitize_invalid_tags() {
        for raw in ["", "/", "#", "//", "-", "   ", "-veigar", " /-x"] {
            let result = sanitize(raw);
            assert!(
                matches!(result, Err(NozomiError::InvalidTagFormat { .. })),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for raw in ["Shuten_Douji_(Fate/Grand_Order)", "a#b%c", " Veigar ", "x-y"] {
            let once = sanitize(raw).unwrap();
            let twice = sanitize(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_whitespace_exposed_by_stripping_is_trimmed() {
        assert_eq!(sanitize("/ akali #").unwrap().as_str(), "akali");
    }

    #[test]
    fn test_interior_dash_is_allowed() {
        assert_eq!(sanitize("x-y").unwrap().as_str(), "x-y");
    }

    #[test]
    fn test_parse_and_deserialize() {
        let tag: SanitizedTag = "Akali".parse().unwrap();
        assert_eq!(tag.to_string(), "akali");

        let tag: SanitizedTag = serde_json::from_str("\"Fate/Zero\"").unwrap();
        assert_eq!(tag.as_str(), "fatezero");
        assert!(serde_json::from_str::<SanitizedTag>("\"-\"").is_err());
    }
}
