//! Tag text normalization.
//!
//! Tags are compared and stored case-insensitively: every text passes through
//! [`normalize_tag`] before it reaches the store. Writes go through the strict
//! [`normalize_tags`]; searches use the lenient [`normalize_query`].

use std::collections::HashSet;

use crate::defaults::MAX_TAG_LENGTH;
use crate::error::{Error, Result};

/// Trim surrounding whitespace and lower-case a tag text.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Validate a normalized tag text.
///
/// Rules:
/// - Length between 1-100 characters
/// - No whitespace (tags are entered as a whitespace-separated string)
/// - No control characters
pub fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    if tag.is_empty() {
        return Err("Tag cannot be empty".to_string());
    }
    if tag.chars().count() > MAX_TAG_LENGTH {
        return Err(format!(
            "Tag must be {} characters or less",
            MAX_TAG_LENGTH
        ));
    }

    let invalid_chars: Vec<char> = tag
        .chars()
        .filter(|c| c.is_whitespace() || c.is_control())
        .collect();

    if !invalid_chars.is_empty() {
        let chars_display: String = invalid_chars
            .iter()
            .take(5)
            .map(|c| format!("{:?}", c))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(format!(
            "Tag '{}' contains invalid characters: {}",
            tag.escape_debug(),
            chars_display
        ));
    }

    Ok(())
}

/// Normalize, validate and deduplicate tags for a write.
///
/// Order of first appearance is kept, so `["B", "a", "b"]` becomes
/// `["b", "a"]`. Any invalid entry fails the whole batch before the store is
/// touched.
pub fn normalize_tags<I, S>(tags: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = normalize_tag(tag.as_ref());
        validate_tag(&tag).map_err(Error::InvalidInput)?;
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    Ok(out)
}

/// Normalize and deduplicate search terms.
///
/// Lenient: entries that could never name a stored tag are dropped instead of
/// failing the search.
pub fn normalize_query<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| normalize_tag(t.as_ref()))
        .filter(|t| validate_tag(t).is_ok())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Split a whitespace-separated tag string, e.g. `"wew more_tags kek"`.
pub fn parse_tag_string(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_lowercases_and_trims() {
        assert_eq!(normalize_tag("  Cats "), "cats");
        assert_eq!(normalize_tag("ÉCOLE"), "école");
        assert_eq!(normalize_tag("already_fine"), "already_fine");
    }

    #[test]
    fn test_validate_tag_accepts_free_form_text() {
        assert!(validate_tag("cat").is_ok());
        assert!(validate_tag("long_hair").is_ok());
        assert!(validate_tag("artist:someone").is_ok());
        assert!(validate_tag("c++").is_ok());
        assert!(validate_tag("日本").is_ok());
    }

    #[test]
    fn test_validate_tag_rejects_empty() {
        let err = validate_tag("").unwrap_err();
        assert_eq!(err, "Tag cannot be empty");
    }

    #[test]
    fn test_validate_tag_rejects_whitespace() {
        let err = validate_tag("two words").unwrap_err();
        assert!(err.contains("invalid characters"));
    }

    #[test]
    fn test_validate_tag_rejects_control_chars() {
        assert!(validate_tag("bell\u{7}").is_err());
    }

    #[test]
    fn test_validate_tag_length_limit() {
        let max = "a".repeat(MAX_TAG_LENGTH);
        assert!(validate_tag(&max).is_ok());
        let over = "a".repeat(MAX_TAG_LENGTH + 1);
        assert!(validate_tag(&over).is_err());
    }

    #[test]
    fn test_normalize_tags_deduplicates_case_insensitively() {
        let tags = normalize_tags(["a", "a", "A"]).unwrap();
        assert_eq!(tags, vec!["a".to_string()]);
    }

    #[test]
    fn test_normalize_tags_keeps_first_seen_order() {
        let tags = normalize_tags(["B", "a", "b", "c"]).unwrap();
        assert_eq!(tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_normalize_tags_rejects_blank_entry() {
        let err = normalize_tags(["ok", "   "]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_normalize_tags_empty_input() {
        let tags = normalize_tags(Vec::<String>::new()).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_normalize_query_drops_invalid_entries() {
        let query = normalize_query(["A", "", "a", "two words", "b"]);
        assert_eq!(query, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_tag_string() {
        assert_eq!(
            parse_tag_string("wew  more_tags\tkek\n"),
            vec!["wew", "more_tags", "kek"]
        );
        assert!(parse_tag_string("   ").is_empty());
    }
}
