//! Row snapshots and request types for pantsu-booru.
//!
//! Every value returned from a repository is an immutable snapshot of the row
//! at read time. Changes go through explicit repository operations; nothing
//! here holds a handle back into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::parse_tag_string;

/// Store-assigned user identifier.
pub type UserId = i64;

/// Store-assigned image identifier.
pub type ImageId = i64;

/// Store-assigned tag identifier.
pub type TagId = i64;

/// Store-assigned image/tag link identifier.
pub type LinkId = i64;

/// Store-assigned comment identifier.
pub type CommentId = i64;

// =============================================================================
// USERS
// =============================================================================

/// A registered account.
///
/// The stored password hash is not part of this value; it never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub joined_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
}

/// Request for registering a new user.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Plain-text password; hashed by the configured `PasswordHasher`.
    pub password: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// IMAGES
// =============================================================================

/// A posted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub posted_at: DateTime<Utc>,
    pub author: String,
    pub source: Option<String>,
    /// The user who posted the image.
    pub poster: UserId,
}

/// Request for posting a new image.
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub author: String,
    pub source: Option<String>,
    pub poster: UserId,
    /// Free-form tag texts; normalized and deduplicated on insert.
    pub tags: Vec<String>,
}

impl NewImage {
    pub fn new(author: impl Into<String>, poster: UserId) -> Self {
        Self {
            author: author.into(),
            poster,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set tags from a whitespace-separated string such as `"wew more_tags kek"`.
    pub fn with_tag_string(mut self, tags: &str) -> Self {
        self.tags = parse_tag_string(tags);
        self
    }
}

/// Partial update of an image's descriptive fields. `None` keeps the value.
#[derive(Debug, Clone, Default)]
pub struct UpdateImageRequest {
    pub author: Option<String>,
    pub source: Option<String>,
}

/// An image paired with the number of query tags it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedImage {
    pub image: Image,
    pub matches: i64,
}

/// An image with its relationships loaded.
///
/// Built by `ContentRepository::hydrate`; the image value itself stays a
/// plain snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetails {
    pub image: Image,
    pub poster: User,
    /// Sorted by tag text.
    pub tags: Vec<Tag>,
    /// Oldest first.
    pub comments: Vec<Comment>,
}

// =============================================================================
// TAGS
// =============================================================================

/// A globally unique, normalized tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub text: String,
}

/// A tag with the number of images currently carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    pub tag: Tag,
    pub image_count: i64,
}

/// One (image, tag) membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagLink {
    pub id: LinkId,
    pub tag_id: TagId,
    pub image_id: ImageId,
}

// =============================================================================
// COMMENTS
// =============================================================================

/// A comment left on an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub image_id: ImageId,
    pub poster: UserId,
    pub text: String,
}

/// Request for adding a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub image_id: ImageId,
    pub poster: UserId,
    pub text: String,
}

impl NewComment {
    pub fn new(image_id: ImageId, poster: UserId, text: impl Into<String>) -> Self {
        Self {
            image_id,
            poster,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_debug_redacts_password() {
        let user = NewUser::new("alice", "alice@example.com", "hunter2");
        let debug = format!("{:?}", user);
        assert!(debug.contains("alice@example.com"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_user_serialization_has_no_password_field() {
        let user = User {
            id: 1,
            joined_at: Utc::now(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_new_image_builder() {
        let req = NewImage::new("me", 7)
            .with_source("www.source.com/source")
            .with_tags(["wew", "more_tags"]);
        assert_eq!(req.author, "me");
        assert_eq!(req.poster, 7);
        assert_eq!(req.source.as_deref(), Some("www.source.com/source"));
        assert_eq!(req.tags, vec!["wew".to_string(), "more_tags".to_string()]);
    }

    #[test]
    fn test_new_image_from_tag_string() {
        let req = NewImage::new("me", 7).with_tag_string("  wew more_tags\tkek ");
        assert_eq!(req.tags, vec!["wew", "more_tags", "kek"]);
    }

    #[test]
    fn test_new_image_defaults_to_no_tags() {
        let req = NewImage::new("me", 1);
        assert!(req.tags.is_empty());
        assert!(req.source.is_none());
    }
}
