//! Core traits for pantsu-booru abstractions.
//!
//! These traits define the interfaces that store implementations must
//! satisfy. Every method is one unit of work against the store: it either
//! completes fully or fails with a typed [`Error`](crate::Error) and leaves no
//! partial writes behind.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// TAG TRAITS
// =============================================================================

/// Global catalog of unique tag texts.
#[async_trait]
pub trait TagRegistry: Send + Sync {
    /// Map every requested text to its tag id, creating missing tags.
    ///
    /// Inputs are normalized and deduplicated; the returned map is keyed by
    /// normalized text. A creation race that the store could not resolve is
    /// reported as `TagConflict` and may be retried.
    async fn resolve_or_create(&self, texts: &[String]) -> Result<HashMap<String, TagId>>;

    /// Get a tag by ID.
    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>>;

    /// Get a tag by text (normalized before lookup).
    async fn get_tag_by_text(&self, text: &str) -> Result<Option<Tag>>;

    /// List all tags with their image counts, sorted by text.
    async fn list_tags(&self) -> Result<Vec<TagUsage>>;

    /// Delete every tag with no remaining links. Returns the number removed.
    async fn purge_orphan_tags(&self) -> Result<u64>;
}

/// Many-to-many link between images and tags.
#[async_trait]
pub trait TagAssociationRepository: Send + Sync {
    /// Attach tags to an image, skipping ones it already carries.
    ///
    /// Returns the number of links created.
    async fn insert_tags(&self, image_id: ImageId, tags: &[String]) -> Result<u64>;

    /// Replace an image's whole tag set.
    async fn replace_tags(&self, image_id: ImageId, tags: &[String]) -> Result<()>;

    /// Remove all of an image's tags, then delete tags left without links.
    ///
    /// Returns the number of links removed.
    async fn delete_all_tags(&self, image_id: ImageId) -> Result<u64>;

    /// Attach one existing tag; fails with `TagExists` if already attached.
    async fn add_single_tag(&self, image_id: ImageId, tag_id: TagId) -> Result<TagLink>;

    /// Attach a tag by text, creating it if needed; fails with `TagExists` if
    /// the image already carries it.
    async fn add_tag_by_text(&self, image_id: ImageId, text: &str) -> Result<Tag>;

    /// Detach one tag, deleting the tag itself if this was its last link.
    async fn delete_single_tag(&self, image_id: ImageId, tag_id: TagId) -> Result<()>;

    /// Get an image's tags, sorted by text.
    async fn get_tags_for_image(&self, image_id: ImageId) -> Result<Vec<Tag>>;
}

// =============================================================================
// SEARCH TRAITS
// =============================================================================

/// Ranked multi-tag search.
///
/// Results are ordered by descending number of matched query tags. The order
/// among images with equal match counts is undefined.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Search with the configured default limit.
    async fn search_tags(&self, tags: &[String]) -> Result<Vec<Image>>;

    /// Search returning at most `limit` images with their match counts.
    async fn search_tags_ranked(&self, tags: &[String], limit: usize) -> Result<Vec<RankedImage>>;
}

// =============================================================================
// CONTENT TRAITS
// =============================================================================

/// Image and comment operations.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Post an image together with its initial tags.
    async fn add_image(&self, req: NewImage) -> Result<Image>;

    /// Get an image; fails with `ImageNotFound` if missing.
    async fn get_image(&self, id: ImageId) -> Result<Image>;

    /// Fetch images in exactly the order of `ids`. Missing ids are skipped.
    async fn get_many_images(&self, ids: &[ImageId]) -> Result<Vec<Image>>;

    /// Update an image's author and/or source.
    async fn update_image(&self, id: ImageId, req: UpdateImageRequest) -> Result<Image>;

    /// Delete an image with its links, comments and resulting orphan tags.
    async fn delete_image(&self, id: ImageId) -> Result<()>;

    /// Load an image's poster, tags and comments.
    async fn hydrate(&self, image: Image) -> Result<ImageDetails>;

    /// Add a comment to an image.
    async fn add_comment(&self, req: NewComment) -> Result<Comment>;

    /// Delete a comment; fails with `CommentNotFound` if missing.
    async fn delete_comment(&self, id: CommentId) -> Result<()>;

    /// List an image's comments, oldest first.
    async fn list_comments(&self, image_id: ImageId) -> Result<Vec<Comment>>;
}

// =============================================================================
// USER TRAITS
// =============================================================================

/// Account operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Register a user; duplicate username or email is a `ConstraintViolation`.
    async fn create_user(&self, req: NewUser) -> Result<User>;

    /// Get a user; fails with `UserNotFound` if missing.
    async fn get_user(&self, id: UserId) -> Result<User>;

    /// Look up a user by exact username.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Delete a user with everything they posted.
    async fn delete_user(&self, id: UserId) -> Result<()>;

    /// List a user's images, newest first.
    async fn list_user_images(&self, id: UserId) -> Result<Vec<Image>>;
}
