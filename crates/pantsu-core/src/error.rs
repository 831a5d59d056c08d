//! Error types for pantsu-booru.

use thiserror::Error;

use crate::models::{CommentId, ImageId, TagId, UserId};

/// Result type alias using pantsu-booru's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// SQLITE_BUSY primary result code.
const SQLITE_BUSY: i32 = 5;

/// SQLITE_LOCKED primary result code.
const SQLITE_LOCKED: i32 = 6;

/// Core error type for pantsu-booru operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Transport or session failure talking to the store
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Image not found
    #[error("Image not found: {0}")]
    ImageNotFound(ImageId),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Tag not found
    #[error("Tag not found: {0}")]
    TagNotFound(TagId),

    /// Comment not found
    #[error("Comment not found: {0}")]
    CommentNotFound(CommentId),

    /// The image does not carry the given tag
    #[error("Tag {tag_id} is not attached to image {image_id}")]
    LinkNotFound { image_id: ImageId, tag_id: TagId },

    /// Strict add of a tag the image already carries
    #[error("Tag {tag_id} is already attached to image {image_id}")]
    TagExists { image_id: ImageId, tag_id: TagId },

    /// Concurrent creation race on a new tag text
    #[error("Tag creation conflict: {0}")]
    TagConflict(String),

    /// Store-level uniqueness or integrity constraint violated
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Password hashing or verification failed
    #[error("Credential error: {0}")]
    Credential(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for every "the referenced row does not exist" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ImageNotFound(_)
                | Error::UserNotFound(_)
                | Error::TagNotFound(_)
                | Error::CommentNotFound(_)
                | Error::LinkNotFound { .. }
        )
    }

    /// True when repeating the same call may succeed without changing input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TagConflict(_) | Error::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Error::StoreUnavailable(e.to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Database(ref db) if is_busy_code(db.code().as_deref()) => {
                Error::StoreUnavailable(db.message().to_string())
            }
            other => Error::Database(other),
        }
    }
}

/// Extended result codes keep the primary code in the low byte.
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
