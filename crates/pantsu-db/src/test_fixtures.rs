//! Test fixtures for database integration tests.
//!
//! Every [`TestDatabase`] is a private, migrated in-memory SQLite database, so
//! tests run in parallel without sharing state and without an external server.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pantsu_db::test_fixtures::TestDatabase;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let test_db = TestDatabase::new().await;
//!     let user = test_db.user("alice").await;
//!     let image = test_db.image(user.id, &["wew", "kek"]).await;
//!
//!     // Run your tests...
//! }
//! ```

use std::sync::Arc;

use sqlx::SqlitePool;

use pantsu_core::logging;

use crate::pool::{create_pool_with_config, PoolConfig};
use crate::{
    ContentRepository, Database, Error, Image, ImageId, NewImage, NewUser,
    PasswordHasher, Result, User, UserRepository,
};

/// URL for a private in-memory database.
pub const IN_MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Password every fixture user is created with.
pub const TEST_PASSWORD: &str = "hunter2";

/// Test database with all repositories wired up.
pub struct TestDatabase {
    pub pool: SqlitePool,
    pub db: Database,
}

impl TestDatabase {
    /// Create a fresh, migrated in-memory database.
    ///
    /// Uses [`TestHasher`] so account creation costs nothing.
    pub async fn new() -> Self {
        logging::init_test_tracing();

        let pool = create_pool_with_config(IN_MEMORY_DATABASE_URL, PoolConfig::in_memory())
            .await
            .expect("Failed to create test database pool");
        Self::from_pool(pool).await
    }

    /// Wrap and migrate an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Self {
        let db = Database::new(pool.clone()).with_password_hasher(Arc::new(TestHasher));
        db.migrate().await.expect("Failed to run migrations");
        Self { pool, db }
    }

    /// Create a user named `username` with an address derived from it.
    pub async fn user(&self, username: &str) -> User {
        self.db
            .users
            .create_user(NewUser::new(
                username,
                format!("{}@example.com", username),
                TEST_PASSWORD,
            ))
            .await
            .expect("Failed to create test user")
    }

    /// Post an image by `poster` carrying `tags`.
    pub async fn image(&self, poster: i64, tags: &[&str]) -> Image {
        self.db
            .content
            .add_image(NewImage::new("test artist", poster).with_tags(tags.iter().copied()))
            .await
            .expect("Failed to create test image")
    }

    /// Number of rows in the tag catalog.
    pub async fn tag_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tag")
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count tags")
    }

    /// Number of link rows, optionally restricted to one image.
    pub async fn link_count(&self, image_id: Option<ImageId>) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM image_tag_link WHERE ?1 IS NULL OR image_id = ?1",
        )
        .bind(image_id)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to count links")
    }

    /// Whether a tag with exactly this text exists.
    pub async fn tag_exists(&self, text: &str) -> bool {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag WHERE text = ?")
            .bind(text)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to look up tag");
        count > 0
    }

    /// Sorted tag texts attached to an image.
    pub async fn tag_texts(&self, image_id: ImageId) -> Vec<String> {
        sqlx::query_scalar(
            r#"
            SELECT t.text FROM tag t
            JOIN image_tag_link l ON l.tag_id = t.id
            WHERE l.image_id = ?
            ORDER BY t.text
            "#,
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await
        .expect("Failed to list image tags")
    }
}

/// Password hasher for tests: reversible and instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestHasher;

impl PasswordHasher for TestHasher {
    fn hash(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(Error::Credential("Empty password".to_string()));
        }
        Ok(format!("test${}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let stored = hash
            .strip_prefix("test$")
            .ok_or_else(|| Error::Credential("Not a test hash".to_string()))?;
        Ok(stored == password)
    }
}
