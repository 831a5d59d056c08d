//! # pantsu-db
//!
//! SQLite store layer for pantsu-booru.
//!
//! This crate provides:
//! - Connection pool management
//! - The global tag catalog with batched resolve-or-create
//! - Image/tag links with orphan tag cleanup
//! - Ranked multi-tag search
//! - Image, comment and account repositories
//!
//! ## Example
//!
//! ```rust,ignore
//! use pantsu_db::{ContentRepository, Database, ImageSearch, NewImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://pantsu.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let image = db
//!         .content
//!         .add_image(NewImage::new("artist", 1).with_tags(["wew", "kek"]))
//!         .await?;
//!
//!     let hits = db.search.search_tags(&["wew".to_string()]).await?;
//!     assert_eq!(hits[0].id, image.id);
//!     Ok(())
//! }
//! ```

pub mod content;
pub mod links;
pub mod pool;
pub mod search;
pub mod tags;
pub mod users;


// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use pantsu_core::*;

pub use content::SqliteContentRepository;
pub use links::SqliteTagLinkRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use search::SqliteImageSearch;
pub use tags::SqliteTagRegistry;
pub use users::SqliteUserRepository;

use std::sync::Arc;

use tracing::info;

use pantsu_core::logging::{COMPONENT_POOL, SUBSYSTEM_DB};

/// Database handle holding every repository over one shared pool.
#[derive(Clone)]
pub struct Database {
    /// Connection pool.
    pub pool: sqlx::Pool<sqlx::Sqlite>,
    /// Account repository.
    pub users: SqliteUserRepository,
    /// Global tag catalog.
    pub tags: SqliteTagRegistry,
    /// Image/tag links.
    pub links: SqliteTagLinkRepository,
    /// Images and comments.
    pub content: SqliteContentRepository,
    /// Ranked tag search.
    pub search: SqliteImageSearch,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    ///
    /// Passwords are hashed with Argon2 and searches use the built-in limit.
    pub fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self {
            users: SqliteUserRepository::new(pool.clone(), Arc::new(Argon2Hasher::new())),
            tags: SqliteTagRegistry::new(pool.clone()),
            links: SqliteTagLinkRepository::new(pool.clone()),
            content: SqliteContentRepository::new(pool.clone()),
            search: SqliteImageSearch::new(pool.clone()),
            pool,
        }
    }

    /// Replace the password hasher used for new accounts.
    pub fn with_password_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.users = SqliteUserRepository::new(self.pool.clone(), hasher);
        self
    }

    /// Set the result limit applied by `search_tags`.
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search = SqliteImageSearch::with_limit(self.pool.clone(), limit);
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect using a loaded [`BooruConfig`].
    pub async fn connect_with_config(config: &BooruConfig) -> Result<Self> {
        let pool = create_pool_with_config(&config.database_url, PoolConfig::from(config)).await?;
        Ok(Self::new(pool).with_search_limit(config.search_limit))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;

        info!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_POOL,
            op = "migrate",
            "Migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }
}
