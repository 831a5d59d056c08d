//! Account repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, Transaction};
use tracing::{debug, info};

use pantsu_core::logging::{COMPONENT_USERS, SUBSYSTEM_DB};
use pantsu_core::{
    Error, Image, NewUser, PasswordHasher, Result, User, UserId, UserRepository,
};

use crate::content::{row_to_image, IMAGE_COLUMNS};
use crate::tags::SqliteTagRegistry;

const USER_COLUMNS: &str = r#"id, joined_at, username, email"#;

fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        joined_at: row.get("joined_at"),
        username: row.get("username"),
        email: row.get("email"),
    }
}

/// Fail with `UserNotFound` unless the user exists.
pub(crate) async fn ensure_user_exists(tx: &mut Transaction<'_, Sqlite>, id: UserId) -> Result<()> {
    let found: Option<UserId> = sqlx::query_scalar(r#"SELECT id FROM "user" WHERE id = ?"#)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::from)?;

    found.map(|_| ()).ok_or(Error::UserNotFound(id))
}

pub(crate) async fn fetch_user_tx(tx: &mut Transaction<'_, Sqlite>, id: UserId) -> Result<User> {
    let row = sqlx::query(&format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = ?"#))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::from)?
        .ok_or(Error::UserNotFound(id))?;

    Ok(row_to_user(&row))
}

/// SQLite implementation of UserRepository.
///
/// Passwords are hashed on the blocking pool before any connection is
/// acquired.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
    hasher: Arc<dyn PasswordHasher>,
    registry: SqliteTagRegistry,
}

impl SqliteUserRepository {
    /// Create a new SqliteUserRepository hashing passwords with `hasher`.
    pub fn new(pool: Pool<Sqlite>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            registry: SqliteTagRegistry::new(pool.clone()),
            pool,
            hasher,
        }
    }

    /// Check a password against the stored credential for `username`.
    ///
    /// Returns `Ok(None)` for an unknown user or a wrong password.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            r#"SELECT {USER_COLUMNS}, password FROM "user" WHERE username = ?"#
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let stored: String = row.get("password");
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| Error::Internal(format!("Password verification task failed: {}", e)))??;

        Ok(matches.then(|| row_to_user(&row)))
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, req: NewUser) -> Result<User> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        if username.is_empty() {
            return Err(Error::InvalidInput("Username cannot be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(Error::InvalidInput(format!("Invalid email address: {}", email)));
        }
        if req.password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let hasher = Arc::clone(&self.hasher);
        let password = req.password;
        let credential = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))??;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO "user" (joined_at, username, email, password)
            VALUES (?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(&username)
        .bind(&email)
        .bind(&credential)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match Error::from(e) {
            Error::ConstraintViolation(_) => Error::ConstraintViolation(format!(
                "Username or email already registered: {}",
                username
            )),
            other => other,
        })?;

        let user = row_to_user(&row);
        info!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_USERS,
            op = "create",
            user_id = user.id,
            "Created user"
        );
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        let row = sqlx::query(&format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE id = ?"#))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)?
            .ok_or(Error::UserNotFound(id))?;

        Ok(row_to_user(&row))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE username = ?"#
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from)?;

        Ok(row.as_ref().map(row_to_user))
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        ensure_user_exists(&mut tx, id).await?;

        // Images, their links and comments go with the user via ON DELETE CASCADE.
        sqlx::query(r#"DELETE FROM "user" WHERE id = ?"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::from)?;
        let purged = self.registry.purge_orphans_tx(&mut tx).await?;
        tx.commit().await.map_err(Error::from)?;

        info!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_USERS,
            op = "delete",
            user_id = id,
            purged,
            "Deleted user"
        );
        Ok(())
    }

    async fn list_user_images(&self, id: UserId) -> Result<Vec<Image>> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        ensure_user_exists(&mut tx, id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {IMAGE_COLUMNS} FROM image WHERE poster = ? ORDER BY posted_at DESC, id DESC"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::from)?;
        tx.commit().await.map_err(Error::from)?;

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_USERS,
            op = "list_images",
            user_id = id,
            result_count = rows.len(),
            "Listed user images"
        );
        Ok(rows.iter().map(row_to_image).collect())
    }
}
