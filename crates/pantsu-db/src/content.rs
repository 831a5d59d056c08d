//! Image and comment repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, Transaction};
use tracing::{debug, warn};

use pantsu_core::logging::{COMPONENT_CONTENT, SUBSYSTEM_DB};
use pantsu_core::{
    defaults, Comment, CommentId, ContentRepository, Error, Image, ImageDetails, ImageId, NewComment,
    NewImage, Result, UpdateImageRequest,
};

use crate::links::SqliteTagLinkRepository;
use crate::users::{ensure_user_exists, fetch_user_tx};

pub(crate) const IMAGE_COLUMNS: &str = "id, posted_at, author, source, poster";

pub(crate) fn row_to_image(row: &SqliteRow) -> Image {
    Image {
        id: row.get("id"),
        posted_at: row.get("posted_at"),
        author: row.get("author"),
        source: row.get("source"),
        poster: row.get("poster"),
    }
}

fn row_to_comment(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        image_id: row.get("image_id"),
        poster: row.get("poster"),
        text: row.get("text"),
    }
}

/// Fail with `ImageNotFound` unless the image exists.
pub(crate) async fn ensure_image_exists(
    tx: &mut Transaction<'_, Sqlite>,
    image_id: ImageId,
) -> Result<()> {
    let found: Option<ImageId> = sqlx::query_scalar("SELECT id FROM image WHERE id = ?")
        .bind(image_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::from)?;

    found.map(|_| ()).ok_or(Error::ImageNotFound(image_id))
}

/// SQLite implementation of ContentRepository.
#[derive(Clone)]
pub struct SqliteContentRepository {
    pool: Pool<Sqlite>,
    links: SqliteTagLinkRepository,
}

impl SqliteContentRepository {
    /// Create a new SqliteContentRepository with the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            links: SqliteTagLinkRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn add_image(&self, req: NewImage) -> Result<Image> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let image = self.add_image_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(image)
    }

    async fn get_image(&self, id: ImageId) -> Result<Image> {
        let row = sqlx::query(&format!("SELECT {IMAGE_COLUMNS} FROM image WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)?
            .ok_or(Error::ImageNotFound(id))?;

        Ok(row_to_image(&row))
    }

    async fn get_many_images(&self, ids: &[ImageId]) -> Result<Vec<Image>> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let images = self.get_many_images_tx(&mut tx, ids).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(images)
    }

    async fn update_image(&self, id: ImageId, req: UpdateImageRequest) -> Result<Image> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE image
            SET author = COALESCE(?, author),
                source = COALESCE(?, source)
            WHERE id = ?
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(req.author)
        .bind(req.source)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from)?
        .ok_or(Error::ImageNotFound(id))?;

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_CONTENT,
            op = "update_image",
            image_id = id,
            "Updated image"
        );
        Ok(row_to_image(&row))
    }

    async fn delete_image(&self, id: ImageId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        self.delete_image_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(())
    }

    async fn hydrate(&self, image: Image) -> Result<ImageDetails> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let details = self.hydrate_tx(&mut tx, image).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(details)
    }

    async fn add_comment(&self, req: NewComment) -> Result<Comment> {
        if req.text.trim().is_empty() {
            return Err(Error::InvalidInput("Comment text cannot be empty".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        ensure_image_exists(&mut tx, req.image_id).await?;
        ensure_user_exists(&mut tx, req.poster).await?;

        let row = sqlx::query(
            r#"
            INSERT INTO comment (image_id, poster, text)
            VALUES (?, ?, ?)
            RETURNING id, image_id, poster, text
            "#,
        )
        .bind(req.image_id)
        .bind(req.poster)
        .bind(&req.text)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::from)?;
        tx.commit().await.map_err(Error::from)?;

        let comment = row_to_comment(&row);
        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_CONTENT,
            op = "add_comment",
            image_id = comment.image_id,
            comment_id = comment.id,
            "Added comment"
        );
        Ok(comment)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let removed = sqlx::query("DELETE FROM comment WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::from)?
            .rows_affected();

        if removed == 0 {
            return Err(Error::CommentNotFound(id));
        }
        Ok(())
    }

    async fn list_comments(&self, image_id: ImageId) -> Result<Vec<Comment>> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let comments = self.list_comments_tx(&mut tx, image_id).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(comments)
    }
}

/// Transaction-aware variants.
impl SqliteContentRepository {
    /// Insert an image and link its initial tags within an existing
    /// transaction.
    pub async fn add_image_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        req: NewImage,
    ) -> Result<Image> {
        ensure_user_exists(tx, req.poster).await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO image (posted_at, author, source, poster)
            VALUES (?, ?, ?, ?)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(&req.author)
        .bind(&req.source)
        .bind(req.poster)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::from)?;
        let image = row_to_image(&row);

        let linked = self.links.insert_tags_tx(tx, image.id, &req.tags).await?;

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_CONTENT,
            op = "add_image",
            image_id = image.id,
            poster = image.poster,
            linked,
            "Added image"
        );
        Ok(image)
    }

    /// Fetch images in the order of `ids` within an existing transaction.
    ///
    /// Ids that do not resolve are skipped; repeated ids repeat the image.
    pub async fn get_many_images_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        ids: &[ImageId],
    ) -> Result<Vec<Image>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<ImageId, Image> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(defaults::DB_BIND_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {IMAGE_COLUMNS} FROM image WHERE id IN ("
            ));
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows = query
                .build()
                .fetch_all(&mut **tx)
                .await
                .map_err(Error::from)?;
            by_id.extend(rows.iter().map(row_to_image).map(|image| (image.id, image)));
        }

        let mut images = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.get(id) {
                Some(image) => images.push(image.clone()),
                None => warn!(
                    subsystem = SUBSYSTEM_DB,
                    component = COMPONENT_CONTENT,
                    op = "get_many",
                    image_id = *id,
                    "Requested image does not exist, skipping"
                ),
            }
        }
        Ok(images)
    }

    /// Delete an image within an existing transaction.
    ///
    /// Links go first so the orphan purge sees them gone; comments cascade
    /// with the image row.
    pub async fn delete_image_tx(&self, tx: &mut Transaction<'_, Sqlite>, id: ImageId) -> Result<()> {
        let unlinked = self.links.delete_all_tags_tx(tx, id).await?;

        sqlx::query("DELETE FROM image WHERE id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::from)?;

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_CONTENT,
            op = "delete_image",
            image_id = id,
            unlinked,
            "Deleted image"
        );
        Ok(())
    }

    /// Load poster, tags and comments within an existing transaction.
    pub async fn hydrate_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image: Image,
    ) -> Result<ImageDetails> {
        let poster = fetch_user_tx(tx, image.poster).await?;
        let tags = self.links.get_tags_for_image_tx(tx, image.id).await?;
        let comments = self.list_comments_tx(tx, image.id).await?;

        Ok(ImageDetails {
            image,
            poster,
            tags,
            comments,
        })
    }

    /// List an image's comments within an existing transaction.
    pub async fn list_comments_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
    ) -> Result<Vec<Comment>> {
        ensure_image_exists(tx, image_id).await?;

        let rows = sqlx::query(
            "SELECT id, image_id, poster, text FROM comment WHERE image_id = ? ORDER BY id",
        )
        .bind(image_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::from)?;

        Ok(rows.iter().map(row_to_comment).collect())
    }
}
