//! Image/tag link repository.
//!
//! Every write runs in one transaction and leaves the catalog free of tags
//! without links before it commits, except `insert_tags`, which only adds.

use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, Transaction};
use tracing::{debug, trace};

use pantsu_core::logging::{COMPONENT_LINKS, SUBSYSTEM_DB};
use pantsu_core::{
    defaults, normalize_tag, normalize_tags, validate_tag, Error, ImageId, Result, Tag, TagAssociationRepository,
    TagId, TagLink,
};

use crate::content::ensure_image_exists;
use crate::tags::SqliteTagRegistry;

/// SQLite implementation of TagAssociationRepository.
#[derive(Clone)]
pub struct SqliteTagLinkRepository {
    pool: Pool<Sqlite>,
    registry: SqliteTagRegistry,
}

impl SqliteTagLinkRepository {
    /// Create a new SqliteTagLinkRepository with the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            registry: SqliteTagRegistry::new(pool.clone()),
            pool,
        }
    }

    /// The tag catalog this repository resolves texts through.
    pub fn registry(&self) -> &SqliteTagRegistry {
        &self.registry
    }
}

#[async_trait]
impl TagAssociationRepository for SqliteTagLinkRepository {
    async fn insert_tags(&self, image_id: ImageId, tags: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let created = self.insert_tags_tx(&mut tx, image_id, tags).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(created)
    }

    async fn replace_tags(&self, image_id: ImageId, tags: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        self.replace_tags_tx(&mut tx, image_id, tags).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(())
    }

    async fn delete_all_tags(&self, image_id: ImageId) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let removed = self.delete_all_tags_tx(&mut tx, image_id).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(removed)
    }

    async fn add_single_tag(&self, image_id: ImageId, tag_id: TagId) -> Result<TagLink> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let link = self.add_single_tag_tx(&mut tx, image_id, tag_id).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(link)
    }

    async fn add_tag_by_text(&self, image_id: ImageId, text: &str) -> Result<Tag> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let tag = self.add_tag_by_text_tx(&mut tx, image_id, text).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(tag)
    }

    async fn delete_single_tag(&self, image_id: ImageId, tag_id: TagId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        self.delete_single_tag_tx(&mut tx, image_id, tag_id).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(())
    }

    async fn get_tags_for_image(&self, image_id: ImageId) -> Result<Vec<Tag>> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let tags = self.get_tags_for_image_tx(&mut tx, image_id).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(tags)
    }
}

/// Transaction-aware variants for callers composing larger units of work.
impl SqliteTagLinkRepository {
    /// Attach tags to an image within an existing transaction.
    pub async fn insert_tags_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
        tags: &[String],
    ) -> Result<u64> {
        let tags = normalize_tags(tags)?;
        ensure_image_exists(tx, image_id).await?;
        self.link_tags_tx(tx, image_id, &tags).await
    }

    /// Replace an image's tag set within an existing transaction.
    ///
    /// Unlinks everything, links the new set, then purges orphans. Tags kept
    /// across the replacement are relinked before the purge, so they survive.
    pub async fn replace_tags_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
        tags: &[String],
    ) -> Result<()> {
        let tags = normalize_tags(tags)?;
        ensure_image_exists(tx, image_id).await?;

        let removed = self.unlink_all_tx(tx, image_id).await?;
        let created = self.link_tags_tx(tx, image_id, &tags).await?;
        let purged = self.registry.purge_orphans_tx(tx).await?;

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_LINKS,
            op = "replace",
            image_id,
            removed,
            created,
            purged,
            "Replaced image tags"
        );
        Ok(())
    }

    /// Remove all of an image's links and purge orphans within an existing
    /// transaction.
    pub async fn delete_all_tags_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
    ) -> Result<u64> {
        ensure_image_exists(tx, image_id).await?;
        let removed = self.unlink_all_tx(tx, image_id).await?;
        let purged = self.registry.purge_orphans_tx(tx).await?;

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_LINKS,
            op = "delete_all",
            image_id,
            removed,
            purged,
            "Removed all image tags"
        );
        Ok(removed)
    }

    /// Attach one existing tag within an existing transaction.
    pub async fn add_single_tag_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
        tag_id: TagId,
    ) -> Result<TagLink> {
        ensure_image_exists(tx, image_id).await?;
        if self.registry.get_tag_tx(tx, tag_id).await?.is_none() {
            return Err(Error::TagNotFound(tag_id));
        }

        let row = sqlx::query(
            "INSERT INTO image_tag_link (tag_id, image_id) VALUES (?, ?) RETURNING id",
        )
        .bind(tag_id)
        .bind(image_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match Error::from(e) {
            Error::ConstraintViolation(_) => Error::TagExists { image_id, tag_id },
            other => other,
        })?;

        trace!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_LINKS,
            op = "add_single",
            image_id,
            tag_id,
            "Linked tag"
        );
        Ok(TagLink {
            id: row.get("id"),
            tag_id,
            image_id,
        })
    }

    /// Attach a tag by text within an existing transaction.
    ///
    /// When the image already carries the tag the error propagates and the
    /// caller's rollback discards any tag created on the way.
    pub async fn add_tag_by_text_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
        text: &str,
    ) -> Result<Tag> {
        let text = normalize_tag(text);
        validate_tag(&text).map_err(Error::InvalidInput)?;
        ensure_image_exists(tx, image_id).await?;

        let resolved = self
            .registry
            .resolve_or_create_tx(tx, std::slice::from_ref(&text))
            .await?;
        let tag_id = resolved
            .get(&text)
            .copied()
            .ok_or_else(|| Error::TagConflict(text.clone()))?;

        self.add_single_tag_tx(tx, image_id, tag_id).await?;
        Ok(Tag { id: tag_id, text })
    }

    /// Detach one tag within an existing transaction, deleting the tag if it
    /// has no links left.
    pub async fn delete_single_tag_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
        tag_id: TagId,
    ) -> Result<()> {
        ensure_image_exists(tx, image_id).await?;

        let removed = sqlx::query("DELETE FROM image_tag_link WHERE image_id = ? AND tag_id = ?")
            .bind(image_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::from)?
            .rows_affected();
        if removed == 0 {
            return Err(Error::LinkNotFound { image_id, tag_id });
        }

        let tag_removed = self.registry.purge_if_orphan_tx(tx, tag_id).await?;
        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_LINKS,
            op = "delete_single",
            image_id,
            tag_id,
            tag_removed,
            "Unlinked tag"
        );
        Ok(())
    }

    /// Get an image's tags within an existing transaction.
    pub async fn get_tags_for_image_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
    ) -> Result<Vec<Tag>> {
        ensure_image_exists(tx, image_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT t.id, t.text
            FROM tag t
            JOIN image_tag_link l ON l.tag_id = t.id
            WHERE l.image_id = ?
            ORDER BY t.text
            "#,
        )
        .bind(image_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .map(|r| Tag {
                id: r.get("id"),
                text: r.get("text"),
            })
            .collect())
    }

    /// Link already-normalized texts, skipping links that exist.
    async fn link_tags_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        image_id: ImageId,
        tags: &[String],
    ) -> Result<u64> {
        let resolved = self.registry.resolve_or_create_tx(tx, tags).await?;
        if resolved.is_empty() {
            return Ok(0);
        }

        let mut tag_ids: Vec<TagId> = resolved.into_values().collect();
        tag_ids.sort_unstable();

        // Two binds per row.
        let mut created = 0;
        for chunk in tag_ids.chunks(defaults::DB_BIND_CHUNK / 2) {
            let mut insert =
                QueryBuilder::<Sqlite>::new("INSERT INTO image_tag_link (tag_id, image_id) ");
            insert.push_values(chunk, |mut row, tag_id| {
                row.push_bind(*tag_id).push_bind(image_id);
            });
            insert.push(" ON CONFLICT (tag_id, image_id) DO NOTHING");

            created += insert
                .build()
                .execute(&mut **tx)
                .await
                .map_err(Error::from)?
                .rows_affected();
        }

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_LINKS,
            op = "link",
            image_id,
            requested = tag_ids.len(),
            created,
            "Linked tags"
        );
        Ok(created)
    }

    async fn unlink_all_tx(&self, tx: &mut Transaction<'_, Sqlite>, image_id: ImageId) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM image_tag_link WHERE image_id = ?")
            .bind(image_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::from)?
            .rows_affected();
        Ok(removed)
    }
}
