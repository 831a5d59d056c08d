//! Tag catalog implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, Transaction};
use tracing::{debug, trace};

use pantsu_core::logging::{COMPONENT_TAGS, SUBSYSTEM_DB};
use pantsu_core::{
    defaults, normalize_tag, normalize_tags, Error, Result, Tag, TagId, TagRegistry, TagUsage,
};

/// SQLite implementation of TagRegistry.
#[derive(Clone)]
pub struct SqliteTagRegistry {
    pool: Pool<Sqlite>,
}

impl SqliteTagRegistry {
    /// Create a new SqliteTagRegistry with the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRegistry for SqliteTagRegistry {
    async fn resolve_or_create(&self, texts: &[String]) -> Result<HashMap<String, TagId>> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let resolved = self.resolve_or_create_tx(&mut tx, texts).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(resolved)
    }

    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, text FROM tag WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)?;

        Ok(row.map(|r| Tag {
            id: r.get("id"),
            text: r.get("text"),
        }))
    }

    async fn get_tag_by_text(&self, text: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, text FROM tag WHERE text = ?")
            .bind(normalize_tag(text))
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)?;

        Ok(row.map(|r| Tag {
            id: r.get("id"),
            text: r.get("text"),
        }))
    }

    async fn list_tags(&self) -> Result<Vec<TagUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.id,
                t.text,
                COUNT(l.id) AS image_count
            FROM tag t
            LEFT JOIN image_tag_link l ON l.tag_id = t.id
            GROUP BY t.id, t.text
            ORDER BY t.text
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .map(|r| TagUsage {
                tag: Tag {
                    id: r.get("id"),
                    text: r.get("text"),
                },
                image_count: r.get("image_count"),
            })
            .collect())
    }

    async fn purge_orphan_tags(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let removed = self.purge_orphans_tx(&mut tx).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(removed)
    }
}

/// Transaction-aware variants, composed by the link and content repositories.
impl SqliteTagRegistry {
    /// Resolve tag texts to ids within an existing transaction, creating the
    /// missing ones with multi-row inserts.
    pub async fn resolve_or_create_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        texts: &[String],
    ) -> Result<HashMap<String, TagId>> {
        let texts = normalize_tags(texts)?;
        if texts.is_empty() {
            return Ok(HashMap::new());
        }

        let mut resolved = self.lookup_tx(tx, &texts).await?;
        let missing: Vec<String> = texts
            .iter()
            .filter(|t| !resolved.contains_key(*t))
            .cloned()
            .collect();

        if missing.is_empty() {
            trace!(
                subsystem = SUBSYSTEM_DB,
                component = COMPONENT_TAGS,
                op = "resolve",
                tag_count = texts.len(),
                "All tags already exist"
            );
            return Ok(resolved);
        }

        let mut created = 0;
        for chunk in missing.chunks(defaults::DB_BIND_CHUNK) {
            let mut insert = QueryBuilder::<Sqlite>::new("INSERT INTO tag (text) ");
            insert.push_values(chunk, |mut row, text| {
                row.push_bind(text.clone());
            });
            insert.push(" ON CONFLICT (text) DO NOTHING RETURNING id, text");

            let rows = insert
                .build()
                .fetch_all(&mut **tx)
                .await
                .map_err(|e| tag_write_error(e, chunk))?;
            created += rows.len();
            for row in rows {
                resolved.insert(row.get("text"), row.get("id"));
            }
        }

        // DO NOTHING returns no row for texts another writer created after our lookup.
        let raced: Vec<String> = missing
            .iter()
            .filter(|t| !resolved.contains_key(*t))
            .cloned()
            .collect();
        if !raced.is_empty() {
            resolved.extend(self.lookup_tx(tx, &raced).await?);
            if let Some(lost) = raced.iter().find(|t| !resolved.contains_key(*t)) {
                return Err(Error::TagConflict(lost.clone()));
            }
        }

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_TAGS,
            op = "resolve",
            tag_count = texts.len(),
            created,
            raced = raced.len(),
            "Resolved tags"
        );
        Ok(resolved)
    }

    /// Get a tag by ID within an existing transaction.
    pub async fn get_tag_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: TagId,
    ) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, text FROM tag WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::from)?;

        Ok(row.map(|r| Tag {
            id: r.get("id"),
            text: r.get("text"),
        }))
    }

    /// Delete every tag without links, as one set-difference statement.
    pub async fn purge_orphans_tx(&self, tx: &mut Transaction<'_, Sqlite>) -> Result<u64> {
        let removed = sqlx::query(
            r#"
            DELETE FROM tag
            WHERE NOT EXISTS (
                SELECT 1 FROM image_tag_link l WHERE l.tag_id = tag.id
            )
            "#,
        )
        .execute(&mut **tx)
        .await
        .map_err(Error::from)?
        .rows_affected();

        if removed > 0 {
            debug!(
                subsystem = SUBSYSTEM_DB,
                component = COMPONENT_TAGS,
                op = "purge_orphans",
                removed,
                "Removed orphan tags"
            );
        }
        Ok(removed)
    }

    /// Delete one tag if nothing links to it any more. Returns whether it went.
    pub async fn purge_if_orphan_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        tag_id: TagId,
    ) -> Result<bool> {
        let removed = sqlx::query(
            r#"
            DELETE FROM tag
            WHERE id = ?1
              AND NOT EXISTS (SELECT 1 FROM image_tag_link WHERE tag_id = ?1)
            "#,
        )
        .bind(tag_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::from)?
        .rows_affected();

        Ok(removed > 0)
    }

    async fn lookup_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        texts: &[String],
    ) -> Result<HashMap<String, TagId>> {
        let mut found = HashMap::with_capacity(texts.len());
        for chunk in texts.chunks(defaults::DB_BIND_CHUNK) {
            let mut query =
                QueryBuilder::<Sqlite>::new("SELECT id, text FROM tag WHERE text IN (");
            let mut separated = query.separated(", ");
            for text in chunk {
                separated.push_bind(text.clone());
            }
            separated.push_unseparated(")");

            let rows = query
                .build()
                .fetch_all(&mut **tx)
                .await
                .map_err(Error::from)?;
            found.extend(
                rows.into_iter()
                    .map(|r| (r.get::<String, _>("text"), r.get::<TagId, _>("id"))),
            );
        }
        Ok(found)
    }
}

/// A uniqueness failure while creating tags means another writer won the race.
fn tag_write_error(e: sqlx::Error, texts: &[String]) -> Error {
    match Error::from(e) {
        Error::ConstraintViolation(_) => Error::TagConflict(texts.join(" ")),
        other => other,
    }
}
