//! Ranked multi-tag search.
//!
//! An image scores one point per distinct query tag it carries. Ranking and
//! hydration share one transaction, so the returned images are exactly the
//! ones that were ranked.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, Transaction};
use tracing::{debug, trace};

use pantsu_core::logging::{COMPONENT_SEARCH, SUBSYSTEM_DB};
use pantsu_core::{defaults, normalize_query, Error, Image, ImageId, ImageSearch, RankedImage, Result};

use crate::content::SqliteContentRepository;

/// SQLite implementation of ImageSearch.
#[derive(Clone)]
pub struct SqliteImageSearch {
    pool: Pool<Sqlite>,
    content: SqliteContentRepository,
    default_limit: usize,
}

impl SqliteImageSearch {
    /// Create a search over the given pool using the built-in result limit.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self::with_limit(pool, defaults::SEARCH_LIMIT)
    }

    /// Create a search with a custom default result limit.
    pub fn with_limit(pool: Pool<Sqlite>, default_limit: usize) -> Self {
        Self {
            content: SqliteContentRepository::new(pool.clone()),
            pool,
            default_limit,
        }
    }

    /// The limit applied by [`ImageSearch::search_tags`].
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Rank and hydrate within an existing transaction.
    pub async fn search_tags_ranked_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<RankedImage>> {
        let query_tags = normalize_query(tags);
        if query_tags.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let ranked = if query_tags.len() <= defaults::DB_BIND_CHUNK {
            self.count_matches_tx(tx, &query_tags, Some(limit)).await?
        } else {
            // Terms are deduplicated, so per-chunk counts add up per image.
            let mut totals: HashMap<ImageId, i64> = HashMap::new();
            for chunk in query_tags.chunks(defaults::DB_BIND_CHUNK) {
                for (image_id, matches) in self.count_matches_tx(tx, chunk, None).await? {
                    *totals.entry(image_id).or_default() += matches;
                }
            }
            let mut ranked: Vec<(ImageId, i64)> = totals.into_iter().collect();
            ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1));
            ranked.truncate(limit);
            ranked
        };
        for (image_id, matches) in &ranked {
            trace!(
                subsystem = SUBSYSTEM_DB,
                component = COMPONENT_SEARCH,
                image_id = *image_id,
                matches = *matches,
                "Ranked hit"
            );
        }

        let ids: Vec<ImageId> = ranked.iter().map(|(id, _)| *id).collect();
        let scores: HashMap<ImageId, i64> = ranked.into_iter().collect();
        let images = self.content.get_many_images_tx(tx, &ids).await?;

        let results: Vec<RankedImage> = images
            .into_iter()
            .map(|image| RankedImage {
                matches: scores.get(&image.id).copied().unwrap_or_default(),
                image,
            })
            .collect();

        debug!(
            subsystem = SUBSYSTEM_DB,
            component = COMPONENT_SEARCH,
            op = "search",
            query_tags = query_tags.len(),
            limit,
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Ranked tag search complete"
        );
        Ok(results)
    }

    /// Count distinct matching tags per image, best first.
    async fn count_matches_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        query_tags: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<(ImageId, i64)>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT l.image_id AS image_id, COUNT(DISTINCT l.tag_id) AS matches
            FROM image_tag_link l
            JOIN tag t ON t.id = l.tag_id
            WHERE t.text IN ("#,
        );
        let mut separated = query.separated(", ");
        for tag in query_tags {
            separated.push_bind(tag.clone());
        }
        separated.push_unseparated(")");
        query.push(" GROUP BY l.image_id ORDER BY matches DESC");
        if let Some(limit) = limit {
            query.push(" LIMIT ");
            query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query
            .build()
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::from)?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<ImageId, _>("image_id"), r.get::<i64, _>("matches")))
            .collect())
    }
}

#[async_trait]
impl ImageSearch for SqliteImageSearch {
    async fn search_tags(&self, tags: &[String]) -> Result<Vec<Image>> {
        let ranked = self.search_tags_ranked(tags, self.default_limit).await?;
        Ok(ranked.into_iter().map(|r| r.image).collect())
    }

    async fn search_tags_ranked(&self, tags: &[String], limit: usize) -> Result<Vec<RankedImage>> {
        // Nothing to rank: skip the store entirely.
        if normalize_query(tags).is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(Error::from)?;
        let results = self.search_tags_ranked_tx(&mut tx, tags, limit).await?;
        tx.commit().await.map_err(Error::from)?;
        Ok(results)
    }
}
