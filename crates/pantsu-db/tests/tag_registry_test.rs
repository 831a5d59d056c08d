use std::collections::HashMap;

use pantsu_db::test_fixtures::TestDatabase;
use pantsu_db::{
    create_pool_with_config, Database, Error, PoolConfig, Result, TagId, TagRegistry,
};

fn texts(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_resolve_creates_missing_tags() {
    let test_db = TestDatabase::new().await;

    let resolved = test_db
        .db
        .tags
        .resolve_or_create(&texts(&["wew", "kek"]))
        .await
        .expect("resolve");

    assert_eq!(resolved.len(), 2);
    assert_ne!(resolved["wew"], resolved["kek"]);
    assert_eq!(test_db.tag_count().await, 2);
}

#[tokio::test]
async fn test_resolve_reuses_existing_ids() {
    let test_db = TestDatabase::new().await;
    let tags = &test_db.db.tags;

    let first = tags.resolve_or_create(&texts(&["wew"])).await.unwrap();
    let second = tags
        .resolve_or_create(&texts(&["wew", "more_tags"]))
        .await
        .unwrap();

    assert_eq!(first["wew"], second["wew"]);
    assert_eq!(test_db.tag_count().await, 2);
}

/// Differently-cased inputs collapse to one lower-case tag.
#[tokio::test]
async fn test_resolve_is_case_insensitive() {
    let test_db = TestDatabase::new().await;

    let resolved = test_db
        .db
        .tags
        .resolve_or_create(&texts(&["Blue_Sky", "BLUE_SKY", " blue_sky "]))
        .await
        .unwrap();

    assert_eq!(resolved.len(), 1);
    assert!(resolved.contains_key("blue_sky"));
    assert_eq!(test_db.tag_count().await, 1);
    assert!(test_db.tag_exists("blue_sky").await);
    assert!(!test_db.tag_exists("Blue_Sky").await);
}

#[tokio::test]
async fn test_resolve_empty_input_is_noop() {
    let test_db = TestDatabase::new().await;

    let resolved = test_db.db.tags.resolve_or_create(&[]).await.unwrap();

    assert!(resolved.is_empty());
    assert_eq!(test_db.tag_count().await, 0);
}

#[tokio::test]
async fn test_resolve_rejects_invalid_batch() {
    let test_db = TestDatabase::new().await;

    let err = test_db
        .db
        .tags
        .resolve_or_create(&texts(&["fine", "two words"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(test_db.tag_count().await, 0);
}

#[tokio::test]
async fn test_get_tag_by_id_and_text() {
    let test_db = TestDatabase::new().await;
    let tags = &test_db.db.tags;
    let resolved = tags.resolve_or_create(&texts(&["kek"])).await.unwrap();
    let id = resolved["kek"];

    let by_id = tags.get_tag(id).await.unwrap().expect("tag by id");
    let by_text = tags.get_tag_by_text("KEK").await.unwrap().expect("tag by text");

    assert_eq!(by_id, by_text);
    assert_eq!(by_id.text, "kek");
    assert!(tags.get_tag(id + 1000).await.unwrap().is_none());
    assert!(tags.get_tag_by_text("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_tags_reports_usage() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    test_db.image(user.id, &["wew", "kek"]).await;
    test_db.image(user.id, &["wew"]).await;

    let usage = test_db.db.tags.list_tags().await.unwrap();
    let counts: HashMap<String, i64> = usage
        .into_iter()
        .map(|u| (u.tag.text, u.image_count))
        .collect();

    assert_eq!(counts.len(), 2);
    assert_eq!(counts["wew"], 2);
    assert_eq!(counts["kek"], 1);
}

#[tokio::test]
async fn test_purge_orphan_tags_removes_only_unlinked() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    test_db.image(user.id, &["wew"]).await;
    test_db
        .db
        .tags
        .resolve_or_create(&texts(&["lonely", "forgotten"]))
        .await
        .unwrap();

    let removed = test_db.db.tags.purge_orphan_tags().await.unwrap();

    assert_eq!(removed, 2);
    assert!(test_db.tag_exists("wew").await);
    assert!(!test_db.tag_exists("lonely").await);
    assert_eq!(test_db.db.tags.purge_orphan_tags().await.unwrap(), 0);
}

async fn resolve_with_retry(db: &Database, tags: &[String]) -> Result<HashMap<String, TagId>> {
    let mut attempts = 0;
    loop {
        match db.tags.resolve_or_create(tags).await {
            Err(e) if e.is_retryable() && attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            other => return other,
        }
    }
}

/// Two independent pools racing to create overlapping tags end up with one
/// row per text, and both callers see the same ids.
#[tokio::test]
async fn test_concurrent_resolve_creates_each_tag_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());

    let first = Database::new(
        create_pool_with_config(&url, PoolConfig::new().max_connections(2))
            .await
            .unwrap(),
    );
    first.migrate().await.unwrap();
    let second = Database::new(
        create_pool_with_config(&url, PoolConfig::new().max_connections(2))
            .await
            .unwrap(),
    );

    let left = texts(&["shared", "left_only", "both"]);
    let right = texts(&["both", "right_only", "shared"]);
    for _ in 0..5 {
        let (a, b) = tokio::join!(
            resolve_with_retry(&first, &left),
            resolve_with_retry(&second, &right)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a["shared"], b["shared"]);
        assert_eq!(a["both"], b["both"]);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag")
        .fetch_one(first.pool())
        .await
        .unwrap();
    assert_eq!(count, 4);
}

/// Creating more tags than one statement can bind still resolves every text,
/// and a second pass finds them all.
#[tokio::test]
async fn test_resolve_beyond_bind_limit() {
    let test_db = TestDatabase::new().await;
    let many: Vec<String> = (0..25_000).map(|i| format!("tag_{i}")).collect();

    let created = test_db.db.tags.resolve_or_create(&many).await.unwrap();
    let again = test_db.db.tags.resolve_or_create(&many).await.unwrap();

    assert_eq!(created.len(), 25_000);
    assert_eq!(again, created);
    assert_eq!(test_db.tag_count().await, 25_000);
}
