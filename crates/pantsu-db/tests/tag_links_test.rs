use pantsu_db::test_fixtures::TestDatabase;
use pantsu_db::{Error, TagAssociationRepository, TagRegistry};

fn texts(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_insert_tags_collapses_duplicates() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &[]).await;

    let created = test_db
        .db
        .links
        .insert_tags(image.id, &texts(&["a", "a", "A"]))
        .await
        .unwrap();

    assert_eq!(created, 1);
    assert_eq!(test_db.tag_texts(image.id).await, vec!["a"]);
    assert_eq!(test_db.link_count(Some(image.id)).await, 1);
}

#[tokio::test]
async fn test_insert_tags_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew"]).await;
    let links = &test_db.db.links;

    let created = links
        .insert_tags(image.id, &texts(&["wew", "kek"]))
        .await
        .unwrap();
    let again = links
        .insert_tags(image.id, &texts(&["kek", "WEW"]))
        .await
        .unwrap();

    assert_eq!(created, 1);
    assert_eq!(again, 0);
    assert_eq!(test_db.tag_texts(image.id).await, vec!["kek", "wew"]);
}

#[tokio::test]
async fn test_insert_tags_on_missing_image() {
    let test_db = TestDatabase::new().await;

    let err = test_db
        .db
        .links
        .insert_tags(404, &texts(&["wew"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ImageNotFound(404)));
    assert_eq!(test_db.tag_count().await, 0);
}

#[tokio::test]
async fn test_insert_tags_rejects_invalid_text() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &[]).await;

    let long = "x".repeat(101);
    for bad in ["", "   ", "has space", long.as_str()] {
        let err = test_db
            .db
            .links
            .insert_tags(image.id, &texts(&["ok", bad]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "accepted {:?}", bad);
    }
    assert_eq!(test_db.tag_count().await, 0);
}

#[tokio::test]
async fn test_replace_tags_swaps_set_and_purges_orphans() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew", "kek", "shared"]).await;
    let other = test_db.image(user.id, &["shared"]).await;

    test_db
        .db
        .links
        .replace_tags(image.id, &texts(&["kek", "fresh"]))
        .await
        .unwrap();

    assert_eq!(test_db.tag_texts(image.id).await, vec!["fresh", "kek"]);
    assert_eq!(test_db.tag_texts(other.id).await, vec!["shared"]);
    assert!(!test_db.tag_exists("wew").await);
    assert!(test_db.tag_exists("shared").await);
}

#[tokio::test]
async fn test_replace_tags_keeps_surviving_tag_id() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew", "kek"]).await;
    let before = test_db.db.tags.get_tag_by_text("kek").await.unwrap().unwrap();

    test_db
        .db
        .links
        .replace_tags(image.id, &texts(&["kek"]))
        .await
        .unwrap();

    let after = test_db.db.tags.get_tag_by_text("kek").await.unwrap().unwrap();
    assert_eq!(before.id, after.id);
}

#[tokio::test]
async fn test_replace_tags_with_empty_set_clears_image() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew", "kek"]).await;

    test_db.db.links.replace_tags(image.id, &[]).await.unwrap();

    assert!(test_db.tag_texts(image.id).await.is_empty());
    assert_eq!(test_db.tag_count().await, 0);
}

#[tokio::test]
async fn test_delete_all_tags_removes_orphans_only() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew", "shared"]).await;
    let other = test_db.image(user.id, &["shared"]).await;

    let removed = test_db.db.links.delete_all_tags(image.id).await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(test_db.link_count(Some(image.id)).await, 0);
    assert!(!test_db.tag_exists("wew").await);
    assert_eq!(test_db.tag_texts(other.id).await, vec!["shared"]);
}

#[tokio::test]
async fn test_delete_all_tags_on_missing_image() {
    let test_db = TestDatabase::new().await;

    let err = test_db.db.links.delete_all_tags(7).await.unwrap_err();

    assert!(matches!(err, Error::ImageNotFound(7)));
}

#[tokio::test]
async fn test_add_single_tag_strict() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew"]).await;
    let ids = test_db
        .db
        .tags
        .resolve_or_create(&texts(&["kek"]))
        .await
        .unwrap();
    let kek = ids["kek"];

    let link = test_db.db.links.add_single_tag(image.id, kek).await.unwrap();
    assert_eq!(link.image_id, image.id);
    assert_eq!(link.tag_id, kek);

    let err = test_db
        .db
        .links
        .add_single_tag(image.id, kek)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TagExists { image_id, tag_id } if image_id == image.id && tag_id == kek));
    assert_eq!(test_db.link_count(Some(image.id)).await, 2);
}

#[tokio::test]
async fn test_add_single_tag_unknown_tag() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &[]).await;

    let err = test_db
        .db
        .links
        .add_single_tag(image.id, 999)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TagNotFound(999)));
}

#[tokio::test]
async fn test_add_tag_by_text_creates_tag() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &[]).await;

    let tag = test_db
        .db
        .links
        .add_tag_by_text(image.id, "  Blue_Sky ")
        .await
        .unwrap();

    assert_eq!(tag.text, "blue_sky");
    assert_eq!(test_db.tag_texts(image.id).await, vec!["blue_sky"]);
}

#[tokio::test]
async fn test_add_tag_by_text_already_attached() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew"]).await;

    let err = test_db
        .db
        .links
        .add_tag_by_text(image.id, "WEW")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TagExists { .. }));
    assert_eq!(test_db.tag_count().await, 1);
}

#[tokio::test]
async fn test_delete_single_tag_removes_orphan() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew", "kek"]).await;
    let wew = test_db.db.tags.get_tag_by_text("wew").await.unwrap().unwrap();

    test_db
        .db
        .links
        .delete_single_tag(image.id, wew.id)
        .await
        .unwrap();

    assert_eq!(test_db.tag_texts(image.id).await, vec!["kek"]);
    assert!(!test_db.tag_exists("wew").await);
}

#[tokio::test]
async fn test_delete_single_tag_keeps_shared_tag() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["shared"]).await;
    let other = test_db.image(user.id, &["shared"]).await;
    let shared = test_db.db.tags.get_tag_by_text("shared").await.unwrap().unwrap();

    test_db
        .db
        .links
        .delete_single_tag(image.id, shared.id)
        .await
        .unwrap();

    assert!(test_db.tag_texts(image.id).await.is_empty());
    assert_eq!(test_db.tag_texts(other.id).await, vec!["shared"]);
    assert!(test_db.tag_exists("shared").await);
}

#[tokio::test]
async fn test_delete_single_tag_not_attached() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["wew"]).await;
    let other = test_db.image(user.id, &["kek"]).await;
    let kek = test_db.db.tags.get_tag_by_text("kek").await.unwrap().unwrap();

    let err = test_db
        .db
        .links
        .delete_single_tag(image.id, kek.id)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::LinkNotFound { .. }));
    assert!(err.is_not_found());
    assert_eq!(test_db.tag_texts(other.id).await, vec!["kek"]);
}

#[tokio::test]
async fn test_get_tags_for_image_sorted() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &["zebra", "apple", "mango"]).await;

    let tags = test_db.db.links.get_tags_for_image(image.id).await.unwrap();
    let names: Vec<&str> = tags.iter().map(|t| t.text.as_str()).collect();

    assert_eq!(names, vec!["apple", "mango", "zebra"]);
    assert!(matches!(
        test_db.db.links.get_tags_for_image(image.id + 1).await,
        Err(Error::ImageNotFound(_))
    ));
}

#[tokio::test]
async fn test_insert_tags_beyond_bind_limit() {
    let test_db = TestDatabase::new().await;
    let user = test_db.user("alice").await;
    let image = test_db.image(user.id, &[]).await;
    let many: Vec<String> = (0..12_000).map(|i| format!("tag_{i}")).collect();

    let created = test_db.db.links.insert_tags(image.id, &many).await.unwrap();

    assert_eq!(created, 12_000);
    assert_eq!(test_db.link_count(Some(image.id)).await, 12_000);
    assert_eq!(test_db.db.links.insert_tags(image.id, &many).await.unwrap(), 0);
}
