//! SQLite post store tests against a real database file.

use post_migrate::config::Config;
use post_migrate::extract::UrlExtractor;
use post_migrate::fetch::FetchError;
use post_migrate::migrate::create_schema;
use post_migrate::models::PostText;
use post_migrate::pipeline::run_extract;
use post_migrate::progress::NoProgress;
use post_migrate::rewrite::{rewrite_post, NoOpReason, RewriteOutcome};
use post_migrate::snapshot;
use post_migrate::store::{connect, SqlitePostStore};
use post_migrate::traits::{ImageFetcher, PostStore};
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

async fn open_store(tmp: &TempDir) -> SqlitePostStore {
    let mut config = Config::default();
    config.db.path = tmp.path().join("data").join("blog.sqlite");
    let pool = connect(&config).await.unwrap();
    create_schema(&pool).await.unwrap();
    SqlitePostStore::new(pool)
}

async fn insert_post(store: &SqlitePostStore, created_at: i64, title: &str, body: Option<&str>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO blog_posts (id, title, excerpt, body, html, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(title)
    .bind(Option::<String>::None)
    .bind(body)
    .bind(body.map(|b| format!("<p>{}</p>", b)))
    .bind(created_at)
    .execute(store.pool())
    .await
    .unwrap();
    id
}

#[tokio::test]
async fn schema_creation_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    create_schema(store.pool()).await.unwrap();
    store.close().await;
}

#[tokio::test]
async fn posts_containing_filters_and_orders() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let second = insert_post(&store, 200, "b", Some("![](https://i.imgur.com/b.png)")).await;
    let first = insert_post(&store, 100, "a", Some("![](https://i.imgur.com/a.png)")).await;
    insert_post(&store, 150, "plain", Some("no images here")).await;
    insert_post(&store, 300, "empty", None).await;

    let scan = store.posts_containing("i.imgur.com").await.unwrap();
    assert!(scan.skipped.is_empty());
    let posts = scan.posts;
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(
        posts[0].body.as_deref(),
        Some("![](https://i.imgur.com/a.png)")
    );
    store.close().await;
}

#[tokio::test]
async fn load_missing_post_is_none() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    assert!(store.load_text(Uuid::new_v4()).await.unwrap().is_none());
    store.close().await;
}

#[tokio::test]
async fn save_text_updates_every_field() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let id = insert_post(&store, 1, "old", Some("old body")).await;

    let text = PostText {
        title: "new title".into(),
        excerpt: Some("new excerpt".into()),
        body: Some("new body".into()),
        html: None,
    };
    store.save_text(id, &text).await.unwrap();

    let loaded = store.load_text(id).await.unwrap().unwrap();
    assert_eq!(loaded, text);

    let updated_at: Option<i64> = sqlx::query_scalar("SELECT updated_at FROM blog_posts WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert!(updated_at.is_some());
    store.close().await;
}

#[tokio::test]
async fn rewrite_against_sqlite() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let id = insert_post(&store, 1, "post", Some("![](https://i.imgur.com/a.png)")).await;

    let mapping = vec![(
        "https://i.imgur.com/a.png".to_string(),
        "https://cdn.example.com/blogs/2024/a.png".to_string(),
    )];

    let outcome = rewrite_post(&store, id, &mapping).await.unwrap();
    assert_eq!(outcome, RewriteOutcome::Updated { replacements: 2 });

    let text = store.load_text(id).await.unwrap().unwrap();
    assert_eq!(
        text.body.as_deref(),
        Some("![](https://cdn.example.com/blogs/2024/a.png)")
    );
    assert_eq!(
        text.html.as_deref(),
        Some("<p>![](https://cdn.example.com/blogs/2024/a.png)</p>")
    );

    let again = rewrite_post(&store, id, &mapping).await.unwrap();
    assert_eq!(again, RewriteOutcome::NoOp(NoOpReason::AlreadyMigrated));
    assert!(store.posts_containing("i.imgur.com").await.unwrap().posts.is_empty());
    store.close().await;
}

/// Refuses every download; these tests only care about the listing.
struct OfflineFetcher;

#[async_trait::async_trait]
impl ImageFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str, _dir: &Path) -> Result<String, FetchError> {
        Err(FetchError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

#[tokio::test]
async fn undecodable_row_is_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let good = insert_post(&store, 1, "good", Some("![](https://i.imgur.com/a.png)")).await;
    sqlx::query("INSERT INTO blog_posts (id, title, body, created_at) VALUES (?, ?, ?, ?)")
        .bind("legacy-42")
        .bind("legacy")
        .bind("![](https://i.imgur.com/old.png)")
        .bind(2_i64)
        .execute(store.pool())
        .await
        .unwrap();

    let scan = store.posts_containing("i.imgur.com").await.unwrap();
    assert_eq!(scan.posts.len(), 1);
    assert_eq!(scan.posts[0].id, good);
    assert_eq!(scan.skipped, vec!["legacy-42"]);

    let out = TempDir::new().unwrap();
    let extractor = UrlExtractor::new("i.imgur.com").unwrap();
    let summary = run_extract(&store, &OfflineFetcher, &extractor, out.path(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(summary.posts, 1);
    assert_eq!(summary.skipped_posts, vec!["legacy-42"]);
    assert!(summary.to_string().contains("    - legacy-42"));

    let saved = snapshot::load(out.path()).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, good);
    store.close().await;
}
