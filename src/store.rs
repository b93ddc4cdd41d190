//! SQLite access to blog posts.
//!
//! Rows are decoded into [`PostBody`] / [`PostText`] right here, so nothing
//! past this module sees untyped columns. IDs are stored as canonical UUID
//! strings.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{PostBody, PostScan, PostText};
use crate::traits::{PostStore, StoreError};

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    // One statement in flight at a time.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub struct SqlitePostStore {
    pool: SqlitePool,
}

impl SqlitePostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release the connection. Call once at the end of a run.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Decode(format!("bad post id '{}': {}", raw, e)))
}

fn decode_post_body(row: &SqliteRow) -> Result<PostBody, StoreError> {
    let id: String = row.try_get("id")?;
    Ok(PostBody {
        id: parse_id(&id)?,
        body: row.try_get("body")?,
    })
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn posts_containing(&self, needle: &str) -> Result<PostScan, StoreError> {
        let rows = sqlx::query(
            "SELECT id, body FROM blog_posts WHERE instr(body, ?) > 0 ORDER BY created_at, id",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;

        let mut scan = PostScan::default();
        for row in &rows {
            match decode_post_body(row) {
                Ok(post) => scan.posts.push(post),
                Err(e) => {
                    let raw: String = row
                        .try_get::<Option<String>, _>("id")
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| "<unreadable>".to_string());
                    tracing::warn!(id = %raw, "skipping post: {}", e);
                    scan.skipped.push(raw);
                }
            }
        }
        Ok(scan)
    }

    async fn load_text(&self, id: Uuid) -> Result<Option<PostText>, StoreError> {
        let row = sqlx::query("SELECT title, excerpt, body, html FROM blog_posts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PostText {
            title: row.try_get("title")?,
            excerpt: row.try_get("excerpt")?,
            body: row.try_get("body")?,
            html: row.try_get("html")?,
        }))
    }

    async fn save_text(&self, id: Uuid, text: &PostText) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE blog_posts
            SET title = ?, excerpt = ?, body = ?, html = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&text.title)
        .bind(&text.excerpt)
        .bind(&text.body)
        .bind(&text.html)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
