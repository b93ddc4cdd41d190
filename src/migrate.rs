//! Blog schema bootstrap.
//!
//! The blog application owns the `blog_posts` table. This only creates it
//! when it's missing, so `post-migrate init` can be pointed at a fresh file
//! for local trials. Running it against an existing database is a no-op.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::store;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = store::connect(config).await?;
    let result = create_schema(&pool).await;
    pool.close().await;
    result
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blog_posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT,
            excerpt TEXT,
            body TEXT,
            html TEXT,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blog_posts_created_at ON blog_posts(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
