//! Seams between the pipeline and the outside world.
//!
//! The orchestrator only talks to these traits, so the same phases run
//! against SQLite + HTTP in production and in-memory fakes in tests.
//!
//! ```text
//!            ┌──────────────┐
//!            │ Orchestrator │
//!            └──────┬───────┘
//!      ┌────────────┼─────────────┐
//!      ▼            ▼             ▼
//! ┌──────────┐ ┌──────────┐ ┌─────────────┐
//! │PostStore │ │ImageFetch│ │ ObjectStore │
//! │ (sqlx)   │ │(reqwest) │ │  (reqwest)  │
//! └──────────┘ └──────────┘ └─────────────┘
//! ```

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::fetch::FetchError;
use crate::models::{PostScan, PostText};
use crate::upload::UploadError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid row: {0}")]
    Decode(String),
}

/// Read/write access to blog posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Posts whose body contains `needle` (a host name). Rows that can't be
    /// decoded are reported in [`PostScan::skipped`] instead of failing the scan.
    async fn posts_containing(&self, needle: &str) -> Result<PostScan, StoreError>;

    /// Current text fields of one post, `None` if it doesn't exist.
    async fn load_text(&self, id: Uuid) -> Result<Option<PostText>, StoreError>;

    /// Overwrite every text field of one post in a single statement.
    async fn save_text(&self, id: Uuid, text: &PostText) -> Result<(), StoreError>;
}

/// Downloads one image into a directory.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Returns the filename written inside `dir`.
    async fn fetch(&self, url: &str, dir: &Path) -> Result<String, FetchError>;
}

/// Pushes one local file to the remote store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the public URL of the uploaded object.
    async fn upload(&self, local_path: &Path, source_url: &str) -> Result<String, UploadError>;
}
