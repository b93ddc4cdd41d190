//! Core data models used throughout the migration pipeline.
//!
//! [`PostReport`] and [`ImageEntry`] are what the snapshot file holds.
//! [`PostBody`] and [`PostText`] are the typed rows decoded at the database
//! boundary, one per query shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One image reference found in a post, and where it ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// URL on the source host, always `https://`.
    #[serde(alias = "imgur")]
    pub source: String,
    /// Public CDN URL once uploaded. `None` means not migrated yet.
    #[serde(alias = "bunny", default)]
    pub destination: Option<String>,
}

impl ImageEntry {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: None,
        }
    }

    pub fn is_migrated(&self) -> bool {
        self.destination.is_some()
    }
}

/// All source-host images found in one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReport {
    pub id: Uuid,
    pub images: Vec<ImageEntry>,
}

impl PostReport {
    /// `(old, new)` pairs for every image that has both sides.
    pub fn resolved_pairs(&self) -> Vec<(String, String)> {
        self.images
            .iter()
            .filter_map(|img| {
                let dest = img.destination.as_ref()?;
                if img.source.is_empty() || dest.is_empty() {
                    return None;
                }
                Some((img.source.clone(), dest.clone()))
            })
            .collect()
    }
}

/// Row shape of the extraction query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBody {
    pub id: Uuid,
    pub body: Option<String>,
}

/// Result of listing posts for extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostScan {
    pub posts: Vec<PostBody>,
    /// Raw ids of rows that matched but could not be decoded.
    pub skipped: Vec<String>,
}

/// Every text-bearing column of a post, as read before and written after a
/// rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostText {
    pub title: String,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub html: Option<String>,
}

impl PostText {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.excerpt.as_deref().unwrap_or_default().is_empty()
            && self.body.as_deref().unwrap_or_default().is_empty()
            && self.html.as_deref().unwrap_or_default().is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.title.contains(needle)
            || [&self.excerpt, &self.body, &self.html]
                .into_iter()
                .any(|f| f.as_deref().is_some_and(|s| s.contains(needle)))
    }
}
