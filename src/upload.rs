//! CDN storage uploader.
//!
//! Pushes downloaded images to a Bunny-style storage zone with one `PUT` per
//! file. Objects land at `{category}/{year}/{filename}` where `year` is the UTC
//! year of the upload, so each migration batch is grouped together regardless
//! of when the original image was posted.
//!
//! # Request
//!
//! ```text
//! PUT {endpoint}/{zone}/{category}/{year}/{filename}
//! AccessKey: <storage zone password>
//! Checksum: <uppercase hex SHA-256 of the body>
//! Content-Type: image/png          (only when the source URL has a known extension)
//! ```
//!
//! The public URL is `https://{public_host}/{category}/{year}/{filename}`.
//! Uploading to an existing path overwrites it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::RemoteConfig;
use crate::fetch::{derive_filename, last_segment};
use crate::traits::ObjectStore;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("cannot read {}: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of {path} failed: {reason}")]
    Transport { path: String, reason: String },

    #[error("upload of {path} rejected with HTTP {status}")]
    Status { path: String, status: u16 },
}

/// Uploader for one storage zone.
pub struct BunnyUploader {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl BunnyUploader {
    pub fn new(config: &RemoteConfig, access_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(access_key).context("access key is not a valid header value")?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static("accesskey"), key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for storage zone")?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn storage_url(&self, object_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.zone,
            object_path
        )
    }

    fn public_url(&self, object_path: &str) -> String {
        format!("https://{}/{}", self.config.public_host, object_path)
    }
}

#[async_trait]
impl ObjectStore for BunnyUploader {
    async fn upload(&self, local_path: &Path, source_url: &str) -> Result<String, UploadError> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|source| UploadError::LocalFile {
                path: local_path.to_path_buf(),
                source,
            })?;

        let filename = derive_filename(source_url);
        let object_path = object_path(&self.config.category, Utc::now().year(), &filename);

        let mut req = self
            .client
            .put(self.storage_url(&object_path))
            .header("Checksum", checksum(&data));
        // From the URL as published, not the padded filename.
        if let Some(mime) = last_segment(source_url).as_deref().and_then(detect_content_type) {
            req = req.header(CONTENT_TYPE, mime);
        }

        let resp = req
            .body(data)
            .send()
            .await
            .map_err(|e| UploadError::Transport {
                path: object_path.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(UploadError::Status {
                path: object_path,
                status: resp.status().as_u16(),
            });
        }

        let url = self.public_url(&object_path);
        tracing::info!(source = %source_url, destination = %url, "uploaded {}", filename);
        Ok(url)
    }
}

/// `{category}/{year}/{filename}` with stray slashes removed from the category.
pub fn object_path(category: &str, year: i32, filename: &str) -> String {
    format!("{}/{}/{}", category.trim_matches('/'), year, filename)
}

/// Uppercase hex SHA-256, the form the storage API verifies against.
fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode_upper(hasher.finalize())
}

/// MIME type for image extensions. Unknown extensions get no header at all
/// rather than a wrong one.
pub fn detect_content_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        "ico" => Some("image/x-icon"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}
