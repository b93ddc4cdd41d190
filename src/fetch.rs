//! Image download from the source host.
//!
//! Requests carry a fixed browser-like header set from [`SourceConfig`], and
//! bytes are written under a filename derived from the URL path. A download
//! either produces one complete file or none: bytes go to a `.part` sibling
//! that is renamed into place only after the write succeeded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::SourceConfig;
use crate::traits::ImageFetcher;

/// Name used when the URL path has no usable last segment.
pub const FALLBACK_FILENAME: &str = "image.jpg";

/// Extension appended to names that have none.
pub const FALLBACK_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Last non-empty path segment of `url`, exactly as it appears.
pub fn last_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

/// Derive the local filename for an image URL.
///
/// Takes the last non-empty path segment. A segment without an extension gets
/// `.jpg` appended; a URL without any segment maps to `image.jpg`.
pub fn derive_filename(url: &str) -> String {
    let Some(segment) = last_segment(url) else {
        return FALLBACK_FILENAME.to_string();
    };
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => segment,
        _ => format!("{}.{}", segment.trim_end_matches('.'), FALLBACK_EXTENSION),
    }
}

/// Downloads images over HTTP with one shared client.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name in source.headers: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {}", name))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for source host")?;

        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self.client.get(url).send().await.map_err(transport)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, dir: &Path) -> Result<String, FetchError> {
        let filename = derive_filename(url);
        let path = dir.join(&filename);

        // Left over from an interrupted run into the same folder.
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            if meta.is_file() && meta.len() > 0 {
                tracing::debug!(url = %url, path = %path.display(), "already downloaded");
                return Ok(filename);
            }
        }

        let bytes = self.download(url).await?;
        write_file_atomic(&path, &bytes).await?;
        tracing::debug!(url = %url, size = bytes.len(), "saved {}", filename);
        Ok(filename)
    }
}

async fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let written = async {
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(source) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(FetchError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
