use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/blog.sqlite")
}

/// Where images are migrated *from*.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_host")]
    pub host: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent with every download. Image hosts reject hotlinked requests that
    /// don't look like they come from a browser.
    #[serde(default = "default_source_headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            timeout_secs: default_timeout_secs(),
            headers: default_source_headers(),
        }
    }
}

fn default_source_host() -> String {
    "i.imgur.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_source_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (X11; Linux x86_64; rv:146.0) Gecko/20100101 Firefox/146.0",
        ),
        (
            "Accept",
            "image/avif,image/webp,image/png,image/svg+xml,image/*;q=0.8,*/*;q=0.5",
        ),
        ("Accept-Language", "vi,en-US;q=0.7,en;q=0.3"),
        ("Referer", "https://quan.hoabinh.vn/"),
        ("Sec-Fetch-Dest", "image"),
        ("Sec-Fetch-Mode", "no-cors"),
        ("Sec-Fetch-Site", "cross-site"),
        ("Pragma", "no-cache"),
        ("Cache-Control", "no-cache"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Where images are migrated *to*: a Bunny-style storage zone fronted by a CDN.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default = "default_public_host")]
    pub public_host: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            zone: default_zone(),
            public_host: default_public_host(),
            category: default_category(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://sg.storage.bunnycdn.com".to_string()
}
fn default_zone() -> String {
    "quan-images".to_string()
}
fn default_public_host() -> String {
    "quan-images.b-cdn.net".to_string()
}
fn default_category() -> String {
    "blogs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    /// Parent directory for the per-run `post-migration-*` folders.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
        }
    }
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir()
}

/// Load and validate the configuration file.
///
/// A missing file is not an error: every key has a default, so the tool
/// runs out of the box against `./data/blog.sqlite`.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.source.host.trim().is_empty() {
        anyhow::bail!("source.host must not be empty");
    }
    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }

    let remote = &config.remote;
    if !(remote.endpoint.starts_with("https://") || remote.endpoint.starts_with("http://")) {
        anyhow::bail!(
            "remote.endpoint must start with http:// or https://, got '{}'",
            remote.endpoint
        );
    }
    for (key, value) in [
        ("remote.zone", &remote.zone),
        ("remote.public_host", &remote.public_host),
        ("remote.category", &remote.category),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} must not be empty", key);
        }
    }
    if remote.timeout_secs == 0 {
        anyhow::bail!("remote.timeout_secs must be > 0");
    }

    Ok(())
}
