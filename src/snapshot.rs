//! Durable checkpoint of pipeline progress.
//!
//! A snapshot folder holds `data.json` (the ordered list of [`PostReport`]s)
//! and the `imgur/` directory of downloaded bytes. The JSON is pretty-printed
//! so that operators can inspect and edit it between `extract` and `replace`.
//!
//! # Layout
//!
//! ```text
//! post-migration-20240501-101500/
//! ├── data.json
//! └── imgur/
//!     ├── abc.png
//!     └── xyz.jpg
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::PostReport;

pub const SNAPSHOT_FILE: &str = "data.json";
pub const IMAGE_DIR: &str = "imgur";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("snapshot file {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

pub fn image_dir(dir: &Path) -> PathBuf {
    dir.join(IMAGE_DIR)
}

/// Write `reports` to `dir/data.json`, replacing any previous snapshot.
///
/// The file is written to a temporary sibling and renamed over the target,
/// so a crash mid-write leaves the old snapshot intact.
pub fn save(dir: &Path, reports: &[PostReport]) -> Result<PathBuf, SnapshotError> {
    let path = snapshot_path(dir);
    let mut json = serde_json::to_vec_pretty(reports).map_err(|source| SnapshotError::Malformed {
        path: path.clone(),
        source,
    })?;
    json.push(b'\n');

    write_atomic(dir, &path, &json)?;
    Ok(path)
}

/// Stage `bytes` in a temporary file under `staging` and rename it onto
/// `target`. On any failure `target` is left as it was and the temporary
/// file is removed.
fn write_atomic(staging: &Path, target: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: target.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(staging).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(target).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Read `dir/data.json`. Exact inverse of [`save`].
pub fn load(dir: &Path) -> Result<Vec<PostReport>, SnapshotError> {
    let path = snapshot_path(dir);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SnapshotError::Missing(path))
        }
        Err(source) => return Err(SnapshotError::Io { path, source }),
    };
    serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Malformed { path, source })
}
