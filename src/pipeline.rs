//! Migration pipeline orchestration.
//!
//! Runs the phases in order, each one over every item before the next
//! begins:
//!
//! ```text
//! extract:  Extracting → Snapshotting → Downloading → Done
//! replace:  (load snapshot) → Uploading → Resnapshotting → Rewriting → Done
//! ```
//!
//! A failing item is recorded in the summary and the phase moves on. The only
//! errors that stop a run are setup problems: the post listing query failing,
//! the snapshot missing or unreadable, the output folder not writable.
//!
//! Everything is sequential. The source host is being hotlinked, so one
//! request in flight at a time keeps it from rate-limiting us.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::extract::UrlExtractor;
use crate::fetch::derive_filename;
use crate::models::{ImageEntry, PostBody, PostReport};
use crate::progress::{MigrationProgressEvent, MigrationProgressReporter};
use crate::rewrite::{rewrite_post, NoOpReason, RewriteOutcome};
use crate::snapshot;
use crate::traits::{ImageFetcher, ObjectStore, PostStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extracting,
    Snapshotting,
    Downloading,
    Uploading,
    Resnapshotting,
    Rewriting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Extracting => "extracting",
            Phase::Snapshotting => "snapshotting",
            Phase::Downloading => "downloading",
            Phase::Uploading => "uploading",
            Phase::Resnapshotting => "resnapshotting",
            Phase::Rewriting => "rewriting",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

fn enter(phase: Phase) {
    tracing::info!(phase = %phase, "entering phase");
}

// ═══════════════════════════════════════════════════════════════════════
// extract
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    pub snapshot_path: PathBuf,
    pub image_dir: PathBuf,
    pub posts: usize,
    pub images: usize,
    pub downloaded: usize,
    pub failed_downloads: Vec<String>,
    /// Raw ids of matching rows that could not be read.
    pub skipped_posts: Vec<String>,
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "extract")?;
        writeln!(f, "  snapshot: {}", self.snapshot_path.display())?;
        writeln!(f, "  images dir: {}", self.image_dir.display())?;
        writeln!(f, "  posts with images: {}", self.posts)?;
        if !self.skipped_posts.is_empty() {
            writeln!(f, "  skipped posts (unreadable rows):")?;
            for id in &self.skipped_posts {
                writeln!(f, "    - {}", id)?;
            }
        }
        writeln!(
            f,
            "  download summary: {} successful, {} failed",
            self.downloaded,
            self.failed_downloads.len()
        )?;
        if !self.failed_downloads.is_empty() {
            writeln!(f, "  failed files:")?;
            for url in &self.failed_downloads {
                writeln!(f, "    - {}", url)?;
            }
        }
        Ok(())
    }
}

/// Create a fresh `post-migration-<timestamp>` folder under `root`.
pub fn create_run_dir(root: &Path) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let mut dir = root.join(format!("post-migration-{}", stamp));
    let mut n = 1;
    while dir.exists() {
        dir = root.join(format!("post-migration-{}-{}", stamp, n));
        n += 1;
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output folder {}", dir.display()))?;
    Ok(dir)
}

/// Build one report per post that mentions at least one image.
pub fn build_reports(posts: &[PostBody], extractor: &UrlExtractor) -> Vec<PostReport> {
    posts
        .iter()
        .filter_map(|post| {
            let urls = extractor.extract(post.body.as_deref().unwrap_or_default());
            if urls.is_empty() {
                return None;
            }
            Some(PostReport {
                id: post.id,
                images: urls.into_iter().map(ImageEntry::new).collect(),
            })
        })
        .collect()
}

/// Scan posts, checkpoint the findings, then download every image into
/// `out_dir/imgur/`.
pub async fn run_extract(
    store: &dyn PostStore,
    fetcher: &dyn ImageFetcher,
    extractor: &UrlExtractor,
    out_dir: &Path,
    progress: &dyn MigrationProgressReporter,
) -> Result<ExtractSummary> {
    enter(Phase::Extracting);
    let scan = store
        .posts_containing(extractor.host())
        .await
        .context("Failed to list posts")?;
    let reports = build_reports(&scan.posts, extractor);
    if reports.is_empty() {
        tracing::warn!(host = %extractor.host(), "no posts contain image links");
    }

    enter(Phase::Snapshotting);
    let image_dir = snapshot::image_dir(out_dir);
    std::fs::create_dir_all(&image_dir)
        .with_context(|| format!("Failed to create {}", image_dir.display()))?;
    let snapshot_path = snapshot::save(out_dir, &reports)?;
    tracing::info!(path = %snapshot_path.display(), posts = reports.len(), "snapshot written");

    enter(Phase::Downloading);
    let total = reports.iter().map(|r| r.images.len()).sum::<usize>();
    let mut summary = ExtractSummary {
        snapshot_path,
        image_dir: image_dir.clone(),
        posts: reports.len(),
        images: total,
        skipped_posts: scan.skipped,
        ..Default::default()
    };

    let mut n = 0u64;
    for report in &reports {
        for image in &report.images {
            n += 1;
            progress.report(MigrationProgressEvent::Downloading {
                n,
                total: total as u64,
                url: image.source.clone(),
            });
            match fetcher.fetch(&image.source, &image_dir).await {
                Ok(_) => summary.downloaded += 1,
                Err(e) => {
                    tracing::error!(post_id = %report.id, url = %image.source, "download failed: {}", e);
                    summary.failed_downloads.push(image.source.clone());
                }
            }
        }
    }

    enter(Phase::Done);
    Ok(summary)
}

// ═══════════════════════════════════════════════════════════════════════
// replace
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ReplaceSummary {
    pub uploaded: usize,
    /// Entries that already had a destination and were passed through.
    pub already_migrated: usize,
    pub failed_uploads: Vec<String>,
    /// Snapshot entries with an empty source URL. Nothing to upload.
    pub invalid_entries: usize,
    pub rewritten: usize,
    pub unchanged_posts: Vec<(Uuid, NoOpReason)>,
    pub failed_posts: Vec<Uuid>,
}

impl fmt::Display for ReplaceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "replace")?;
        writeln!(
            f,
            "  upload summary: {} successful, {} failed, {} already migrated",
            self.uploaded,
            self.failed_uploads.len(),
            self.already_migrated
        )?;
        if self.invalid_entries > 0 {
            writeln!(f, "  entries without a source url: {}", self.invalid_entries)?;
        }
        if !self.failed_uploads.is_empty() {
            writeln!(f, "  failed upload files:")?;
            for url in &self.failed_uploads {
                writeln!(f, "    - {}", url)?;
            }
        }
        writeln!(
            f,
            "  update summary: {} successful, {} failed, {} unchanged",
            self.rewritten,
            self.failed_posts.len(),
            self.unchanged_posts.len()
        )?;
        if !self.failed_posts.is_empty() {
            writeln!(f, "  failed update posts:")?;
            for id in &self.failed_posts {
                writeln!(f, "    - {}", id)?;
            }
        }
        if !self.unchanged_posts.is_empty() {
            writeln!(f, "  unchanged posts:")?;
            for (id, reason) in &self.unchanged_posts {
                writeln!(f, "    - {} ({})", id, reason)?;
            }
        }
        Ok(())
    }
}

/// Upload every image that has no destination yet, filling destinations in
/// place.
pub async fn upload_all(
    uploader: &dyn ObjectStore,
    image_dir: &Path,
    reports: &mut [PostReport],
    progress: &dyn MigrationProgressReporter,
    summary: &mut ReplaceSummary,
) {
    let total = reports.iter().map(|r| r.images.len()).sum::<usize>() as u64;
    let mut n = 0u64;

    for report in reports.iter_mut() {
        for image in report.images.iter_mut() {
            n += 1;
            if image.is_migrated() {
                summary.already_migrated += 1;
                continue;
            }
            if image.source.is_empty() {
                tracing::warn!(post_id = %report.id, "snapshot entry has no source url");
                summary.invalid_entries += 1;
                continue;
            }
            progress.report(MigrationProgressEvent::Uploading {
                n,
                total,
                url: image.source.clone(),
            });

            let local = image_dir.join(derive_filename(&image.source));
            match uploader.upload(&local, &image.source).await {
                Ok(url) => {
                    image.destination = Some(url);
                    summary.uploaded += 1;
                }
                Err(e) => {
                    tracing::error!(post_id = %report.id, url = %image.source, "upload failed: {}", e);
                    summary.failed_uploads.push(image.source.clone());
                }
            }
        }
    }
}

/// Rewrite every post that has at least one resolved image.
pub async fn rewrite_all(
    store: &dyn PostStore,
    reports: &[PostReport],
    progress: &dyn MigrationProgressReporter,
    summary: &mut ReplaceSummary,
) {
    let todo: Vec<(Uuid, Vec<(String, String)>)> = reports
        .iter()
        .map(|r| (r.id, r.resolved_pairs()))
        .filter(|(_, pairs)| !pairs.is_empty())
        .collect();
    let total = todo.len() as u64;

    for (i, (id, pairs)) in todo.iter().enumerate() {
        progress.report(MigrationProgressEvent::Rewriting {
            n: i as u64 + 1,
            total,
            post_id: *id,
        });
        match rewrite_post(store, *id, pairs).await {
            Ok(RewriteOutcome::Updated { .. }) => summary.rewritten += 1,
            Ok(RewriteOutcome::NoOp(reason)) => summary.unchanged_posts.push((*id, reason)),
            Err(e) => {
                tracing::error!(post_id = %id, "rewrite failed: {}", e);
                summary.failed_posts.push(*id);
            }
        }
    }
}

/// Upload the images of a snapshot folder and rewrite the posts.
///
/// Safe to run repeatedly: images that already have a destination are not
/// uploaded again, and posts already pointing at the CDN come out unchanged.
pub async fn run_replace(
    store: &dyn PostStore,
    uploader: &dyn ObjectStore,
    input_dir: &Path,
    progress: &dyn MigrationProgressReporter,
) -> Result<ReplaceSummary> {
    let mut reports = snapshot::load(input_dir)?;
    let image_dir = snapshot::image_dir(input_dir);
    let mut summary = ReplaceSummary::default();

    enter(Phase::Uploading);
    upload_all(uploader, &image_dir, &mut reports, progress, &mut summary).await;

    enter(Phase::Resnapshotting);
    let path = snapshot::save(input_dir, &reports)?;
    tracing::info!(path = %path.display(), "snapshot updated");

    enter(Phase::Rewriting);
    rewrite_all(store, &reports, progress, &mut summary).await;

    enter(Phase::Done);
    Ok(summary)
}
