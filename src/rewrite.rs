//! Post rewriting: swap old image URLs for new ones in every text field.
//!
//! Replacement is literal (`str::replace`), never regex. A post is written
//! back only when at least one occurrence was actually replaced, and then in
//! a single update covering all fields.

use std::fmt;

use uuid::Uuid;

use crate::models::PostText;
use crate::traits::{PostStore, StoreError};

/// Why a rewrite left the post untouched. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    EmptyMapping,
    NotFound,
    NoContent,
    /// Every new URL is already in the text and no old URL is left.
    AlreadyMigrated,
    /// None of the old URLs occur, and the new ones aren't there either.
    /// Usually a stale snapshot or a post edited by hand since extraction.
    LinksAbsent,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoOpReason::EmptyMapping => "no resolved images",
            NoOpReason::NotFound => "post not found",
            NoOpReason::NoContent => "post has no text",
            NoOpReason::AlreadyMigrated => "already migrated",
            NoOpReason::LinksAbsent => "links not found in text",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Updated { replacements: usize },
    NoOp(NoOpReason),
}

/// Replace every `old` with `new` across all fields of `text`.
///
/// The extractor upgrades `http://` links to `https://`, so the plain-http
/// spelling of each old URL is replaced too. Longer URLs go first so that a
/// URL which is a prefix of another can't clobber it.
///
/// Returns the number of occurrences replaced.
pub fn apply_mapping(text: &mut PostText, mapping: &[(String, String)]) -> usize {
    let mut pairs: Vec<(String, &str)> = Vec::new();
    for (old, new) in mapping {
        if old.is_empty() || old == new {
            continue;
        }
        if let Some(rest) = old.strip_prefix("https://") {
            pairs.push((format!("http://{}", rest), new.as_str()));
        }
        pairs.push((old.clone(), new.as_str()));
    }
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut count = 0;
    for (old, new) in &pairs {
        count += replace_in(&mut text.title, old, new);
        for field in [&mut text.excerpt, &mut text.body, &mut text.html] {
            if let Some(s) = field.as_mut() {
                count += replace_in(s, old, new);
            }
        }
    }
    count
}

fn replace_in(s: &mut String, old: &str, new: &str) -> usize {
    let n = s.matches(old).count();
    if n > 0 {
        *s = s.replace(old, new);
    }
    n
}

/// Rewrite one post using the resolved `(old, new)` pairs.
pub async fn rewrite_post(
    store: &dyn PostStore,
    id: Uuid,
    mapping: &[(String, String)],
) -> Result<RewriteOutcome, StoreError> {
    if mapping.is_empty() {
        return Ok(RewriteOutcome::NoOp(NoOpReason::EmptyMapping));
    }

    let Some(mut text) = store.load_text(id).await? else {
        tracing::warn!(post_id = %id, "post not found");
        return Ok(RewriteOutcome::NoOp(NoOpReason::NotFound));
    };
    if text.is_empty() {
        tracing::warn!(post_id = %id, "post has no text");
        return Ok(RewriteOutcome::NoOp(NoOpReason::NoContent));
    }

    let replacements = apply_mapping(&mut text, mapping);
    if replacements == 0 {
        let reason = if mapping.iter().all(|(_, new)| text.contains(new)) {
            NoOpReason::AlreadyMigrated
        } else {
            NoOpReason::LinksAbsent
        };
        tracing::warn!(post_id = %id, reason = %reason, "no replacements made");
        return Ok(RewriteOutcome::NoOp(reason));
    }

    store.save_text(id, &text).await?;
    tracing::info!(post_id = %id, replacements, "updated post");
    Ok(RewriteOutcome::Updated { replacements })
}
