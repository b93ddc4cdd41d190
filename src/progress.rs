//! Per-item progress reporting for `extract` and `replace`.
//!
//! Progress is emitted on **stderr** so stdout stays reserved for the final
//! summary.

use std::io::Write;

use uuid::Uuid;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum MigrationProgressEvent {
    Downloading { n: u64, total: u64, url: String },
    Uploading { n: u64, total: u64, url: String },
    Rewriting { n: u64, total: u64, post_id: Uuid },
}

pub trait MigrationProgressReporter: Send + Sync {
    fn report(&self, event: MigrationProgressEvent);
}

/// "download  3 / 120  https://i.imgur.com/abc.png"
pub struct StderrProgress;

impl MigrationProgressReporter for StderrProgress {
    fn report(&self, event: MigrationProgressEvent) {
        let line = match &event {
            MigrationProgressEvent::Downloading { n, total, url } => {
                format!("download  {} / {}  {}\n", format_number(*n), format_number(*total), url)
            }
            MigrationProgressEvent::Uploading { n, total, url } => {
                format!("upload    {} / {}  {}\n", format_number(*n), format_number(*total), url)
            }
            MigrationProgressEvent::Rewriting { n, total, post_id } => {
                format!(
                    "rewrite   {} / {}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    post_id
                )
            }
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl MigrationProgressReporter for JsonProgress {
    fn report(&self, event: MigrationProgressEvent) {
        let obj = match &event {
            MigrationProgressEvent::Downloading { n, total, url } => serde_json::json!({
                "event": "progress",
                "phase": "downloading",
                "n": n,
                "total": total,
                "url": url,
            }),
            MigrationProgressEvent::Uploading { n, total, url } => serde_json::json!({
                "event": "progress",
                "phase": "uploading",
                "n": n,
                "total": total,
                "url": url,
            }),
            MigrationProgressEvent::Rewriting { n, total, post_id } => serde_json::json!({
                "event": "progress",
                "phase": "rewriting",
                "n": n,
                "total": total,
                "post_id": post_id.to_string(),
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl MigrationProgressReporter for NoProgress {
    fn report(&self, _event: MigrationProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn MigrationProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
