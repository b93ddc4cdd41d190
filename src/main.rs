//! # post-migrate CLI
//!
//! Two resumable commands move blog images from the source host to the CDN,
//! with a snapshot folder in between:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `post-migrate init` | Create the `blog_posts` table if it doesn't exist |
//! | `post-migrate extract` | Find image links, write `data.json`, download images |
//! | `post-migrate replace -I <dir> -k <key>` | Upload images, update `data.json`, rewrite posts |
//!
//! ## Examples
//!
//! ```bash
//! post-migrate -v extract
//! # inspect /tmp/post-migration-20240501-101500/data.json
//! post-migrate -v replace -I /tmp/post-migration-20240501-101500 -k "$BUNNY_KEY"
//! ```
//!
//! Per-item failures are listed in the summary and never change the exit
//! code. A non-zero exit means setup failed (bad config, unreachable
//! database, missing snapshot).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use post_migrate::config;
use post_migrate::extract::UrlExtractor;
use post_migrate::fetch::HttpImageFetcher;
use post_migrate::logging;
use post_migrate::migrate;
use post_migrate::pipeline;
use post_migrate::progress::ProgressMode;
use post_migrate::store::{self, SqlitePostStore};
use post_migrate::upload::BunnyUploader;

/// Migrate blog post images from a third-party host to a CDN storage zone.
#[derive(Parser)]
#[command(name = "post-migrate", version)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it doesn't exist.
    #[arg(long, global = true, default_value = "./config/migrate.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the blog_posts table if it is missing.
    Init,

    /// Scan posts for source-host images, snapshot them and download them.
    ///
    /// Creates a new `post-migration-<timestamp>` folder under
    /// `[migration].work_root` and prints its path.
    Extract,

    /// Upload the images of a snapshot folder and rewrite the posts.
    ///
    /// Images that already have a destination in `data.json` are not
    /// uploaded again, so the command can be rerun after a partial failure.
    Replace {
        /// Folder produced by `extract` (contains data.json and imgur/).
        #[arg(short = 'I', long)]
        input_folder: PathBuf,

        /// Storage zone access key.
        #[arg(short = 'k', long)]
        access_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Extract => {
            let extractor = UrlExtractor::new(&cfg.source.host)?;
            let fetcher = HttpImageFetcher::new(&cfg.source)?;
            let posts = SqlitePostStore::new(store::connect(&cfg).await?);
            let result = match pipeline::create_run_dir(&cfg.migration.work_root) {
                Ok(out_dir) => {
                    pipeline::run_extract(&posts, &fetcher, &extractor, &out_dir, progress.as_ref())
                        .await
                }
                Err(e) => Err(e),
            };
            posts.close().await;

            print!("{}", result?);
        }
        Commands::Replace {
            input_folder,
            access_key,
        } => {
            if !input_folder.is_dir() {
                anyhow::bail!("input folder not found: {}", input_folder.display());
            }
            let uploader = BunnyUploader::new(&cfg.remote, &access_key)?;

            let posts = SqlitePostStore::new(store::connect(&cfg).await?);
            let result =
                pipeline::run_replace(&posts, &uploader, &input_folder, progress.as_ref()).await;
            posts.close().await;

            print!("{}", result?);
        }
    }

    Ok(())
}
