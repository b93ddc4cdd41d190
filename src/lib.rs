//! # post-migrate
//!
//! Moves images embedded in blog posts off a third-party image host and onto
//! a CDN storage zone, then rewrites the posts to point at the new URLs.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │  SQLite  │──▶│  Extract  │──▶│ Snapshot │──▶│ Download │   post-migrate extract
//! │blog_posts│   │ URLs      │   │data.json │   │ imgur/   │
//! └──────────┘   └───────────┘   └────┬─────┘   └──────────┘
//!      ▲                              │
//!      │         ┌───────────┐   ┌────▼─────┐
//!      └─────────│  Rewrite  │◀──│  Upload  │                 post-migrate replace
//!                │  posts    │   │  to CDN  │
//!                └───────────┘   └──────────┘
//! ```
//!
//! The snapshot folder sits between the two commands, so an operator can
//! inspect or edit `data.json` before anything is uploaded.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Snapshot and row types |
//! | [`extract`] | Image URL extraction |
//! | [`fetch`] | Image download |
//! | [`snapshot`] | Checkpoint file |
//! | [`upload`] | CDN storage uploader |
//! | [`rewrite`] | Post URL substitution |
//! | [`store`] | SQLite post access |
//! | [`migrate`] | Schema bootstrap for `init` |
//! | [`traits`] | Store, fetcher and uploader seams |
//! | [`pipeline`] | Phase orchestration |
//! | [`progress`] | Per-item progress on stderr |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod rewrite;
pub mod snapshot;
pub mod store;
pub mod traits;
pub mod upload;
