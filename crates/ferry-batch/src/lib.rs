//! Ferry Batch Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Picks up delimited `name,city` files as they arrive, loads their records in
//! chunks, and moves each file to an archive or error location afterwards.
//!
//! # Overview
//!
//! - **Triggers**: a directory watcher ([`trigger::DirectoryWatcher`]) or a
//!   bucket-notification queue listener ([`trigger::QueueListener`])
//! - **Pipeline**: read, decode, validate, skip, and flush in chunks
//!   ([`pipeline::JobLauncher`])
//! - **Tracking**: every run is recorded in an in-memory
//!   [`job::JobExecutionTracker`]
//! - **Archiving**: processed inputs are relocated by an [`archive::Archiver`]
//!
//! # Profiles
//!
//! | Profile | Trigger | Source | Archive |
//! |---|---|---|---|
//! | `filesystem` | directory watch | local file | `archive_dir` / `error_dir` |
//! | `aws` | SQS notifications | S3 object | `archive/` / `error/` prefix |
//!
//! # Example
//!
//! ```no_run
//! use ferry_batch::{app::App, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_config(Config::load()?).await?;
//!     let listener = app.start_listener()?;
//!     tokio::signal::ctrl_c().await?;
//!     listener.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod archive;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod storage;
pub mod trigger;

pub use error::{BatchError, BatchResult};
