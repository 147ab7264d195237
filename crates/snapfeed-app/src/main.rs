//! Snapfeed binary.
//!
//! Wires the local store, the feed core and the write-behind task together,
//! runs one command and shuts everything down cleanly.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `SNAPFEED_CONFIG` or `snapfeed-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Open the store and apply migrations
//! 4. Seed sample content into an empty store
//! 5. Run the load pipeline (reconcile, query, project, publish)
//! 6. Run the command
//! 7. Flush pending writes and close the store

mod command;
mod error;

use std::path::{Path, PathBuf};

use clap::Parser;
use snapfeed_core::{AppContext, SnapfeedConfig};
use snapfeed_types::{CaptureResult, PlayerState};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::command::{Cli, Command, mime_for};
use crate::error::AppError;

/// Config file read when `SNAPFEED_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "snapfeed-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the store, or the command fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = Cli::parse().into_command();

    // 1. Load configuration.
    let config_path = std::env::var("SNAPFEED_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("snapfeed starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        database_url = config.storage.database_url,
        media_dir = %config.media.media_dir.display(),
        story_duration_ms = config.playback.story_duration_ms,
        visibility_threshold = config.feed.visibility_threshold,
        "Effective configuration"
    );

    // 3. Open the store.
    let ctx = AppContext::init(config).await?;

    let result = run(&ctx, command).await;

    // 7. Flush and close, whether or not the command succeeded.
    let stats = ctx.shutdown().await;
    info!(
        applied = stats.applied,
        failed = stats.failed,
        "snapfeed stopped"
    );

    result?;
    Ok(())
}

/// Seed, load and run `command` against an initialized context.
async fn run(ctx: &AppContext, command: Command) -> Result<(), AppError> {
    // 4. Seed sample content.
    if let Some(report) = ctx.seed_if_empty().await? {
        info!(users = report.users, posts = report.posts, "Seeded sample content");
    }

    // 5. Load the feed.
    let report = ctx.load_feed().await?;
    info!(
        removed_duplicates = report.reconcile.removed,
        items = report.items,
        "Feed ready"
    );

    // 6. Run the command.
    match command {
        Command::Feed => log_feed(ctx).await,
        Command::Post { file, caption } => {
            let capture = CaptureResult {
                uri: format!("file://{}", absolute(&file).display()),
                mime_type: mime_for(&file),
            };
            let item = ctx
                .composer()
                .submit(Some(&capture), &caption.join(" "))
                .await?;
            info!(post_id = %item.id(), uri = item.post.content_uri, "Post added");
            log_feed(ctx).await;
        }
        Command::Clear => {
            let cleared = ctx.clear_all().await?;
            info!(posts = cleared.posts, users = cleared.users, "Store cleared");
        }
    }
    Ok(())
}

/// Log every feed item with its author and idle player state.
async fn log_feed(ctx: &AppContext) {
    let feed = ctx.feed().lock().await;
    for (position, item) in feed.items().iter().enumerate() {
        let player = feed.player_state(item.id()).unwrap_or(PlayerState::Static);
        info!(
            position,
            post_id = %item.id(),
            kind = %item.post.content_type,
            author = item.user.username,
            likes = item.post.likes,
            comments = item.post.comments,
            shares = item.post.shares,
            player = ?player,
            caption = item.post.caption,
            "Feed item"
        );
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. Returns whether the file was read.
fn load_config(path: &Path) -> Result<(SnapfeedConfig, bool), AppError> {
    if path.exists() {
        Ok((SnapfeedConfig::from_file(path)?, true))
    } else {
        Ok((SnapfeedConfig::parse("")?, false))
    }
}

/// Resolve `file` against the working directory.
fn absolute(file: &Path) -> PathBuf {
    std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf())
}
