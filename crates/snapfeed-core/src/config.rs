//! Configuration loading and typed config structures for Snapfeed.
//!
//! The canonical configuration lives in `snapfeed-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads the file. Every field
//! has a default, so an empty or partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Snapfeed configuration.
///
/// Mirrors the structure of `snapfeed-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SnapfeedConfig {
    /// Local database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Feed projection and visibility settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Story playback timing.
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Media storage and fallback media.
    #[serde(default)]
    pub media: MediaConfig,

    /// The local author used for new posts.
    #[serde(default)]
    pub author: AuthorConfig,

    /// Sample content for an empty store.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SnapfeedConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SNAPFEED_DATABASE_URL` overrides `storage.database_url`
    /// - `SNAPFEED_MEDIA_DIR` overrides `media.media_dir`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.storage.apply_env_overrides();
        config.media.apply_env_overrides();
        config.feed.normalize();
        config.playback.normalize();
        Ok(config)
    }
}

/// Local database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl StorageConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SNAPFEED_DATABASE_URL") {
            self.database_url = val;
        }
    }

    /// Connection acquire timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Feed projection and visibility configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedConfig {
    /// Fraction of an item that must be on screen, strictly exceeded, for
    /// it to become the visible item.
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    /// Avatar of the fallback author shown when a post's user is missing.
    #[serde(default = "default_placeholder_avatar")]
    pub placeholder_avatar: String,
}

impl FeedConfig {
    /// Clamp the visibility threshold into `[0, 1]`. A non-numeric
    /// threshold falls back to the default.
    pub fn normalize(&mut self) {
        let threshold = self.visibility_threshold;
        if threshold.is_nan() {
            tracing::warn!("visibility_threshold is not a number, using the default");
            self.visibility_threshold = default_visibility_threshold();
        } else if !(0.0..=1.0).contains(&threshold) {
            let clamped = threshold.clamp(0.0, 1.0);
            tracing::warn!(threshold, clamped, "visibility_threshold outside [0, 1], clamping");
            self.visibility_threshold = clamped;
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: default_visibility_threshold(),
            placeholder_avatar: default_placeholder_avatar(),
        }
    }
}

/// Story playback configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackConfig {
    /// How long one story plays before advancing, in milliseconds.
    #[serde(default = "default_story_duration_ms")]
    pub story_duration_ms: u64,

    /// How often the story ticker reports elapsed time, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl PlaybackConfig {
    /// Story duration as a [`Duration`].
    pub const fn story_duration(&self) -> Duration {
        Duration::from_millis(self.story_duration_ms)
    }

    /// Ticker interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Replace zero durations, which would end every story on the first
    /// tick, with the defaults.
    pub fn normalize(&mut self) {
        if self.story_duration_ms == 0 {
            tracing::warn!("story_duration_ms is 0, using the default");
            self.story_duration_ms = default_story_duration_ms();
        }
        if self.tick_interval_ms == 0 {
            tracing::warn!("tick_interval_ms is 0, using the default");
            self.tick_interval_ms = default_tick_interval_ms();
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            story_duration_ms: default_story_duration_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Media storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaConfig {
    /// Directory captured media is copied into.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// Shown in place of an image that cannot be loaded.
    #[serde(default = "default_fallback_image")]
    pub fallback_image: String,

    /// Played in place of a video that cannot be loaded.
    #[serde(default = "default_fallback_video")]
    pub fallback_video: String,

    /// Shown in place of a document that cannot be loaded.
    #[serde(default = "default_fallback_pdf")]
    pub fallback_pdf: String,
}

impl MediaConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SNAPFEED_MEDIA_DIR") {
            self.media_dir = PathBuf::from(val);
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            fallback_image: default_fallback_image(),
            fallback_video: default_fallback_video(),
            fallback_pdf: default_fallback_pdf(),
        }
    }
}

/// The local author new posts are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorConfig {
    /// Username, looked up or created on first post.
    #[serde(default = "default_author_username")]
    pub username: String,

    /// Avatar used when the author is created.
    #[serde(default = "default_author_avatar")]
    pub avatar_uri: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            username: default_author_username(),
            avatar_uri: default_author_avatar(),
        }
    }
}

/// Sample content configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// Whether an empty store receives the sample posts at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_database_url() -> String {
    "sqlite://snapfeed.db".to_owned()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

const fn default_visibility_threshold() -> f64 {
    0.70
}

fn default_placeholder_avatar() -> String {
    "https://i.pravatar.cc/150?img=0".to_owned()
}

const fn default_story_duration_ms() -> u64 {
    30_000
}

const fn default_tick_interval_ms() -> u64 {
    100
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_fallback_image() -> String {
    "https://via.placeholder.com/300x300.png?text=Image+unavailable".to_owned()
}

fn default_fallback_video() -> String {
    "https://www.w3schools.com/html/mov_bbb.mp4".to_owned()
}

fn default_fallback_pdf() -> String {
    "https://www.w3.org/WAI/ER/tests/xhtml/testfiles/resources/pdf/dummy.pdf".to_owned()
}

fn default_author_username() -> String {
    "Jeevith".to_owned()
}

fn default_author_avatar() -> String {
    "https://www.giantbomb.com/a/uploads/square_small/46/462814/3222927-6826564307-latest.jpg"
        .to_owned()
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}
