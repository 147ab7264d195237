//! Feed core for Snapfeed.
//!
//! Projects stored posts into the feed, owns the in-memory feed and its
//! interaction actions, gates video autoplay on visibility, drives story
//! playback, and writes interactions back to the local store in the
//! background.
//!
//! # Data flow
//!
//! ```text
//! LocalStore --> DedupReconciler --> FeedProjector --> FeedStore
//!     ^                                                  |  |
//!     |                       VisibilityTracker <--------+  |
//!     |                  StoryPlaybackScheduler <-----------+
//!     |                                                  |
//!     +------------- WriteBehind <---- WriteOp ----------+
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration and defaults
//! - [`media`] -- Fallback media and media copying
//! - [`projector`] -- Post/author join into feed items
//! - [`visibility`] -- Visible-item tracking and player states
//! - [`playback`] -- Story playback state machine
//! - [`ticker`] -- Async story timer driver
//! - [`write_behind`] -- Background write-through queue
//! - [`feed`] -- The feed store and its actions
//! - [`loader`] -- Once-per-process load pipeline
//! - [`compose`] -- New post submission
//! - [`context`] -- Application context

pub mod compose;
pub mod config;
pub mod context;
pub mod feed;
pub mod loader;
pub mod media;
pub mod playback;
pub mod projector;
pub mod ticker;
pub mod visibility;
pub mod write_behind;

pub use compose::{ComposeError, PostComposer};
pub use config::{ConfigError, SnapfeedConfig};
pub use context::AppContext;
pub use feed::{FeedStore, SharedFeed};
pub use loader::{FeedLoader, LoadError, LoadReport};
pub use media::{MediaError, MediaFallbacks};
pub use playback::{PlaybackEvent, StoryPlaybackScheduler};
pub use projector::{FeedProjector, UserResolver};
pub use ticker::StoryTicker;
pub use visibility::VisibilityTracker;
pub use write_behind::{Discard, WriteBehind, WriteOp, WriteThrough, WriterHandle, WriterStats};
