//! In-memory feed and ephemeral UI state, with the action interface the
//! presentation layer drives.
//!
//! Every action updates memory synchronously. Actions that change durable
//! data then submit a [`WriteOp`] to the [`WriteThrough`] sink and return
//! without waiting for it. Story and visibility actions touch ephemeral
//! state only.

use std::sync::Arc;
use std::time::Duration;

use snapfeed_db::PostPatch;
use snapfeed_types::{
    CloseReason, FeedItem, Notification, PlaybackPhase, PlaybackState, PlayerState, PostId,
    TapSide, ViewportEntry,
};
use tokio::sync::Mutex;

use crate::config::SnapfeedConfig;
use crate::media::MediaFallbacks;
use crate::playback::{PlaybackEvent, StoryPlaybackScheduler};
use crate::visibility::VisibilityTracker;
use crate::write_behind::{WriteOp, WriteThrough};

/// The feed store shared between the presentation layer and background
/// tasks. All state mutation goes through this one lock.
pub type SharedFeed = Arc<Mutex<FeedStore>>;

/// Owner of the in-memory feed, story playback and visibility state.
pub struct FeedStore {
    items: Vec<FeedItem>,
    playback: StoryPlaybackScheduler,
    visibility: VisibilityTracker,
    fallbacks: MediaFallbacks,
    notification: Option<Notification>,
    write_through: Arc<dyn WriteThrough>,
}

impl FeedStore {
    /// An empty feed with default playback and visibility settings.
    pub fn new(write_through: Arc<dyn WriteThrough>) -> Self {
        Self {
            items: Vec::new(),
            playback: StoryPlaybackScheduler::default(),
            visibility: VisibilityTracker::default(),
            fallbacks: MediaFallbacks::default(),
            notification: None,
            write_through,
        }
    }

    /// An empty feed configured from `config`.
    pub fn from_config(config: &SnapfeedConfig, write_through: Arc<dyn WriteThrough>) -> Self {
        Self {
            items: Vec::new(),
            playback: StoryPlaybackScheduler::new(config.playback.story_duration()),
            visibility: VisibilityTracker::new(config.feed.visibility_threshold),
            fallbacks: MediaFallbacks::from_config(&config.media),
            notification: None,
            write_through,
        }
    }

    /// Set the story duration.
    #[must_use]
    pub fn with_story_duration(mut self, duration: Duration) -> Self {
        self.playback = StoryPlaybackScheduler::new(duration);
        self
    }

    /// Wrap in the shared handle.
    pub fn shared(self) -> SharedFeed {
        Arc::new(Mutex::new(self))
    }

    // -----------------------------------------------------------------------
    // Feed contents
    // -----------------------------------------------------------------------

    /// The feed, most recent first.
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    /// The item with `id`, if present.
    pub fn get(&self, id: &PostId) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn find_mut(&mut self, id: &PostId) -> Option<&mut FeedItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Replace the whole feed (after projection). Memory only.
    ///
    /// The visible item is forgotten if it is no longer in the feed.
    pub fn set_feed(&mut self, items: Vec<FeedItem>) {
        self.items = items;
        let stale = self
            .visibility
            .visible()
            .is_some_and(|visible| self.get(visible).is_none());
        if stale {
            self.visibility.clear();
        }
        tracing::debug!(items = self.items.len(), "Feed replaced");
    }

    /// Insert `item` at the head of the feed and persist it.
    pub fn add_post(&mut self, item: FeedItem) {
        let author = (!item.user.is_fallback()).then(|| item.user.clone());
        let op = WriteOp::Upsert {
            post: item.post.clone(),
            author,
        };
        self.items.insert(0, item);
        self.write_through.submit(op);
    }

    /// Insert an already persisted `item` at the head of the feed.
    pub(crate) fn add_persisted_post(&mut self, item: FeedItem) {
        self.items.insert(0, item);
    }

    // -----------------------------------------------------------------------
    // Interactions
    // -----------------------------------------------------------------------

    /// Flip `liked` and move `likes` by one in the same direction, never
    /// below zero. Returns `false` if the post is not in the feed.
    pub fn toggle_like(&mut self, id: &PostId) -> bool {
        self.mutate(id, |post| {
            post.liked = !post.liked;
            post.likes = if post.liked {
                post.likes.saturating_add(1)
            } else {
                post.likes.saturating_sub(1)
            };
            PostPatch::like(post.liked, post.likes)
        })
    }

    /// Flip `saved`. Returns `false` if the post is not in the feed.
    pub fn toggle_save(&mut self, id: &PostId) -> bool {
        self.mutate(id, |post| {
            post.saved = !post.saved;
            PostPatch::save(post.saved)
        })
    }

    /// Add one comment. Returns `false` if the post is not in the feed.
    pub fn increment_comment(&mut self, id: &PostId) -> bool {
        self.mutate(id, |post| {
            post.comments = post.comments.saturating_add(1);
            PostPatch::comments(post.comments)
        })
    }

    /// Add one share. Returns `false` if the post is not in the feed.
    pub fn increment_share(&mut self, id: &PostId) -> bool {
        self.mutate(id, |post| {
            post.shares = post.shares.saturating_add(1);
            PostPatch::shares(post.shares)
        })
    }

    fn mutate<F>(&mut self, id: &PostId, change: F) -> bool
    where
        F: FnOnce(&mut snapfeed_types::Post) -> PostPatch,
    {
        let Some(item) = self.find_mut(id) else {
            tracing::debug!(post_id = %id, "Interaction on a post not in the feed");
            return false;
        };
        let patch = change(&mut item.post);
        self.write_through.submit(WriteOp::Patch {
            post_id: id.clone(),
            patch,
        });
        true
    }

    /// Swap the content URI of `id` for its kind's fallback after the
    /// presentation layer failed to load it. Memory only. Returns `true` if
    /// the URI changed.
    pub fn report_media_failure(&mut self, id: &PostId) -> bool {
        let fallbacks = self.fallbacks.clone();
        let Some(item) = self.find_mut(id) else {
            return false;
        };
        let fallback = fallbacks.for_kind(item.post.content_type);
        if item.post.content_uri == fallback {
            return false;
        }
        tracing::debug!(post_id = %id, uri = %item.post.content_uri, "Media failed to load, using fallback");
        fallback.clone_into(&mut item.post.content_uri);
        true
    }

    // -----------------------------------------------------------------------
    // Stories
    // -----------------------------------------------------------------------

    /// Open the story viewer on `id`, with the whole feed as the reel.
    ///
    /// Returns `None` if the post is not in the feed.
    pub fn open_story(&mut self, id: &PostId) -> Option<PlaybackEvent> {
        self.get(id)?;
        let reel = self.items.iter().map(|item| item.id().clone()).collect();
        Some(self.playback.open(reel, id))
    }

    /// Dismiss the story viewer.
    pub fn close_story(&mut self) -> Option<PlaybackEvent> {
        self.playback.close(CloseReason::Dismissed)
    }

    /// The user pressed and holds the current story.
    pub fn press_story(&mut self) -> Option<PlaybackEvent> {
        self.playback.press()
    }

    /// The user released the current story.
    pub fn release_story(&mut self) -> Option<PlaybackEvent> {
        self.playback.release()
    }

    /// A tap on one half of the story.
    pub fn tap_story(&mut self, side: TapSide) -> Option<PlaybackEvent> {
        self.playback.tap(side)
    }

    /// A tap at `x` within a story view `width` wide.
    pub fn tap_story_at(&mut self, x: f64, width: f64) -> Option<PlaybackEvent> {
        self.playback.tap(TapSide::from_position(x, width))
    }

    /// Feed elapsed time into the story timer.
    pub fn advance_playback(&mut self, elapsed: Duration) -> Option<PlaybackEvent> {
        self.playback.advance(elapsed)
    }

    /// Align the current story with the index shown by the presentation
    /// layer.
    pub fn sync_story_index(&mut self, index: usize) -> Option<PlaybackEvent> {
        self.playback.sync_index(index)
    }

    /// Observable story playback state.
    pub const fn playback_state(&self) -> &PlaybackState {
        self.playback.state()
    }

    /// Current story playback phase.
    pub const fn playback_phase(&self) -> PlaybackPhase {
        self.playback.phase()
    }

    // -----------------------------------------------------------------------
    // Visibility
    // -----------------------------------------------------------------------

    /// Apply a viewport-intersection report. Returns `true` if the visible
    /// item changed.
    pub fn on_viewport_changed(&mut self, entries: &[ViewportEntry]) -> bool {
        self.visibility.on_viewport_changed(entries)
    }

    /// The currently visible item, if any.
    pub const fn visible_id(&self) -> Option<&PostId> {
        self.visibility.visible()
    }

    /// Player state for the item `id`, or `None` if it is not in the feed.
    pub fn player_state(&self, id: &PostId) -> Option<PlayerState> {
        self.get(id).map(|item| self.visibility.player_state(item))
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Raise a one-shot notification, replacing any pending one.
    pub fn notify(&mut self, notification: Notification) {
        tracing::info!(kind = ?notification.kind, title = %notification.title, "Notification raised");
        self.notification = Some(notification);
    }

    /// Take the pending notification, if any. Each notification is handed
    /// out once.
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }
}

impl core::fmt::Debug for FeedStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeedStore")
            .field("items", &self.items.len())
            .field("playback", &self.playback.phase())
            .field("visible", &self.visibility.visible())
            .finish_non_exhaustive()
    }
}
