//! Tracks the single feed item currently considered visible.
//!
//! Only the visible item's video plays; every other player stays paused.

use snapfeed_types::{ContentType, FeedItem, PlayerState, PostId, ViewportEntry};

/// Default fraction an item must exceed to become visible.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.70;

/// Derives the visible item from viewport-intersection reports.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityTracker {
    threshold: f64,
    visible: Option<PostId>,
}

impl VisibilityTracker {
    /// Create a tracker with the given coverage threshold.
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            visible: None,
        }
    }

    /// The currently visible item, if any.
    pub const fn visible(&self) -> Option<&PostId> {
        self.visible.as_ref()
    }

    /// Apply a viewport report, in viewport order.
    ///
    /// The first entry whose covered fraction strictly exceeds the threshold
    /// becomes visible. If no entry qualifies the previous item stays
    /// visible. Returns `true` if the visible item changed.
    pub fn on_viewport_changed(&mut self, entries: &[ViewportEntry]) -> bool {
        let Some(entry) = entries
            .iter()
            .find(|e| e.covered_fraction > self.threshold)
        else {
            return false;
        };
        if self.visible.as_ref() == Some(&entry.id) {
            return false;
        }
        tracing::debug!(post_id = %entry.id, coverage = entry.covered_fraction, "Visible item changed");
        self.visible = Some(entry.id.clone());
        true
    }

    /// Forget the visible item (for example when the feed is replaced).
    pub fn clear(&mut self) {
        self.visible = None;
    }

    /// How the presentation layer should drive `item`'s player.
    pub fn player_state(&self, item: &FeedItem) -> PlayerState {
        match item.post.content_type {
            ContentType::Video if self.visible.as_ref() == Some(item.id()) => PlayerState::Playing,
            ContentType::Video => PlayerState::Paused,
            ContentType::Image | ContentType::Pdf => PlayerState::Static,
        }
    }
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_THRESHOLD)
    }
}
