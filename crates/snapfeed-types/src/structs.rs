//! Core entity structs: users, posts, feed items, playback and UI state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ContentType, NotificationKind};
use crate::ids::{PostId, UserId};

/// Username carried by the synthetic author of posts whose relation could
/// not be resolved.
pub const UNKNOWN_USERNAME: &str = "Unknown";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A post author. Created once per distinct author and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Avatar image URI.
    pub avatar_uri: String,
}

impl User {
    /// The synthetic author used when a post's user cannot be resolved.
    ///
    /// It has an empty id, the username `Unknown`, and the given
    /// placeholder avatar.
    pub fn fallback(placeholder_avatar: &str) -> Self {
        Self {
            id: UserId::from(""),
            username: UNKNOWN_USERNAME.to_owned(),
            avatar_uri: placeholder_avatar.to_owned(),
        }
    }

    /// Whether this is the synthetic fallback author.
    pub fn is_fallback(&self) -> bool {
        self.id.is_empty()
    }
}

/// A feed post.
///
/// `likes` moves by exactly one on each like toggle and saturates at zero;
/// `comments` and `shares` only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Post {
    /// Post identifier.
    pub id: PostId,
    /// URI of the media the post shows.
    pub content_uri: String,
    /// Kind of media behind `content_uri`.
    pub content_type: ContentType,
    /// Author of the post (refers to [`User::id`]).
    pub user_id: UserId,
    /// Like counter.
    pub likes: u32,
    /// Comment counter.
    pub comments: u32,
    /// Share counter.
    pub shares: u32,
    /// Whether the local user liked the post.
    pub liked: bool,
    /// Whether the local user saved the post.
    pub saved: bool,
    /// Caption text.
    pub caption: String,
}

impl Post {
    /// Create a fresh post with zeroed counters and flags.
    pub fn new(
        id: PostId,
        user_id: UserId,
        content_uri: String,
        content_type: ContentType,
        caption: String,
    ) -> Self {
        Self {
            id,
            content_uri,
            content_type,
            user_id,
            likes: 0,
            comments: 0,
            shares: 0,
            liked: false,
            saved: false,
            caption,
        }
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// A post joined with its author, ready for display.
///
/// Rebuilt on every projection pass and never persisted as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct FeedItem {
    /// The underlying post.
    #[serde(flatten)]
    pub post: Post,
    /// The resolved author, or the fallback author.
    pub user: User,
}

impl FeedItem {
    /// Join a post with its author.
    pub const fn new(post: Post, user: User) -> Self {
        Self { post, user }
    }

    /// The post identifier.
    pub const fn id(&self) -> &PostId {
        &self.post.id
    }
}

/// Ephemeral state of the story viewer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PlaybackState {
    /// Whether the story modal is open.
    pub is_modal_visible: bool,
    /// Post shown by the current story, if the modal is open.
    pub current_story_id: Option<PostId>,
    /// Index of the current story in the story reel.
    pub story_index: usize,
    /// Timer progress of the current story, in `[0, 1]`.
    pub progress: f64,
    /// Whether the user is holding the story.
    pub is_paused: bool,
}

impl PlaybackState {
    /// The closed, idle state.
    pub fn closed() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Inputs from the presentation layer
// ---------------------------------------------------------------------------

/// One viewport-intersection report for a rendered feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ViewportEntry {
    /// Feed item the report is about.
    pub id: PostId,
    /// Fraction of the item's area inside the visible region, in `[0, 1]`.
    pub covered_fraction: f64,
}

impl ViewportEntry {
    /// Build an entry.
    pub fn new(id: impl Into<PostId>, covered_fraction: f64) -> Self {
        Self {
            id: id.into(),
            covered_fraction,
        }
    }
}

/// Result of a camera or gallery capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CaptureResult {
    /// URI of the captured media.
    pub uri: String,
    /// MIME type reported by the picker, if any.
    pub mime_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Outputs to the presentation layer
// ---------------------------------------------------------------------------

/// A one-shot message for the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Notification {
    /// Success or failure.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// When the notification was raised.
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    /// A success notification raised now.
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.to_owned(),
            message: message.to_owned(),
            raised_at: Utc::now(),
        }
    }

    /// An error notification raised now.
    pub fn error(title: &str, message: &str) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.to_owned(),
            message: message.to_owned(),
            raised_at: Utc::now(),
        }
    }
}
