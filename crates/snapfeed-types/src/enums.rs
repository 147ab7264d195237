//! Enumeration types for the Snapfeed feed client.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// The kind of media a post carries.
///
/// Stored as `image`, `video` or `pdf` in the `posts.content_type` column.
/// Every rendering or playback decision matches on this enum exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ContentType {
    /// A still image.
    Image,
    /// A video clip; the only kind with a media player.
    Video,
    /// A PDF document.
    Pdf,
}

impl ContentType {
    /// All content kinds, in storage order.
    pub const ALL: [Self; 3] = [Self::Image, Self::Video, Self::Pdf];

    /// The storage name of this content kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Pdf => "pdf",
        }
    }

    /// Parse a storage name. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Classify a capture result by its MIME type.
    ///
    /// Anything mentioning `video` is a video, anything mentioning `pdf` is
    /// a document, and everything else (including a missing type) is an
    /// image.
    pub fn from_mime(mime: Option<&str>) -> Self {
        match mime {
            Some(m) if m.contains("video") => Self::Video,
            Some(m) if m.contains("pdf") => Self::Pdf,
            _ => Self::Image,
        }
    }

    /// File extension used when the media is copied into app storage.
    pub const fn file_extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
            Self::Pdf => "pdf",
        }
    }
}

impl core::fmt::Display for ContentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Which half of the story viewport a tap landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TapSide {
    /// Left half: go back one story.
    Left,
    /// Right half: go forward one story.
    Right,
}

impl TapSide {
    /// Classify a tap by its x-coordinate within a viewport of `width`.
    ///
    /// The exact midpoint counts as the right half.
    pub fn from_position(x: f64, width: f64) -> Self {
        if x < width / 2.0 { Self::Left } else { Self::Right }
    }
}

/// Coarse state of the story playback state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PlaybackPhase {
    /// Modal closed, no timer.
    #[default]
    Idle,
    /// Modal open, timer running.
    Playing,
    /// Modal open, timer halted while the user presses.
    Paused,
}

/// Why the story modal closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum CloseReason {
    /// Left tap on the first story.
    TappedBeforeFirst,
    /// Right tap on the last story.
    TappedPastLast,
    /// The timer ran out on the last story.
    Finished,
    /// Explicit dismiss by the user.
    Dismissed,
}

/// Player state the presentation layer should apply to a feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PlayerState {
    /// The item's video player decodes and plays.
    Playing,
    /// The item's video player is paused and not decoding.
    Paused,
    /// The item has no player (image or document).
    Static,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum NotificationKind {
    /// The user's action completed.
    Success,
    /// The user's action failed.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_storage_names_roundtrip() {
        for kind in ContentType::ALL {
            assert_eq!(ContentType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ContentType::parse("gif"), None);
    }

    #[test]
    fn content_type_from_mime() {
        assert_eq!(ContentType::from_mime(Some("video/mp4")), ContentType::Video);
        assert_eq!(ContentType::from_mime(Some("application/pdf")), ContentType::Pdf);
        assert_eq!(ContentType::from_mime(Some("image/jpeg")), ContentType::Image);
        assert_eq!(ContentType::from_mime(None), ContentType::Image);
    }

    #[test]
    fn content_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContentType::Pdf).ok();
        assert_eq!(json.as_deref(), Some("\"pdf\""));
    }

    #[test]
    fn tap_side_splits_viewport_in_half() {
        assert_eq!(TapSide::from_position(10.0, 400.0), TapSide::Left);
        assert_eq!(TapSide::from_position(199.9, 400.0), TapSide::Left);
        assert_eq!(TapSide::from_position(200.0, 400.0), TapSide::Right);
        assert_eq!(TapSide::from_position(390.0, 400.0), TapSide::Right);
    }
}
