//! Shared type definitions for the Snapfeed feed client.
//!
//! This crate is the single source of truth for the records, projections
//! and UI state exchanged between the store, the core state machines and
//! the presentation layer. Types flow to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- String identifier newtypes for posts and users
//! - [`enums`] -- Content kinds, playback phases, tap sides, player states
//! - [`structs`] -- Records, feed items, playback state, viewport input

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CloseReason, ContentType, NotificationKind, PlaybackPhase, PlayerState, TapSide};
pub use ids::{PostId, UserId};
pub use structs::{
    CaptureResult, FeedItem, Notification, PlaybackState, Post, UNKNOWN_USERNAME, User,
    ViewportEntry,
};
