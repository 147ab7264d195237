//! [`Record`] mappings for the domain structs, plus typed post patches.

use snapfeed_types::{ContentType, Post, PostId, User, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::DbError;
use crate::schema::{Fields, POSTS, Patch, Record, TableSchema, USERS};

impl Record for User {
    const SCHEMA: &'static TableSchema = &USERS;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .set("id", self.id.as_str())
            .set("username", self.username.as_str())
            .set("avatar_uri", self.avatar_uri.as_str())
    }

    fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
        Ok(Self {
            id: UserId::from(text(row, &USERS, "id")?),
            username: text(row, &USERS, "username")?,
            avatar_uri: text(row, &USERS, "avatar_uri")?,
        })
    }
}

impl Record for Post {
    const SCHEMA: &'static TableSchema = &POSTS;

    fn to_fields(&self) -> Fields {
        Fields::new()
            .set("id", self.id.as_str())
            .set("content_uri", self.content_uri.as_str())
            .set("content_type", self.content_type.as_str())
            .set("user_id", self.user_id.as_str())
            .set("likes", self.likes)
            .set("comments", self.comments)
            .set("shares", self.shares)
            .set("liked", self.liked)
            .set("saved", self.saved)
            .set("caption", self.caption.as_str())
    }

    fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
        let kind = text(row, &POSTS, "content_type")?;
        let content_type = ContentType::parse(&kind).ok_or_else(|| DbError::Decode {
            table: POSTS.name,
            column: "content_type",
            reason: format!("unknown content type {kind:?}"),
        })?;

        Ok(Self {
            id: PostId::from(text(row, &POSTS, "id")?),
            content_uri: text(row, &POSTS, "content_uri")?,
            content_type,
            user_id: UserId::from(text(row, &POSTS, "user_id")?),
            likes: counter(row, "likes")?,
            comments: counter(row, "comments")?,
            shares: counter(row, "shares")?,
            liked: flag(row, "liked")?,
            saved: flag(row, "saved")?,
            caption: row
                .try_get::<Option<String>, _>("caption")?
                .unwrap_or_default(),
        })
    }
}

fn text(row: &SqliteRow, schema: &TableSchema, column: &'static str) -> Result<String, DbError> {
    row.try_get::<Option<String>, _>(column)?
        .ok_or_else(|| DbError::Decode {
            table: schema.name,
            column,
            reason: "unexpected NULL".to_owned(),
        })
}

/// A NULL counter is a missing counter and reads as zero.
fn counter(row: &SqliteRow, column: &'static str) -> Result<u32, DbError> {
    let raw = row.try_get::<Option<i64>, _>(column)?.unwrap_or(0);
    u32::try_from(raw).map_err(|e| DbError::Decode {
        table: POSTS.name,
        column,
        reason: format!("counter out of range: {raw} ({e})"),
    })
}

fn flag(row: &SqliteRow, column: &'static str) -> Result<bool, DbError> {
    Ok(row.try_get::<Option<bool>, _>(column)?.unwrap_or(false))
}

// ---------------------------------------------------------------------------
// Post patches
// ---------------------------------------------------------------------------

/// Typed partial update of a post's interaction state.
///
/// Only the fields that are `Some` are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostPatch {
    /// New `liked` flag.
    pub liked: Option<bool>,
    /// New like counter.
    pub likes: Option<u32>,
    /// New `saved` flag.
    pub saved: Option<bool>,
    /// New comment counter.
    pub comments: Option<u32>,
    /// New share counter.
    pub shares: Option<u32>,
}

impl PostPatch {
    /// Patch for a like toggle.
    pub const fn like(liked: bool, likes: u32) -> Self {
        Self {
            liked: Some(liked),
            likes: Some(likes),
            saved: None,
            comments: None,
            shares: None,
        }
    }

    /// Patch for a save toggle.
    pub const fn save(saved: bool) -> Self {
        Self {
            liked: None,
            likes: None,
            saved: Some(saved),
            comments: None,
            shares: None,
        }
    }

    /// Patch for a comment increment.
    pub const fn comments(comments: u32) -> Self {
        Self {
            liked: None,
            likes: None,
            saved: None,
            comments: Some(comments),
            shares: None,
        }
    }

    /// Patch for a share increment.
    pub const fn shares(shares: u32) -> Self {
        Self {
            liked: None,
            likes: None,
            saved: None,
            comments: None,
            shares: Some(shares),
        }
    }

    /// Patch carrying every interaction field of `post`.
    pub const fn full(post: &Post) -> Self {
        Self {
            liked: Some(post.liked),
            likes: Some(post.likes),
            saved: Some(post.saved),
            comments: Some(post.comments),
            shares: Some(post.shares),
        }
    }

    /// Whether the patch sets nothing.
    pub const fn is_empty(&self) -> bool {
        self.liked.is_none()
            && self.likes.is_none()
            && self.saved.is_none()
            && self.comments.is_none()
            && self.shares.is_none()
    }

    /// Lower into an untyped column patch.
    pub fn into_patch(self) -> Patch {
        let mut patch = Patch::new();
        if let Some(v) = self.liked {
            patch = patch.set("liked", v);
        }
        if let Some(v) = self.likes {
            patch = patch.set("likes", v);
        }
        if let Some(v) = self.saved {
            patch = patch.set("saved", v);
        }
        if let Some(v) = self.comments {
            patch = patch.set("comments", v);
        }
        if let Some(v) = self.shares {
            patch = patch.set("shares", v);
        }
        patch
    }
}
