//! Turns a capture result and caption into a persisted post.
//!
//! Submission is the one user-initiated action whose failure the user sees:
//! every outcome raises a one-shot notification on the feed.

use std::path::PathBuf;

use snapfeed_db::{DbError, LocalStore};
use snapfeed_types::{CaptureResult, ContentType, FeedItem, Notification, Post, PostId};

use crate::config::{AuthorConfig, SnapfeedConfig};
use crate::feed::SharedFeed;
use crate::media::{self, MediaError};

/// Errors from submitting a new post.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// No media was captured or picked.
    #[error("no media selected")]
    NoMedia,

    /// Copying the media into app storage failed.
    #[error("failed to save media: {0}")]
    Media(#[from] MediaError),

    /// Writing the author or the post failed.
    #[error("failed to save post: {0}")]
    Store(#[from] DbError),
}

impl ComposeError {
    /// The notification shown to the user for this failure.
    pub fn notification(&self) -> Notification {
        match self {
            Self::NoMedia => Notification::error("No media selected", "Capture or pick media first."),
            Self::Media(_) => Notification::error("Error", "Failed to save media."),
            Self::Store(_) => Notification::error("Error", "Failed to save post."),
        }
    }
}

/// Creates posts authored by the local user.
pub struct PostComposer {
    store: LocalStore,
    feed: SharedFeed,
    media_dir: PathBuf,
    author: AuthorConfig,
}

impl PostComposer {
    /// Create a composer writing media into `media_dir`.
    pub const fn new(
        store: LocalStore,
        feed: SharedFeed,
        media_dir: PathBuf,
        author: AuthorConfig,
    ) -> Self {
        Self {
            store,
            feed,
            media_dir,
            author,
        }
    }

    /// Create a composer from configuration.
    pub fn from_config(store: LocalStore, feed: SharedFeed, config: &SnapfeedConfig) -> Self {
        Self::new(
            store,
            feed,
            config.media.media_dir.clone(),
            config.author.clone(),
        )
    }

    /// Submit a post for `capture` with `caption`.
    ///
    /// The local author is looked up or created, the media is copied to
    /// `<media dir>/<post id>.<ext>`, the post is inserted, and the new item
    /// is put at the head of the feed. The copy is removed again if the
    /// insert fails. A success or error notification
    /// is raised either way.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError`] if any step fails; the feed is unchanged
    /// then.
    pub async fn submit(
        &self,
        capture: Option<&CaptureResult>,
        caption: &str,
    ) -> Result<FeedItem, ComposeError> {
        match self.compose(capture, caption).await {
            Ok(item) => {
                let mut feed = self.feed.lock().await;
                feed.add_persisted_post(item.clone());
                feed.notify(Notification::success("Posted!", "Your post has been added."));
                Ok(item)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Post submission failed");
                self.feed.lock().await.notify(e.notification());
                Err(e)
            }
        }
    }

    async fn compose(
        &self,
        capture: Option<&CaptureResult>,
        caption: &str,
    ) -> Result<FeedItem, ComposeError> {
        let capture = capture
            .filter(|c| !c.uri.trim().is_empty())
            .ok_or(ComposeError::NoMedia)?;
        let kind = ContentType::from_mime(capture.mime_type.as_deref());
        let post_id = PostId::generate();
        media::local_source(&capture.uri)?;

        let user = self
            .store
            .find_or_create_user(&self.author.username, &self.author.avatar_uri)
            .await?;

        let content_uri =
            media::copy_into_media_dir(&self.media_dir, &post_id, kind, &capture.uri).await?;

        let post = Post::new(
            post_id,
            user.id.clone(),
            content_uri,
            kind,
            caption.to_owned(),
        );
        if let Err(e) = self.store.create(&post).await {
            media::discard_copy(&post.content_uri).await;
            return Err(e.into());
        }

        tracing::info!(post_id = %post.id, kind = %kind, user_id = %user.id, "Post created");
        Ok(FeedItem::new(post, user))
    }
}
