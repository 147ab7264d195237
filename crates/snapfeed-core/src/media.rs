//! Fallback media and app-local media storage.

use std::path::{Path, PathBuf};

use snapfeed_types::{ContentType, PostId};

use crate::config::MediaConfig;

/// URI schemes the presentation layer can load.
const LOADABLE_SCHEMES: [&str; 4] = ["http", "https", "file", "content"];

/// Errors from copying captured media into app storage.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The capture URI does not point at a local file.
    #[error("unsupported media source: {0}")]
    UnsupportedSource(String),

    /// Creating the media directory or copying the file failed.
    #[error("failed to copy media to {path}: {source}")]
    Io {
        /// Destination that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Placeholder media per content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFallbacks {
    image: String,
    video: String,
    pdf: String,
}

impl MediaFallbacks {
    /// Build the fallback table from configuration.
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            image: config.fallback_image.clone(),
            video: config.fallback_video.clone(),
            pdf: config.fallback_pdf.clone(),
        }
    }

    /// The fallback URI for `kind`.
    pub fn for_kind(&self, kind: ContentType) -> &str {
        match kind {
            ContentType::Image => &self.image,
            ContentType::Video => &self.video,
            ContentType::Pdf => &self.pdf,
        }
    }

    /// `uri` if it is loadable, otherwise the fallback for `kind`.
    pub fn sanitize(&self, kind: ContentType, uri: &str) -> String {
        if is_loadable_uri(uri) {
            uri.to_owned()
        } else {
            tracing::debug!(uri, kind = %kind, "Replacing unloadable media URI");
            self.for_kind(kind).to_owned()
        }
    }
}

impl Default for MediaFallbacks {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

/// Whether `uri` has a loadable scheme and a non-empty location.
pub fn is_loadable_uri(uri: &str) -> bool {
    uri.split_once("://").is_some_and(|(scheme, rest)| {
        !rest.trim().is_empty()
            && LOADABLE_SCHEMES
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme))
    })
}

/// Local filesystem path behind a `file://` URI or a bare path.
fn local_path(uri: &str) -> Option<&Path> {
    match uri.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("file") && !rest.is_empty() => {
            Some(Path::new(rest))
        }
        Some(_) => None,
        None if uri.is_empty() => None,
        None => Some(Path::new(uri)),
    }
}

/// The local file behind a captured media URI.
///
/// # Errors
///
/// Returns [`MediaError::UnsupportedSource`] if `source_uri` is not a local
/// file.
pub fn local_source(source_uri: &str) -> Result<&Path, MediaError> {
    local_path(source_uri).ok_or_else(|| MediaError::UnsupportedSource(source_uri.to_owned()))
}

/// Copy captured media into `media_dir` as `<post id>.<ext>` and return the
/// `file://` URI of the copy.
///
/// The directory is created if needed.
///
/// # Errors
///
/// Returns [`MediaError::UnsupportedSource`] if `source_uri` is not a local
/// file, or [`MediaError::Io`] if the copy fails.
pub async fn copy_into_media_dir(
    media_dir: &Path,
    post_id: &PostId,
    kind: ContentType,
    source_uri: &str,
) -> Result<String, MediaError> {
    let source = local_source(source_uri)?;

    tokio::fs::create_dir_all(media_dir)
        .await
        .map_err(|source| MediaError::Io {
            path: media_dir.to_path_buf(),
            source,
        })?;

    let dest = media_dir.join(format!("{post_id}.{}", kind.file_extension()));
    tokio::fs::copy(source, &dest)
        .await
        .map_err(|source| MediaError::Io {
            path: dest.clone(),
            source,
        })?;

    tracing::debug!(post_id = %post_id, dest = %dest.display(), "Copied media");
    Ok(format!("file://{}", dest.display()))
}

/// Remove a copy made by [`copy_into_media_dir`], logging instead of
/// failing when it cannot be removed.
pub async fn discard_copy(copy_uri: &str) {
    let Some(path) = local_path(copy_uri) else {
        return;
    };
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed orphaned media copy"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned media copy");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn loadable_uris() {
        assert!(is_loadable_uri("https://picsum.photos/200/300"));
        assert!(is_loadable_uri("file:///data/media/p1.jpg"));
        assert!(is_loadable_uri("content://media/external/images/1"));
        assert!(!is_loadable_uri(""));
        assert!(!is_loadable_uri("not a uri"));
        assert!(!is_loadable_uri("https://"));
        assert!(!is_loadable_uri("ftp://example.com/a.jpg"));
    }

    #[test]
    fn sanitize_swaps_in_the_kind_fallback() {
        let fallbacks = MediaFallbacks::default();
        let video = fallbacks.sanitize(ContentType::Video, "garbage");
        assert_eq!(video, fallbacks.for_kind(ContentType::Video));
        let kept = fallbacks.sanitize(ContentType::Pdf, "https://example.com/a.pdf");
        assert_eq!(kept, "https://example.com/a.pdf");
    }

    #[test]
    fn local_paths() {
        assert_eq!(local_path("file:///tmp/a.jpg"), Some(Path::new("/tmp/a.jpg")));
        assert_eq!(local_path("/tmp/a.jpg"), Some(Path::new("/tmp/a.jpg")));
        assert_eq!(local_path("https://example.com/a.jpg"), None);
        assert_eq!(local_path(""), None);
    }

    #[tokio::test]
    async fn copy_names_the_file_after_the_post() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("capture.bin");
        tokio::fs::write(&src, b"frames").await.unwrap();

        let media_dir = tempfile::tempdir().unwrap();
        let target = media_dir.path().join("media");
        let id = PostId::from("p42");
        let uri = copy_into_media_dir(
            &target,
            &id,
            ContentType::Video,
            &format!("file://{}", src.display()),
        )
        .await
        .unwrap();

        let dest = target.join("p42.mp4");
        assert_eq!(uri, format!("file://{}", dest.display()));
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn discarded_copies_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let copy = dir.path().join("p1.jpg");
        tokio::fs::write(&copy, b"pixels").await.unwrap();
        let uri = format!("file://{}", copy.display());

        discard_copy(&uri).await;
        assert!(!copy.exists());

        // Already gone and remote URIs are both tolerated.
        discard_copy(&uri).await;
        discard_copy("https://example.com/p1.jpg").await;
    }

    #[tokio::test]
    async fn remote_sources_are_rejected() {
        let media_dir = tempfile::tempdir().unwrap();
        let err = copy_into_media_dir(
            media_dir.path(),
            &PostId::from("p1"),
            ContentType::Image,
            "https://example.com/a.jpg",
        )
        .await;
        assert!(matches!(err, Err(MediaError::UnsupportedSource(_))));
    }
}
