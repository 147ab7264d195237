//! Joins posts with their authors into display-ready feed items.
//!
//! Projection never fails: a post whose author cannot be resolved is shown
//! with the fallback author, and an unloadable content URI is replaced by
//! the fallback media for its kind.

use std::collections::HashSet;
use std::future::Future;

use snapfeed_db::{DbError, LocalStore};
use snapfeed_types::{FeedItem, Post, User, UserId};

use crate::media::MediaFallbacks;

/// Source of post authors.
pub trait UserResolver {
    /// Resolve the author with `user_id`.
    ///
    /// A missing author is reported as [`DbError::RelationNotFound`].
    fn resolve(&self, user_id: &UserId) -> impl Future<Output = Result<User, DbError>> + Send;
}

impl UserResolver for LocalStore {
    fn resolve(&self, user_id: &UserId) -> impl Future<Output = Result<User, DbError>> + Send {
        self.resolve_user(user_id)
    }
}

/// Builds the feed from stored posts.
#[derive(Debug, Clone)]
pub struct FeedProjector {
    placeholder_avatar: String,
    fallbacks: MediaFallbacks,
}

impl FeedProjector {
    /// Create a projector using `placeholder_avatar` for the fallback author.
    pub fn new(placeholder_avatar: &str, fallbacks: MediaFallbacks) -> Self {
        Self {
            placeholder_avatar: placeholder_avatar.to_owned(),
            fallbacks,
        }
    }

    /// Project `posts` (in storage insertion order) into feed items, most
    /// recently created first.
    ///
    /// Posts repeating an earlier id are dropped. Authors are resolved
    /// concurrently.
    pub async fn project<R>(&self, resolver: &R, posts: Vec<Post>) -> Vec<FeedItem>
    where
        R: UserResolver + Sync,
    {
        let posts = dedup_by_id(posts);
        let authors = futures::future::join_all(posts.iter().map(|p| resolver.resolve(&p.user_id))).await;

        let mut fallbacks_used = 0_usize;
        let mut items: Vec<FeedItem> = posts
            .into_iter()
            .zip(authors)
            .map(|(mut post, author)| {
                let user = match author {
                    Ok(user) => user,
                    Err(e) => {
                        if e.is_relation_not_found() {
                            tracing::debug!(post_id = %post.id, user_id = %post.user_id, "Post author missing");
                        } else {
                            tracing::warn!(post_id = %post.id, error = %e, "Failed to resolve post author");
                        }
                        fallbacks_used = fallbacks_used.saturating_add(1);
                        User::fallback(&self.placeholder_avatar)
                    }
                };
                post.content_uri = self.fallbacks.sanitize(post.content_type, &post.content_uri);
                FeedItem::new(post, user)
            })
            .collect();
        items.reverse();

        tracing::debug!(
            items = items.len(),
            fallback_authors = fallbacks_used,
            "Projected feed"
        );
        items
    }
}

/// Keep the first post for each id, preserving order.
fn dedup_by_id(posts: Vec<Post>) -> Vec<Post> {
    let mut seen = HashSet::with_capacity(posts.len());
    posts
        .into_iter()
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;

    use snapfeed_types::{ContentType, PostId, UNKNOWN_USERNAME};

    use super::*;

    const PLACEHOLDER: &str = "https://example.com/placeholder.png";

    struct MapResolver {
        users: HashMap<UserId, User>,
        broken: Option<UserId>,
    }

    impl MapResolver {
        fn with(usernames: &[(&str, &str)]) -> Self {
            let users = usernames
                .iter()
                .map(|(id, name)| {
                    let user = User {
                        id: UserId::from(*id),
                        username: (*name).to_owned(),
                        avatar_uri: format!("https://example.com/{id}.png"),
                    };
                    (user.id.clone(), user)
                })
                .collect();
            Self { users, broken: None }
        }
    }

    impl UserResolver for MapResolver {
        fn resolve(&self, user_id: &UserId) -> impl Future<Output = Result<User, DbError>> + Send {
            let result = if self.broken.as_ref() == Some(user_id) {
                Err(DbError::Config("storage offline".to_owned()))
            } else {
                self.users
                    .get(user_id)
                    .cloned()
                    .ok_or_else(|| DbError::RelationNotFound {
                        table: "users",
                        id: user_id.to_string(),
                    })
            };
            async move { result }
        }
    }

    fn post(id: &str, user_id: &str) -> Post {
        Post::new(
            PostId::from(id),
            UserId::from(user_id),
            format!("https://example.com/{id}.jpg"),
            ContentType::Image,
            String::new(),
        )
    }

    fn projector() -> FeedProjector {
        FeedProjector::new(PLACEHOLDER, MediaFallbacks::default())
    }

    #[tokio::test]
    async fn most_recent_post_comes_first() {
        let resolver = MapResolver::with(&[("u1", "a"), ("u2", "b"), ("u3", "c")]);
        let posts = vec![post("p1", "u1"), post("p2", "u2"), post("p3", "u3")];

        let items = projector().project(&resolver, posts).await;
        let ids: Vec<_> = items.iter().map(|i| i.id().as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2", "p1"]);
        assert_eq!(items[0].user.username, "c");
        assert_eq!(items[2].user.username, "a");
    }

    #[tokio::test]
    async fn missing_author_gets_the_fallback() {
        let resolver = MapResolver::with(&[("u1", "a")]);
        let posts = vec![post("p1", "u1"), post("p2", "ghost")];

        let items = projector().project(&resolver, posts).await;
        assert_eq!(items.len(), 2);
        let orphan = &items[0];
        assert!(orphan.user.is_fallback());
        assert_eq!(orphan.user.username, UNKNOWN_USERNAME);
        assert_eq!(orphan.user.avatar_uri, PLACEHOLDER);
        assert!(!items[1].user.is_fallback());
    }

    #[tokio::test]
    async fn resolver_failure_does_not_fail_projection() {
        let mut resolver = MapResolver::with(&[("u1", "a"), ("u2", "b")]);
        resolver.broken = Some(UserId::from("u2"));
        let posts = vec![post("p1", "u1"), post("p2", "u2")];

        let items = projector().project(&resolver, posts).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].user.is_fallback());
        assert_eq!(items[1].user.username, "a");
    }

    #[tokio::test]
    async fn duplicate_ids_keep_the_first_post() {
        let resolver = MapResolver::with(&[("u1", "a")]);
        let mut first = post("p1", "u1");
        first.caption = "first".to_owned();
        let mut second = post("p1", "u1");
        second.caption = "second".to_owned();

        let items = projector()
            .project(&resolver, vec![first, post("p2", "u1"), second])
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].post.caption, "first");
    }

    #[tokio::test]
    async fn unloadable_uri_is_replaced() {
        let resolver = MapResolver::with(&[("u1", "a")]);
        let mut broken = post("p1", "u1");
        broken.content_type = ContentType::Pdf;
        broken.content_uri = String::new();

        let items = projector().project(&resolver, vec![broken]).await;
        assert_eq!(
            items[0].post.content_uri,
            MediaFallbacks::default().for_kind(ContentType::Pdf)
        );
    }

    #[tokio::test]
    async fn empty_input_projects_to_empty_feed() {
        let resolver = MapResolver::with(&[]);
        assert!(projector().project(&resolver, Vec::new()).await.is_empty());
    }
}
