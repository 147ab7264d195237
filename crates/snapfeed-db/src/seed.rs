//! Sample content for an empty store.

use snapfeed_types::{ContentType, Post, PostId, User, UserId};

use crate::error::DbError;
use crate::sqlite::LocalStore;

/// Users and posts to insert, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    /// Authors.
    pub users: Vec<User>,
    /// Posts referring to `users`.
    pub posts: Vec<Post>,
}

/// Rows written by [`seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Users inserted.
    pub users: usize,
    /// Posts inserted.
    pub posts: usize,
}

struct SamplePost {
    username: &'static str,
    avatar: &'static str,
    content_uri: &'static str,
    content_type: ContentType,
    caption: &'static str,
    likes: u32,
    comments: u32,
    shares: u32,
}

const SAMPLES: [SamplePost; 3] = [
    SamplePost {
        username: "john_doe",
        avatar: "https://i.pravatar.cc/150?img=1",
        content_uri: "https://picsum.photos/200/300",
        content_type: ContentType::Image,
        caption: "Sample post 1",
        likes: 120,
        comments: 10,
        shares: 5,
    },
    SamplePost {
        username: "jane_doe",
        avatar: "https://i.pravatar.cc/150?img=2",
        content_uri: "https://www.w3schools.com/html/mov_bbb.mp4",
        content_type: ContentType::Video,
        caption: "Sample video post",
        likes: 150,
        comments: 20,
        shares: 8,
    },
    SamplePost {
        username: "bob_smith",
        avatar: "https://i.pravatar.cc/150?img=3",
        content_uri: "https://www.w3.org/WAI/ER/tests/xhtml/testfiles/resources/pdf/dummy.pdf",
        content_type: ContentType::Pdf,
        caption: "Sample PDF post",
        likes: 80,
        comments: 5,
        shares: 2,
    },
];

/// Three authors with one post each: an image, a video and a PDF.
///
/// Every call generates fresh ids.
pub fn sample_content() -> SeedData {
    let mut data = SeedData::default();
    for sample in &SAMPLES {
        let user = User {
            id: UserId::generate(),
            username: sample.username.to_owned(),
            avatar_uri: sample.avatar.to_owned(),
        };
        let mut post = Post::new(
            PostId::generate(),
            user.id.clone(),
            sample.content_uri.to_owned(),
            sample.content_type,
            sample.caption.to_owned(),
        );
        post.likes = sample.likes;
        post.comments = sample.comments;
        post.shares = sample.shares;
        data.users.push(user);
        data.posts.push(post);
    }
    data
}

/// Insert `data` in one write scope: users first, then posts.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails; nothing is written then.
pub async fn seed(store: &LocalStore, data: &SeedData) -> Result<SeedReport, DbError> {
    let mut scope = store.write().await?;
    for user in &data.users {
        scope.create(user).await?;
    }
    for post in &data.posts {
        scope.create(post).await?;
    }
    scope.commit().await?;

    let report = SeedReport {
        users: data.users.len(),
        posts: data.posts.len(),
    };
    tracing::info!(users = report.users, posts = report.posts, "Seeded store");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_cover_every_content_kind() {
        let data = sample_content();
        let kinds: Vec<_> = data.posts.iter().map(|p| p.content_type).collect();
        assert_eq!(kinds, ContentType::ALL.to_vec());
    }

    #[test]
    fn every_sample_post_has_an_author() {
        let data = sample_content();
        for post in &data.posts {
            assert!(data.users.iter().any(|u| u.id == post.user_id));
        }
    }

    #[test]
    fn sample_ids_are_fresh() {
        let a = sample_content();
        let b = sample_content();
        assert_ne!(a.posts.first().map(|p| &p.id), b.posts.first().map(|p| &p.id));
    }
}
