//! Startup pipeline: reconcile, query, project, then publish the feed.
//!
//! The pipeline runs once per loader. The stages are strictly ordered and
//! the feed is only replaced after every stage succeeded.

use snapfeed_db::{DbError, DedupReconciler, LocalStore, ReconcileReport};
use snapfeed_types::Post;
use tokio::sync::OnceCell;

use crate::feed::SharedFeed;
use crate::projector::FeedProjector;

/// Errors from the load pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Reconciling or querying the store failed.
    #[error("failed to load feed from store: {0}")]
    Store(#[from] DbError),
}

/// Outcome of a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Result of the dedup stage.
    pub reconcile: ReconcileReport,
    /// Post rows read from the store.
    pub posts: usize,
    /// Items published to the feed.
    pub items: usize,
    /// Whether this call was a no-op because the pipeline already ran.
    pub skipped: bool,
}

/// Orchestrates the initial feed load.
pub struct FeedLoader {
    store: LocalStore,
    reconciler: DedupReconciler,
    projector: FeedProjector,
    feed: SharedFeed,
    latch: OnceCell<LoadReport>,
}

impl FeedLoader {
    /// Create a loader publishing into `feed`.
    pub fn new(store: LocalStore, projector: FeedProjector, feed: SharedFeed) -> Self {
        Self {
            reconciler: DedupReconciler::new(store.clone()),
            store,
            projector,
            feed,
            latch: OnceCell::new(),
        }
    }

    /// Run the pipeline once.
    ///
    /// Concurrent and later callers wait for the first run and get a
    /// skipped report. A failed run leaves the feed untouched and the latch
    /// open.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if reconciling or querying fails.
    pub async fn load(&self) -> Result<LoadReport, LoadError> {
        let mut ran_here = false;
        let flag = &mut ran_here;
        let report = self
            .latch
            .get_or_try_init(move || async move {
                *flag = true;
                self.run_pipeline().await
            })
            .await?;

        if ran_here {
            Ok(*report)
        } else {
            tracing::debug!("Feed already loaded, skipping");
            Ok(LoadReport {
                skipped: true,
                ..LoadReport::default()
            })
        }
    }

    /// Run every pipeline stage unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if reconciling or querying fails.
    pub async fn run_pipeline(&self) -> Result<LoadReport, LoadError> {
        let reconcile = self.reconciler.reconcile().await?;

        let posts: Vec<Post> = self
            .store
            .query::<Post>(None)
            .await?
            .into_iter()
            .map(|stored| stored.record)
            .collect();
        let post_count = posts.len();

        let items = self.projector.project(&self.store, posts).await;
        let item_count = items.len();
        self.feed.lock().await.set_feed(items);

        let report = LoadReport {
            reconcile,
            posts: post_count,
            items: item_count,
            skipped: false,
        };
        tracing::info!(
            removed_duplicates = report.reconcile.removed,
            posts = report.posts,
            items = report.items,
            "Feed loaded"
        );
        Ok(report)
    }
}
