//! Startup removal of duplicate post rows.
//!
//! Several rows may carry the same post id (for example after an
//! interrupted write-through replayed an insert). The reconciler keeps the
//! first row for each id in storage order and destroys the others, all in
//! one write scope.

use std::collections::HashSet;

use snapfeed_types::{Post, PostId};
use tokio::sync::OnceCell;

use crate::error::DbError;
use crate::schema::{RecordKey, Stored};
use crate::sqlite::LocalStore;

/// Outcome of a reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Post rows inspected.
    pub scanned: usize,
    /// Duplicate rows destroyed.
    pub removed: usize,
    /// Whether this call was a no-op because another call already ran.
    pub skipped: bool,
}

impl ReconcileReport {
    const fn skipped() -> Self {
        Self {
            scanned: 0,
            removed: 0,
            skipped: true,
        }
    }
}

/// Removes duplicate post rows once per process.
pub struct DedupReconciler {
    store: LocalStore,
    latch: OnceCell<ReconcileReport>,
}

impl DedupReconciler {
    /// Create a reconciler over `store`.
    pub const fn new(store: LocalStore) -> Self {
        Self {
            store,
            latch: OnceCell::const_new(),
        }
    }

    /// Run the reconciliation pass at most once for this reconciler.
    ///
    /// The caller that performs the pass gets its report. Every other
    /// caller, whether it arrives while the pass is in flight or after it
    /// completed, waits for it and gets a skipped report with nothing
    /// removed. A failed pass leaves the latch open so a later call can
    /// retry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the pass fails; no rows are removed then.
    pub async fn reconcile(&self) -> Result<ReconcileReport, DbError> {
        let mut ran_here = false;
        let flag = &mut ran_here;
        let report = self
            .latch
            .get_or_try_init(move || async move {
                *flag = true;
                self.run_pass().await
            })
            .await?;

        if ran_here {
            Ok(*report)
        } else {
            tracing::debug!("Dedup reconciliation already ran, skipping");
            Ok(ReconcileReport::skipped())
        }
    }

    /// Run one reconciliation pass unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if reading or deleting fails; the pass is rolled
    /// back as a whole.
    pub async fn run_pass(&self) -> Result<ReconcileReport, DbError> {
        let mut scope = self.store.write().await?;
        let posts = scope.query::<Post>(None).await?;
        let duplicates = duplicate_keys(&posts);
        for key in &duplicates {
            scope.destroy::<Post>(*key).await?;
        }
        scope.commit().await?;

        let report = ReconcileReport {
            scanned: posts.len(),
            removed: duplicates.len(),
            skipped: false,
        };
        if report.removed > 0 {
            tracing::info!(
                scanned = report.scanned,
                removed = report.removed,
                "Removed duplicate posts"
            );
        } else {
            tracing::debug!(scanned = report.scanned, "No duplicate posts found");
        }
        Ok(report)
    }
}

/// Keys of every row whose post id already appeared earlier in `posts`.
pub fn duplicate_keys(posts: &[Stored<Post>]) -> Vec<RecordKey> {
    let mut seen: HashSet<&PostId> = HashSet::with_capacity(posts.len());
    posts
        .iter()
        .filter(|stored| !seen.insert(&stored.record.id))
        .map(|stored| stored.key)
        .collect()
}
