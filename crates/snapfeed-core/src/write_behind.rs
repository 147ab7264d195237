//! Background writer applying feed mutations to the local store.
//!
//! The feed store updates memory synchronously and hands the durable side
//! of each mutation to a [`WriteThrough`] sink. [`WriteBehind`] is the
//! production sink: a single task drains an unbounded channel, so
//! operations land in submission order. A failed operation is logged and
//! abandoned; memory is never rolled back.

use std::sync::Arc;

use snapfeed_db::{LocalStore, PostPatch};
use snapfeed_types::{Post, PostId, User};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One durable write scheduled by a feed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Patch the interaction fields of every row carrying `post_id`.
    Patch {
        /// Target post.
        post_id: PostId,
        /// Fields to write.
        patch: PostPatch,
    },
    /// Insert or overwrite a post, inserting its author first if missing.
    Upsert {
        /// The post.
        post: Post,
        /// Its author, when known.
        author: Option<User>,
    },
}

impl WriteOp {
    /// The post this operation targets.
    pub const fn post_id(&self) -> &PostId {
        match self {
            Self::Patch { post_id, .. } => post_id,
            Self::Upsert { post, .. } => &post.id,
        }
    }
}

/// Fire-and-forget sink for durable writes.
pub trait WriteThrough: Send + Sync {
    /// Schedule `op`. Never blocks and never reports failure to the caller.
    fn submit(&self, op: WriteOp);
}

/// A sink that drops every operation, for purely in-memory feeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl WriteThrough for Discard {
    fn submit(&self, op: WriteOp) {
        tracing::trace!(post_id = %op.post_id(), "Discarding write-through");
    }
}

/// Counts reported by the writer task when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Operations applied successfully.
    pub applied: u64,
    /// Operations that failed and were abandoned.
    pub failed: u64,
}

/// Sending half of the write-behind queue.
#[derive(Debug, Clone)]
pub struct WriteBehind {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehind {
    /// Spawn the writer task over `store`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(store: LocalStore) -> (Self, WriterHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_writer(store, rx, shutdown_rx));
        tracing::debug!("Write-behind task started");
        (
            Self { tx },
            WriterHandle {
                task,
                shutdown: shutdown_tx,
            },
        )
    }

    /// Wrap in an [`Arc`] as a trait object for the feed store.
    pub fn shared(self) -> Arc<dyn WriteThrough> {
        Arc::new(self)
    }
}

impl WriteThrough for WriteBehind {
    fn submit(&self, op: WriteOp) {
        if let Err(mpsc::error::SendError(op)) = self.tx.send(op) {
            tracing::warn!(post_id = %op.post_id(), "Write-behind queue closed, dropping write");
        }
    }
}

/// Owner of the writer task.
#[derive(Debug)]
pub struct WriterHandle {
    task: JoinHandle<WriterStats>,
    shutdown: oneshot::Sender<()>,
}

impl WriterHandle {
    /// Stop accepting new operations, apply everything already queued, and
    /// wait for the task to finish.
    pub async fn finish(self) -> WriterStats {
        // The task may already have stopped because every sender is gone.
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "Write-behind task did not finish cleanly");
                WriterStats::default()
            }
        }
    }
}

async fn run_writer(
    store: LocalStore,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    mut shutdown: oneshot::Receiver<()>,
) -> WriterStats {
    let mut stats = WriterStats::default();
    let mut closing = false;
    loop {
        tokio::select! {
            op = rx.recv() => {
                let Some(op) = op else { break };
                if apply(&store, &op).await {
                    stats.applied = stats.applied.saturating_add(1);
                } else {
                    stats.failed = stats.failed.saturating_add(1);
                }
            }
            _ = &mut shutdown, if !closing => {
                rx.close();
                closing = true;
            }
        }
    }
    tracing::debug!(applied = stats.applied, failed = stats.failed, "Write-behind task stopped");
    stats
}

async fn apply(store: &LocalStore, op: &WriteOp) -> bool {
    let result = match op {
        WriteOp::Patch { post_id, patch } => store.apply_post_patch(post_id, patch).await.map(drop),
        WriteOp::Upsert { post, author } => store.upsert_post(post, author.as_ref()).await.map(drop),
    };
    match result {
        Ok(()) => {
            tracing::debug!(post_id = %op.post_id(), "Write-through applied");
            true
        }
        Err(e) => {
            tracing::warn!(post_id = %op.post_id(), error = %e, "Write-through failed, abandoning");
            false
        }
    }
}
