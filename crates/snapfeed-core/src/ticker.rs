//! Async driver feeding wall-clock time into story playback.
//!
//! A [`StoryTicker`] belongs to the story view: it is started when the view
//! mounts and aborted when it is dropped. It also stops by itself once the
//! story modal has closed.

use std::time::Duration;

use snapfeed_types::PlaybackPhase;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::feed::SharedFeed;

/// Shortest accepted tick interval.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to the running ticker task. Dropping it stops the task.
#[derive(Debug)]
pub struct StoryTicker {
    task: JoinHandle<()>,
}

impl StoryTicker {
    /// Start ticking `feed` every `interval`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn(feed: SharedFeed, interval: Duration) -> Self {
        let interval = interval.max(MIN_TICK_INTERVAL);
        let task = tokio::spawn(run_ticker(feed, interval));
        Self { task }
    }

    /// Whether the ticker task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the ticker now.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for StoryTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_ticker(feed: SharedFeed, interval: Duration) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticks.tick().await;
    let mut last = Instant::now();

    loop {
        ticks.tick().await;
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(last);
        last = now;

        let mut feed = feed.lock().await;
        if let Some(event) = feed.advance_playback(elapsed) {
            tracing::debug!(event = ?event, "Story timer transition");
        }
        if feed.playback_phase() == PlaybackPhase::Idle {
            tracing::debug!("Story modal closed, ticker stopping");
            break;
        }
    }
}
