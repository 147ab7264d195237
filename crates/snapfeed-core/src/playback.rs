//! Story playback state machine.
//!
//! ```text
//!            open                 press
//!   Idle ------------> Playing ----------> Paused
//!     ^                 |   ^                |
//!     |   close / tap   |   |    release     |
//!     |   past an end / |   +----------------+
//!     |   last expires  |    (timer restarts from 0)
//!     +-----------------+
//! ```
//!
//! The scheduler is driven by elapsed time ([`StoryPlaybackScheduler::advance`])
//! rather than by its own clock, so it stays synchronous and deterministic.
//! [`crate::ticker::StoryTicker`] feeds it wall-clock time. There is at most
//! one story timer: every (re)start replaces the previous one and closing
//! drops it.

use std::time::Duration;

use snapfeed_types::{CloseReason, PlaybackPhase, PlaybackState, PostId, TapSide};

/// Default duration of one story.
pub const DEFAULT_STORY_DURATION: Duration = Duration::from_secs(30);

/// A transition performed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The modal opened on a story.
    Started {
        /// Story shown.
        story_id: PostId,
        /// Its index in the reel.
        index: usize,
    },
    /// The user pressed and held; the timer stopped.
    Paused,
    /// The user released; the timer restarted from zero.
    Resumed,
    /// The current story changed.
    Advanced {
        /// Previous index.
        from: usize,
        /// New index.
        to: usize,
    },
    /// The modal closed.
    Closed {
        /// Why it closed.
        reason: CloseReason,
    },
}

/// The single running story timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StoryTimer {
    elapsed: Duration,
}

impl StoryTimer {
    const fn start() -> Self {
        Self {
            elapsed: Duration::ZERO,
        }
    }
}

/// Timer-driven story playback.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryPlaybackScheduler {
    duration: Duration,
    phase: PlaybackPhase,
    state: PlaybackState,
    reel: Vec<PostId>,
    timer: Option<StoryTimer>,
}

impl StoryPlaybackScheduler {
    /// Create an idle scheduler whose stories last `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            phase: PlaybackPhase::Idle,
            state: PlaybackState::closed(),
            reel: Vec::new(),
            timer: None,
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Observable playback state.
    pub const fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Story ids of the open reel (empty when idle).
    pub fn reel(&self) -> &[PostId] {
        &self.reel
    }

    /// Whether the story timer is running.
    pub const fn is_timer_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Open the modal on `story_id` within `reel` and start playing.
    ///
    /// If `story_id` is not part of `reel` the reel becomes that single
    /// story. Opening while already open replaces the reel and restarts the
    /// timer.
    pub fn open(&mut self, reel: Vec<PostId>, story_id: &PostId) -> PlaybackEvent {
        let (reel, index) = match reel.iter().position(|id| id == story_id) {
            Some(index) => (reel, index),
            None => (vec![story_id.clone()], 0),
        };
        self.reel = reel;
        self.phase = PlaybackPhase::Playing;
        self.state = PlaybackState {
            is_modal_visible: true,
            current_story_id: Some(story_id.clone()),
            story_index: index,
            progress: 0.0,
            is_paused: false,
        };
        self.timer = Some(StoryTimer::start());

        tracing::debug!(story_id = %story_id, index, reel_len = self.reel.len(), "Story opened");
        PlaybackEvent::Started {
            story_id: story_id.clone(),
            index,
        }
    }

    /// The user pressed and holds the story: stop the timer.
    pub fn press(&mut self) -> Option<PlaybackEvent> {
        if self.phase != PlaybackPhase::Playing {
            return None;
        }
        self.phase = PlaybackPhase::Paused;
        self.state.is_paused = true;
        self.timer = None;
        Some(PlaybackEvent::Paused)
    }

    /// The user released the story: play it again from the beginning.
    pub fn release(&mut self) -> Option<PlaybackEvent> {
        if self.phase != PlaybackPhase::Paused {
            return None;
        }
        self.phase = PlaybackPhase::Playing;
        self.state.is_paused = false;
        self.restart_timer();
        Some(PlaybackEvent::Resumed)
    }

    /// A tap on one half of the story.
    ///
    /// Left goes back one story and right goes forward one; tapping past
    /// either end closes the modal.
    pub fn tap(&mut self, side: TapSide) -> Option<PlaybackEvent> {
        if self.phase == PlaybackPhase::Idle {
            return None;
        }
        let index = self.state.story_index;
        match side {
            TapSide::Left => match index.checked_sub(1) {
                Some(previous) => self.go_to(previous),
                None => self.close(CloseReason::TappedBeforeFirst),
            },
            TapSide::Right => match self.next_index() {
                Some(next) => self.go_to(next),
                None => self.close(CloseReason::TappedPastLast),
            },
        }
    }

    /// Feed `elapsed` time into the running timer.
    ///
    /// Completing the timer on the last story closes the modal; elsewhere it
    /// moves to the next story. Does nothing unless playing.
    pub fn advance(&mut self, elapsed: Duration) -> Option<PlaybackEvent> {
        if self.phase != PlaybackPhase::Playing {
            return None;
        }
        let timer = self.timer.as_mut()?;
        timer.elapsed = timer.elapsed.saturating_add(elapsed);
        let elapsed = timer.elapsed;

        if elapsed < self.duration {
            self.state.progress = elapsed.div_duration_f64(self.duration).clamp(0.0, 1.0);
            return None;
        }

        self.state.progress = 1.0;
        match self.next_index() {
            Some(next) => self.go_to(next),
            None => self.close(CloseReason::Finished),
        }
    }

    /// Align the current story with an index chosen by the presentation
    /// layer (for example after a swipe). Out-of-range or unchanged indices
    /// are ignored.
    pub fn sync_index(&mut self, index: usize) -> Option<PlaybackEvent> {
        if self.phase == PlaybackPhase::Idle
            || index == self.state.story_index
            || index >= self.reel.len()
        {
            return None;
        }
        self.go_to(index)
    }

    /// Close the modal, cancel the timer and reset to idle.
    pub fn close(&mut self, reason: CloseReason) -> Option<PlaybackEvent> {
        if self.phase == PlaybackPhase::Idle {
            return None;
        }
        self.phase = PlaybackPhase::Idle;
        self.state = PlaybackState::closed();
        self.reel.clear();
        self.timer = None;
        tracing::debug!(reason = ?reason, "Story closed");
        Some(PlaybackEvent::Closed { reason })
    }

    fn next_index(&self) -> Option<usize> {
        self.state
            .story_index
            .checked_add(1)
            .filter(|next| *next < self.reel.len())
    }

    fn go_to(&mut self, index: usize) -> Option<PlaybackEvent> {
        let story_id = self.reel.get(index)?.clone();
        let from = self.state.story_index;
        self.state.story_index = index;
        self.state.current_story_id = Some(story_id);
        self.state.is_paused = false;
        self.phase = PlaybackPhase::Playing;
        self.restart_timer();
        Some(PlaybackEvent::Advanced { from, to: index })
    }

    fn restart_timer(&mut self) {
        self.state.progress = 0.0;
        self.timer = Some(StoryTimer::start());
    }
}

impl Default for StoryPlaybackScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_STORY_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY: Duration = Duration::from_secs(30);

    fn reel(n: usize) -> Vec<PostId> {
        (0..n).map(|i| PostId::from(format!("s{i}"))).collect()
    }

    fn opened(n: usize, at: usize) -> StoryPlaybackScheduler {
        let ids = reel(n);
        let start = ids.get(at).cloned().unwrap_or_else(|| PostId::from("missing"));
        let mut scheduler = StoryPlaybackScheduler::new(STORY);
        scheduler.open(ids, &start);
        scheduler
    }

    fn assert_idle(scheduler: &StoryPlaybackScheduler) {
        assert_eq!(scheduler.phase(), PlaybackPhase::Idle);
        assert_eq!(scheduler.state(), &PlaybackState::closed());
        assert!(!scheduler.is_timer_running());
        assert!(scheduler.reel().is_empty());
    }

    #[test]
    fn open_starts_playing_at_the_story() {
        let scheduler = opened(3, 1);
        assert_eq!(scheduler.phase(), PlaybackPhase::Playing);
        let state = scheduler.state();
        assert!(state.is_modal_visible);
        assert_eq!(state.story_index, 1);
        assert_eq!(state.current_story_id.as_ref().map(PostId::as_str), Some("s1"));
        assert!(scheduler.is_timer_running());
    }

    #[test]
    fn open_outside_the_reel_plays_that_story_alone() {
        let mut scheduler = StoryPlaybackScheduler::new(STORY);
        scheduler.open(reel(3), &PostId::from("elsewhere"));
        assert_eq!(scheduler.reel(), &[PostId::from("elsewhere")]);
        assert_eq!(scheduler.state().story_index, 0);
    }

    #[test]
    fn left_tap_on_first_story_closes() {
        let mut scheduler = opened(3, 0);
        let event = scheduler.tap(TapSide::Left);
        assert_eq!(
            event,
            Some(PlaybackEvent::Closed {
                reason: CloseReason::TappedBeforeFirst
            })
        );
        assert_idle(&scheduler);
    }

    #[test]
    fn two_right_taps_then_expiry_closes() {
        let mut scheduler = opened(3, 0);
        assert_eq!(
            scheduler.tap(TapSide::Right),
            Some(PlaybackEvent::Advanced { from: 0, to: 1 })
        );
        assert_eq!(
            scheduler.tap(TapSide::Right),
            Some(PlaybackEvent::Advanced { from: 1, to: 2 })
        );
        assert_eq!(scheduler.state().story_index, 2);

        let event = scheduler.advance(STORY);
        assert_eq!(
            event,
            Some(PlaybackEvent::Closed {
                reason: CloseReason::Finished
            })
        );
        assert_idle(&scheduler);
    }

    #[test]
    fn right_tap_on_last_story_closes() {
        let mut scheduler = opened(2, 1);
        let event = scheduler.tap(TapSide::Right);
        assert_eq!(
            event,
            Some(PlaybackEvent::Closed {
                reason: CloseReason::TappedPastLast
            })
        );
        assert_idle(&scheduler);
    }

    #[test]
    fn left_tap_goes_back_and_restarts() {
        let mut scheduler = opened(3, 2);
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(
            scheduler.tap(TapSide::Left),
            Some(PlaybackEvent::Advanced { from: 2, to: 1 })
        );
        assert!(scheduler.state().progress.abs() < f64::EPSILON);
    }

    #[test]
    fn timer_completion_moves_forward() {
        let mut scheduler = opened(3, 0);
        assert_eq!(scheduler.advance(Duration::from_secs(29)), None);
        assert_eq!(
            scheduler.advance(Duration::from_secs(1)),
            Some(PlaybackEvent::Advanced { from: 0, to: 1 })
        );
        assert!(scheduler.state().progress.abs() < f64::EPSILON);
        assert_eq!(scheduler.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn progress_is_linear() {
        let mut scheduler = opened(1, 0);
        scheduler.advance(Duration::from_secs(12));
        assert!((scheduler.state().progress - 0.4).abs() < 1e-9);
        scheduler.advance(Duration::from_secs(3));
        assert!((scheduler.state().progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn resume_restarts_from_zero() {
        let mut scheduler = opened(2, 0);
        scheduler.advance(Duration::from_secs(12));
        assert!((scheduler.state().progress - 0.4).abs() < 1e-9);

        assert_eq!(scheduler.press(), Some(PlaybackEvent::Paused));
        assert_eq!(scheduler.phase(), PlaybackPhase::Paused);
        assert!(scheduler.state().is_paused);
        assert!(!scheduler.is_timer_running());
        assert!((scheduler.state().progress - 0.4).abs() < 1e-9);

        // Time passing while paused does nothing.
        assert_eq!(scheduler.advance(Duration::from_secs(60)), None);
        assert_eq!(scheduler.state().story_index, 0);

        assert_eq!(scheduler.release(), Some(PlaybackEvent::Resumed));
        assert_eq!(scheduler.phase(), PlaybackPhase::Playing);
        assert!(!scheduler.state().is_paused);
        assert!(scheduler.state().progress.abs() < f64::EPSILON);
    }

    #[test]
    fn press_and_release_outside_their_phase_are_ignored() {
        let mut scheduler = StoryPlaybackScheduler::default();
        assert_eq!(scheduler.press(), None);
        assert_eq!(scheduler.release(), None);
        assert_eq!(scheduler.tap(TapSide::Right), None);
        assert_eq!(scheduler.advance(STORY), None);

        let mut scheduler = opened(1, 0);
        assert_eq!(scheduler.release(), None);
        scheduler.press();
        assert_eq!(scheduler.press(), None);
    }

    #[test]
    fn sync_index_jumps_within_range() {
        let mut scheduler = opened(4, 0);
        assert_eq!(
            scheduler.sync_index(3),
            Some(PlaybackEvent::Advanced { from: 0, to: 3 })
        );
        assert_eq!(scheduler.sync_index(3), None);
        assert_eq!(scheduler.sync_index(9), None);
        assert_eq!(scheduler.state().story_index, 3);
    }

    #[test]
    fn dismiss_cancels_the_timer() {
        let mut scheduler = opened(2, 0);
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(
            scheduler.close(CloseReason::Dismissed),
            Some(PlaybackEvent::Closed {
                reason: CloseReason::Dismissed
            })
        );
        assert_idle(&scheduler);
        assert_eq!(scheduler.close(CloseReason::Dismissed), None);
    }

    #[test]
    fn reopening_replaces_the_timer() {
        let mut scheduler = opened(3, 0);
        scheduler.advance(Duration::from_secs(20));
        scheduler.open(reel(3), &PostId::from("s2"));
        assert!(scheduler.state().progress.abs() < f64::EPSILON);
        assert_eq!(scheduler.advance(Duration::from_secs(20)), None);
    }
}
