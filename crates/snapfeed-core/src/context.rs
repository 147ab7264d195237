//! The application context: every long-lived component, built once at
//! process start and torn down explicitly on exit.

use std::sync::Arc;

use snapfeed_db::{
    ClearReport, DbError, LocalStore, SeedReport, SqliteConfig, sample_content, seed,
};
use snapfeed_types::{Post, PostId};
use tokio::sync::Mutex;

use crate::compose::PostComposer;
use crate::config::SnapfeedConfig;
use crate::feed::{FeedStore, SharedFeed};
use crate::loader::{FeedLoader, LoadError, LoadReport};
use crate::media::MediaFallbacks;
use crate::playback::PlaybackEvent;
use crate::projector::FeedProjector;
use crate::ticker::StoryTicker;
use crate::write_behind::{WriteBehind, WriterHandle, WriterStats};

/// Owner of the store, feed, loader, composer and write-behind task.
pub struct AppContext {
    config: SnapfeedConfig,
    store: LocalStore,
    feed: SharedFeed,
    loader: FeedLoader,
    composer: PostComposer,
    writer: WriterHandle,
    ticker: Mutex<Option<StoryTicker>>,
}

impl AppContext {
    /// Connect to the store, apply migrations and wire every component.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be opened or migrated.
    pub async fn init(config: SnapfeedConfig) -> Result<Self, DbError> {
        let sqlite = SqliteConfig::new(&config.storage.database_url)
            .with_max_connections(config.storage.max_connections)
            .with_connect_timeout(config.storage.connect_timeout());
        let store = LocalStore::connect(&sqlite).await?;
        store.run_migrations().await?;

        let (write_behind, writer) = WriteBehind::spawn(store.clone());
        let feed = FeedStore::from_config(&config, write_behind.shared()).shared();

        let projector = FeedProjector::new(
            &config.feed.placeholder_avatar,
            MediaFallbacks::from_config(&config.media),
        );
        let loader = FeedLoader::new(store.clone(), projector, Arc::clone(&feed));
        let composer = PostComposer::from_config(store.clone(), Arc::clone(&feed), &config);

        tracing::info!("Application context initialized");
        Ok(Self {
            config,
            store,
            feed,
            loader,
            composer,
            writer,
            ticker: Mutex::new(None),
        })
    }

    /// The loaded configuration.
    pub const fn config(&self) -> &SnapfeedConfig {
        &self.config
    }

    /// The local store.
    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The shared feed store.
    pub const fn feed(&self) -> &SharedFeed {
        &self.feed
    }

    /// The post composer.
    pub const fn composer(&self) -> &PostComposer {
        &self.composer
    }

    /// Insert the sample content if seeding is enabled and the store holds
    /// no posts. Returns `None` when nothing was inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if counting or inserting fails.
    pub async fn seed_if_empty(&self) -> Result<Option<SeedReport>, DbError> {
        if !self.config.seed.enabled {
            return Ok(None);
        }
        if self.store.count::<Post>(None).await? > 0 {
            tracing::debug!("Store already has posts, not seeding");
            return Ok(None);
        }
        seed(&self.store, &sample_content()).await.map(Some)
    }

    /// Run the load pipeline (once per context).
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the pipeline fails.
    pub async fn load_feed(&self) -> Result<LoadReport, LoadError> {
        self.loader.load().await
    }

    /// Destroy all stored posts and users and empty the in-memory feed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store could not be cleared; memory is
    /// left as it was then.
    pub async fn clear_all(&self) -> Result<ClearReport, DbError> {
        let report = self.store.clear_all().await?;
        self.feed.lock().await.set_feed(Vec::new());
        Ok(report)
    }

    /// Open the story viewer on `id` and start its timer.
    ///
    /// Only one story timer runs at a time: a timer left from an earlier
    /// open is stopped first. Returns `None` if `id` is not in the feed.
    pub async fn open_story(&self, id: &PostId) -> Option<PlaybackEvent> {
        let mut ticker = self.ticker.lock().await;
        drop(ticker.take());
        let event = self.feed.lock().await.open_story(id)?;
        *ticker = Some(StoryTicker::spawn(
            Arc::clone(&self.feed),
            self.config.playback.tick_interval(),
        ));
        Some(event)
    }

    /// Dismiss the story viewer and stop its timer.
    pub async fn close_story(&self) -> Option<PlaybackEvent> {
        let mut ticker = self.ticker.lock().await;
        drop(ticker.take());
        self.feed.lock().await.close_story()
    }

    /// Whether a story timer is currently running.
    pub async fn is_story_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    /// Flush pending writes and close the store.
    ///
    /// Any story timer is stopped; queued writes submitted before this call
    /// are still applied.
    pub async fn shutdown(self) -> WriterStats {
        let Self {
            store,
            feed,
            loader,
            composer,
            writer,
            ticker,
            ..
        } = self;
        drop(ticker.into_inner());
        drop(composer);
        drop(loader);
        drop(feed);

        let stats = writer.finish().await;
        store.close().await;
        tracing::info!(
            applied = stats.applied,
            failed = stats.failed,
            "Application context shut down"
        );
        stats
    }
}
