//! Playback session controller.
//!
//! [`PlaybackController`] owns one active session: the loaded player, its
//! periodic observer, the episode ID, the cached favorites set and the pins of
//! the current episode. All state lives on the context that drives the
//! controller. Asynchronous results (favorites gateway completions, player
//! ticks delivered on the player's own thread) are posted to an inbox and
//! only applied when the owner calls [`PlaybackController::run_pending`] or
//! [`PlaybackController::process_next`].
//!
//! ## Session generations
//!
//! Every `configure` (and `shutdown`) advances a session generation. Gateway
//! requests and observer registrations capture the generation they were
//! issued for, and their results are discarded once it is no longer current.
//! Set [`PlaybackConfig::discard_stale_completions`] to `false` to apply late
//! completions unconditionally instead.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::bookmarks::{BookmarkStore, MemoryBookmarkStore, SqliteBookmarkStore, pin_key};
use crate::config::PlaybackConfig;
use crate::errors::{PlaybackError, Result};
use crate::events::PlaybackListener;
use crate::favorites::FavoritesGateway;
use crate::player::{MediaPlayer, ObserverGuard, PlayerLoader};
use crate::time_utils::{MediaTime, SEEK_TIMESCALE, clamp_position, valid_duration};

/// Last progress reported to the listener.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlaybackProgress {
    pub current: f64,
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FavoriteAction {
    Add,
    Remove,
}

impl FavoriteAction {
    fn as_str(&self) -> &'static str {
        match self {
            FavoriteAction::Add => "add",
            FavoriteAction::Remove => "remove",
        }
    }
}

enum SessionMessage {
    Tick {
        generation: u64,
        current: f64,
    },
    FavoritesFetched {
        generation: u64,
        result: anyhow::Result<HashSet<String>>,
    },
    FavoriteToggled {
        generation: u64,
        id: String,
        action: FavoriteAction,
        result: anyhow::Result<()>,
    },
}

/// Builder for [`PlaybackController`].
pub struct PlaybackControllerBuilder {
    config: PlaybackConfig,
    loader: Arc<dyn PlayerLoader>,
    store: Option<Arc<dyn BookmarkStore>>,
    gateway: Option<Arc<dyn FavoritesGateway>>,
    listener: Option<Weak<dyn PlaybackListener>>,
    runtime: Option<Handle>,
}

impl PlaybackControllerBuilder {
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bookmark_store(mut self, store: Arc<dyn BookmarkStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn favorites_gateway(mut self, gateway: Arc<dyn FavoritesGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn listener(mut self, listener: Weak<dyn PlaybackListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Runtime used to run gateway requests. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<PlaybackController> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?,
        };

        let store: Arc<dyn BookmarkStore> = match (self.store, self.config.bookmarks_db.as_ref()) {
            (Some(store), _) => store,
            (None, Some(db_path)) => Arc::new(
                SqliteBookmarkStore::open(db_path)
                    .map_err(|e| PlaybackError::bookmarks(&db_path.display().to_string(), format!("{:#}", e)))?,
            ),
            (None, None) => Arc::new(MemoryBookmarkStore::new()),
        };

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Ok(PlaybackController {
            config: self.config,
            loader: self.loader,
            store,
            gateway: self.gateway,
            listener: self.listener,
            runtime,
            inbox_tx,
            inbox_rx,
            generation: 0,
            player: None,
            observer: None,
            episode_id: None,
            favorite_episodes: HashSet::new(),
            pinned_timestamps: Vec::new(),
            progress: PlaybackProgress::default(),
            is_playing: false,
        })
    }
}

/// Coordinator of one playback session over an opaque media player.
pub struct PlaybackController {
    config: PlaybackConfig,
    loader: Arc<dyn PlayerLoader>,
    store: Arc<dyn BookmarkStore>,
    gateway: Option<Arc<dyn FavoritesGateway>>,
    listener: Option<Weak<dyn PlaybackListener>>,
    runtime: Handle,

    inbox_tx: UnboundedSender<SessionMessage>,
    inbox_rx: UnboundedReceiver<SessionMessage>,
    generation: u64,

    // Swapped together: the observer is always registered on `player`.
    player: Option<Arc<dyn MediaPlayer>>,
    observer: Option<ObserverGuard>,

    episode_id: Option<String>,
    favorite_episodes: HashSet<String>,
    pinned_timestamps: Vec<f64>,
    progress: PlaybackProgress,
    is_playing: bool,
}

impl PlaybackController {
    pub fn builder(loader: Arc<dyn PlayerLoader>) -> PlaybackControllerBuilder {
        PlaybackControllerBuilder {
            config: PlaybackConfig::default(),
            loader,
            store: None,
            gateway: None,
            listener: None,
            runtime: None,
        }
    }

    /// Registers the notification target. The controller only keeps a weak
    /// reference to it.
    pub fn set_listener<L: PlaybackListener + 'static>(&mut self, listener: &Arc<L>) {
        let listener: Arc<dyn PlaybackListener> = listener.clone();
        self.listener = Some(Arc::downgrade(&listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn set_favorites_gateway(&mut self, gateway: Arc<dyn FavoritesGateway>) {
        self.gateway = Some(gateway);
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Loads `source` as the new active item for `episode_id`, replacing the
    /// current session.
    ///
    /// On load failure the previous player is already torn down: the
    /// controller is left without player nor episode, listeners get the
    /// cleared pins, a zero progress and the failure.
    pub fn configure(&mut self, source: &str, episode_id: impl Into<String>) -> Result<()> {
        let episode_id = episode_id.into();

        if let Some(observer) = self.observer.take() {
            observer.release();
        }
        if let Some(player) = self.player.as_ref() {
            player.pause();
        }
        self.generation += 1;

        let player = match self.loader.load(source) {
            Ok(player) => player,
            Err(e) => {
                let error = PlaybackError::load(source, format!("{:#}", e));
                warn!(source, episode_id = %episode_id, error = %error, "Failed to load media source");
                self.player = None;
                self.episode_id = None;
                self.pinned_timestamps.clear();
                self.notify(|l| l.pins_changed(&[]));
                self.emit_progress(0.0, 0.0);
                self.notify(|l| l.playback_failed(&error));
                return Err(error);
            }
        };
        self.player = Some(player.clone());
        self.episode_id = Some(episode_id);
        self.observer = Some(self.register_progress_observer(player));

        info!(
            source,
            episode_id = self.episode_id.as_deref().unwrap_or_default(),
            generation = self.generation,
            "Playback session configured"
        );

        self.load_favorites();
        self.load_pins();

        // Efface la progression de l'épisode précédent avant le premier tick
        self.emit_progress(0.0, 0.0);
        Ok(())
    }

    /// Ends the current session: unregisters the observer, pauses and
    /// releases the player. Pending completions of the session are discarded.
    pub fn shutdown(&mut self) {
        self.release_player();
        self.generation += 1;
        self.episode_id = None;
        self.pinned_timestamps.clear();
        info!(generation = self.generation, "Playback session shut down");
    }

    fn release_player(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.release();
        }
        if let Some(player) = self.player.take() {
            player.pause();
        }
    }

    fn register_progress_observer(&self, player: Arc<dyn MediaPlayer>) -> ObserverGuard {
        let tx = self.inbox_tx.clone();
        let generation = self.generation;
        ObserverGuard::register(
            player,
            self.config.progress_interval(),
            Box::new(move |current| {
                // Le tick arrive sur le thread du lecteur : on le repasse au contexte principal
                let _ = tx.send(SessionMessage::Tick {
                    generation,
                    current,
                });
            }),
        )
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Starts playback. Notifies `is_playing = true` even without a player.
    pub fn play(&mut self) {
        if let Some(player) = self.player.as_ref() {
            player.play();
        }
        self.emit_state(true);
    }

    /// Pauses playback. Notifies `is_playing = false` even without a player.
    pub fn pause(&mut self) {
        if let Some(player) = self.player.as_ref() {
            player.pause();
        }
        self.emit_state(false);
    }

    /// Seeks to `seconds`, truncated to whole seconds.
    pub fn seek(&self, seconds: f64) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        match MediaTime::from_seconds(seconds, SEEK_TIMESCALE) {
            Some(position) => player.seek(position),
            None => warn!(seconds, "Ignoring seek to a non-finite position"),
        }
    }

    /// Sets the playback rate; a non-zero resulting rate notifies playing.
    pub fn set_rate(&mut self, rate: f32) {
        let effective = match self.player.as_ref() {
            Some(player) => {
                player.set_rate(rate);
                player.rate()
            }
            None => rate,
        };
        if effective != 0.0 {
            self.emit_state(true);
        }
    }

    /// Duration of the loaded item in seconds, 0 when unknown.
    pub fn get_duration(&self) -> f64 {
        self.player
            .as_ref()
            .and_then(|player| valid_duration(player.duration()))
            .unwrap_or(0.0)
    }

    /// Live position of the player in seconds, 0 without player.
    pub fn current_time(&self) -> f64 {
        self.player
            .as_ref()
            .map(|player| player.current_time())
            .filter(|t| t.is_finite())
            .unwrap_or(0.0)
    }

    /// Skips forward by the configured interval.
    pub fn skip_forward(&self) {
        self.skip_forward_by(self.config.skip_interval_secs);
    }

    /// Skips backward by the configured interval.
    pub fn skip_backward(&self) {
        self.skip_backward_by(self.config.skip_interval_secs);
    }

    pub fn skip_forward_by(&self, seconds: f64) {
        self.skip_by(seconds);
    }

    pub fn skip_backward_by(&self, seconds: f64) {
        self.skip_by(-seconds);
    }

    fn skip_by(&self, delta: f64) {
        let target = clamp_position(self.current_time() + delta, self.get_duration());
        trace!(delta, target, "Skip");
        self.seek(target);
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    /// Whether the current episode is a favorite; false without episode.
    pub fn is_favorite(&self) -> bool {
        self.episode_id
            .as_ref()
            .is_some_and(|id| self.favorite_episodes.contains(id))
    }

    pub fn favorite_episodes(&self) -> &HashSet<String> {
        &self.favorite_episodes
    }

    /// Requests the full favorites set; the cache is replaced once the
    /// gateway answers.
    pub fn load_favorites(&self) {
        let Some(gateway) = self.gateway.clone() else {
            debug!("No favorites gateway, skipping favorites refresh");
            return;
        };
        let tx = self.inbox_tx.clone();
        let generation = self.generation;
        self.runtime.spawn(async move {
            let result = gateway.fetch_all().await;
            let _ = tx.send(SessionMessage::FavoritesFetched { generation, result });
        });
    }

    /// Adds or removes the current episode from the favorites. The local set
    /// only changes once the gateway confirms.
    pub fn toggle_favorite(&self) {
        let Some(id) = self.episode_id.clone() else {
            return;
        };
        let Some(gateway) = self.gateway.clone() else {
            debug!(episode_id = %id, "No favorites gateway, toggle ignored");
            return;
        };
        let action = if self.favorite_episodes.contains(&id) {
            FavoriteAction::Remove
        } else {
            FavoriteAction::Add
        };

        let tx = self.inbox_tx.clone();
        let generation = self.generation;
        self.runtime.spawn(async move {
            let result = match action {
                FavoriteAction::Add => gateway.add(&id).await,
                FavoriteAction::Remove => gateway.remove(&id).await,
            };
            let _ = tx.send(SessionMessage::FavoriteToggled {
                generation,
                id,
                action,
                result,
            });
        });
    }

    // ------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------

    /// Reloads the current episode's pins from the store.
    pub fn load_pins(&mut self) {
        self.pinned_timestamps = match self.episode_id.as_deref() {
            Some(id) => {
                let key = pin_key(&self.config.pin_key_prefix, id);
                match self.store.get(&key) {
                    Ok(pins) => pins,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to load pins");
                        self.notify(|l| l.playback_failed(&PlaybackError::bookmarks(&key, format!("{:#}", e))));
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };
        self.notify(|l| l.pins_changed(&self.pinned_timestamps));
    }

    /// Pins the live position and persists the whole list. Returns the
    /// pinned offset, or `None` without episode.
    pub fn pin_current_timestamp(&mut self) -> Option<f64> {
        let id = self.episode_id.as_deref()?;
        let key = pin_key(&self.config.pin_key_prefix, id);
        let current = self.current_time();
        self.pinned_timestamps.push(current);

        if let Err(e) = self.store.put(&key, &self.pinned_timestamps) {
            // La liste en mémoire reste la référence pour la session
            warn!(key = %key, error = %e, "Failed to persist pins");
            self.notify(|l| l.playback_failed(&PlaybackError::bookmarks(&key, format!("{:#}", e))));
        }
        debug!(key = %key, at = current, count = self.pinned_timestamps.len(), "Timestamp pinned");

        self.notify(|l| l.pins_changed(&self.pinned_timestamps));
        Some(current)
    }

    pub fn get_pinned_timestamps(&self) -> &[f64] {
        &self.pinned_timestamps
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn episode_id(&self) -> Option<&str> {
        self.episode_id.as_deref()
    }

    pub fn progress(&self) -> PlaybackProgress {
        self.progress
    }

    /// Last playing state notified.
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    // ------------------------------------------------------------------
    // Inbox
    // ------------------------------------------------------------------

    /// Applies every queued completion without waiting. Returns how many
    /// messages were applied.
    pub fn run_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            self.apply(message);
            applied += 1;
        }
        applied
    }

    /// Waits for the next completion and applies it.
    pub async fn process_next(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(message) => {
                self.apply(message);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Tick {
                generation,
                current,
            } => self.on_tick(generation, current),
            SessionMessage::FavoritesFetched { generation, result } => {
                self.on_favorites_fetched(generation, result)
            }
            SessionMessage::FavoriteToggled {
                generation,
                id,
                action,
                result,
            } => self.on_favorite_toggled(generation, id, action, result),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.config.discard_stale_completions || generation == self.generation
    }

    fn on_tick(&mut self, generation: u64, current: f64) {
        if !self.is_current(generation) {
            trace!(generation, current = self.generation, "Discarding tick from a previous session");
            return;
        }
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let Some(duration) = valid_duration(player.duration()) else {
            trace!(current, "Duration unknown, progress suppressed");
            return;
        };
        if !current.is_finite() {
            return;
        }
        self.emit_progress(current, duration);
    }

    fn on_favorites_fetched(&mut self, generation: u64, result: anyhow::Result<HashSet<String>>) {
        if !self.is_current(generation) {
            debug!(generation, current = self.generation, "Discarding stale favorites fetch");
            return;
        }
        match result {
            Ok(favorites) => {
                debug!(count = favorites.len(), "Favorites refreshed");
                self.favorite_episodes = favorites;
                self.notify(|l| l.favorites_changed(&self.favorite_episodes));
            }
            Err(e) => {
                warn!(error = %e, "Favorites fetch failed");
                self.notify(|l| l.playback_failed(&PlaybackError::favorites("fetch", format!("{:#}", e))));
            }
        }
    }

    fn on_favorite_toggled(
        &mut self,
        generation: u64,
        id: String,
        action: FavoriteAction,
        result: anyhow::Result<()>,
    ) {
        if !self.is_current(generation) {
            debug!(episode_id = %id, action = action.as_str(), "Discarding stale favorite completion");
            return;
        }
        if let Err(e) = result {
            warn!(episode_id = %id, action = action.as_str(), error = %e, "Favorite update failed");
            self.notify(|l| {
                l.playback_failed(&PlaybackError::favorites(action.as_str(), format!("{:#}", e)))
            });
            return;
        }
        match action {
            FavoriteAction::Add => {
                self.favorite_episodes.insert(id);
            }
            FavoriteAction::Remove => {
                self.favorite_episodes.remove(&id);
            }
        }
        self.notify(|l| l.favorites_changed(&self.favorite_episodes));
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    fn notify(&self, f: impl FnOnce(&dyn PlaybackListener)) {
        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
            f(listener.as_ref());
        }
    }

    fn emit_progress(&mut self, current: f64, duration: f64) {
        self.progress = PlaybackProgress { current, duration };
        self.notify(|l| l.progress(current, duration));
    }

    fn emit_state(&mut self, is_playing: bool) {
        self.is_playing = is_playing;
        self.notify(|l| l.state_changed(is_playing));
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.release_player();
    }
}
