#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use pmoplayback::{
    BookmarkStore, FavoritesGateway, MediaPlayer, MediaTime, ObserverToken, PlaybackController,
    PlaybackEvent, PlaybackEventBus, PlayerLoader, TimeCallback,
};
use tokio::sync::Semaphore;

/// Player double driven by the test.
pub struct MockPlayer {
    pub source: String,
    state: Mutex<PlayerState>,
    observers: Mutex<HashMap<u64, TimeCallback>>,
    removed: Mutex<Vec<u64>>,
}

#[derive(Default)]
struct PlayerState {
    playing: bool,
    rate: f32,
    position: f64,
    duration: Option<f64>,
    seeks: Vec<MediaTime>,
    next_token: u64,
    pause_calls: usize,
}

impl MockPlayer {
    fn new(source: &str, first_token: u64) -> Self {
        Self {
            source: source.to_string(),
            state: Mutex::new(PlayerState {
                next_token: first_token,
                ..Default::default()
            }),
            observers: Mutex::new(HashMap::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_position(&self, seconds: f64) {
        self.state.lock().position = seconds;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.state.lock().duration = duration;
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pause_calls
    }

    pub fn seeks(&self) -> Vec<MediaTime> {
        self.state.lock().seeks.clone()
    }

    pub fn last_seek(&self) -> Option<f64> {
        self.state.lock().seeks.last().map(MediaTime::seconds)
    }

    pub fn live_tokens(&self) -> Vec<u64> {
        let mut tokens: Vec<u64> = self.observers.lock().keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    pub fn removed_tokens(&self) -> Vec<u64> {
        self.removed.lock().clone()
    }

    /// Delivers a periodic tick at the current position to every observer.
    pub fn tick(&self) {
        let position = self.state.lock().position;
        for callback in self.observers.lock().values() {
            callback(position);
        }
    }

    /// Delivers a tick from another thread, like a real player would.
    pub fn tick_from_thread(self: &Arc<Self>) {
        let player = self.clone();
        std::thread::spawn(move || player.tick())
            .join()
            .expect("tick thread panicked");
    }
}

impl MediaPlayer for MockPlayer {
    fn play(&self) {
        let mut state = self.state.lock();
        state.playing = true;
        state.rate = 1.0;
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.rate = 0.0;
        state.pause_calls += 1;
    }

    fn seek(&self, position: MediaTime) {
        let mut state = self.state.lock();
        state.position = position.seconds();
        state.seeks.push(position);
    }

    fn set_rate(&self, rate: f32) {
        let mut state = self.state.lock();
        state.rate = rate;
        state.playing = rate != 0.0;
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn add_periodic_observer(&self, _interval: Duration, callback: TimeCallback) -> ObserverToken {
        let token = {
            let mut state = self.state.lock();
            state.next_token += 1;
            state.next_token
        };
        self.observers.lock().insert(token, callback);
        ObserverToken(token)
    }

    fn remove_observer(&self, token: ObserverToken) {
        self.observers.lock().remove(&token.0);
        self.removed.lock().push(token.0);
    }
}

/// Loader recording every player it builds. Sources starting with `bad://`
/// fail to load.
#[derive(Default)]
pub struct MockLoader {
    players: Mutex<Vec<Arc<MockPlayer>>>,
}

impl MockLoader {
    pub fn players(&self) -> Vec<Arc<MockPlayer>> {
        self.players.lock().clone()
    }

    pub fn last(&self) -> Arc<MockPlayer> {
        self.players
            .lock()
            .last()
            .cloned()
            .expect("no player loaded yet")
    }
}

impl PlayerLoader for MockLoader {
    fn load(&self, source: &str) -> Result<Arc<dyn MediaPlayer>> {
        if source.starts_with("bad://") {
            return Err(anyhow!("unreachable source"));
        }
        let mut players = self.players.lock();
        // Token ranges per player make cross-player mixups visible
        let player = Arc::new(MockPlayer::new(source, players.len() as u64 * 100));
        players.push(player.clone());
        Ok(player)
    }
}

/// Favorites gateway whose calls wait for a permit when gated.
pub struct ScriptedGateway {
    ids: Mutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
    fail: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
            gate: None,
            fail: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call blocks until `release` hands out a permit.
    pub fn gated(ids: &[&str]) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(ids)
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = self.gate.as_ref() {
            gate.add_permits(calls);
        }
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn set_ids(&self, ids: &[&str]) {
        *self.ids.lock() = ids.iter().map(|id| id.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn wait(&self) {
        if let Some(gate) = self.gate.as_ref() {
            gate.acquire().await.expect("gate closed").forget();
        }
    }

    fn check(&self) -> Result<()> {
        if *self.fail.lock() {
            Err(anyhow!("backend unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FavoritesGateway for ScriptedGateway {
    async fn fetch_all(&self) -> Result<HashSet<String>> {
        self.calls.lock().push("fetch".to_string());
        // Snapshot taken at request time, answered later
        let snapshot = self.ids.lock().clone();
        self.wait().await;
        self.check()?;
        Ok(snapshot)
    }

    async fn add(&self, id: &str) -> Result<()> {
        self.calls.lock().push(format!("add:{}", id));
        self.wait().await;
        self.check()?;
        self.ids.lock().insert(id.to_string());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.calls.lock().push(format!("remove:{}", id));
        self.wait().await;
        self.check()?;
        self.ids.lock().remove(id);
        Ok(())
    }
}

/// Store failing every write.
#[derive(Default)]
pub struct ReadOnlyStore;

impl BookmarkStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn put(&self, key: &str, _pins: &[f64]) -> Result<()> {
        Err(anyhow!("read-only store, cannot write {}", key))
    }
}

pub struct Harness {
    pub controller: PlaybackController,
    pub loader: Arc<MockLoader>,
    pub bus: Arc<PlaybackEventBus>,
    pub events: Receiver<PlaybackEvent>,
}

impl Harness {
    pub fn drain(&self) -> Vec<PlaybackEvent> {
        self.events.try_iter().collect()
    }
}

pub fn harness(
    configure: impl FnOnce(pmoplayback::PlaybackControllerBuilder) -> pmoplayback::PlaybackControllerBuilder,
) -> Harness {
    let loader = Arc::new(MockLoader::default());
    let bus = Arc::new(PlaybackEventBus::new());
    let events = bus.subscribe();

    let builder = PlaybackController::builder(loader.clone());
    let mut controller = configure(builder).build().expect("controller builds");
    controller.set_listener(&bus);

    Harness {
        controller,
        loader,
        bus,
        events,
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
