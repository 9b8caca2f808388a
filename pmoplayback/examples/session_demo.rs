//! Example: drive a playback session over a simulated player
//!
//! Run with: cargo run -p pmoplayback --example session_demo
//! Pins are kept in a SQLite database under the system temp directory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pmoplayback::time_utils::format_hhmmss_f64;
use pmoplayback::{
    InMemoryFavorites, MediaPlayer, MediaTime, ObserverToken, PlaybackConfig, PlaybackController,
    PlaybackError, PlaybackListener, PlayerLoader, SqliteBookmarkStore, TimeCallback,
};
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct SimulatedState {
    rate: f32,
    position: f64,
    next_token: u64,
    observers: HashMap<u64, Arc<AtomicBool>>,
}

/// Player advancing its clock on a background thread.
struct SimulatedPlayer {
    duration: f64,
    state: Arc<Mutex<SimulatedState>>,
}

impl MediaPlayer for SimulatedPlayer {
    fn play(&self) {
        self.state.lock().rate = 1.0;
    }

    fn pause(&self) {
        self.state.lock().rate = 0.0;
    }

    fn seek(&self, position: MediaTime) {
        self.state.lock().position = position.seconds().min(self.duration);
    }

    fn set_rate(&self, rate: f32) {
        self.state.lock().rate = rate;
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }

    fn add_periodic_observer(&self, interval: Duration, callback: TimeCallback) -> ObserverToken {
        let stop = Arc::new(AtomicBool::new(false));
        let token = {
            let mut state = self.state.lock();
            state.next_token += 1;
            let token = state.next_token;
            state.observers.insert(token, stop.clone());
            token
        };

        let state = self.state.clone();
        let duration = self.duration;
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(interval);
                let position = {
                    let mut state = state.lock();
                    let step = interval.as_secs_f64() * state.rate as f64;
                    state.position = (state.position + step).min(duration);
                    state.position
                };
                if !stop.load(Ordering::SeqCst) {
                    callback(position);
                }
            }
        });

        ObserverToken(token)
    }

    fn remove_observer(&self, token: ObserverToken) {
        if let Some(stop) = self.state.lock().observers.remove(&token.0) {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

struct SimulatedLoader;

impl PlayerLoader for SimulatedLoader {
    fn load(&self, source: &str) -> anyhow::Result<Arc<dyn MediaPlayer>> {
        if !source.starts_with("https://") {
            anyhow::bail!("unsupported source {}", source);
        }
        Ok(Arc::new(SimulatedPlayer {
            duration: 3600.0,
            state: Arc::new(Mutex::new(SimulatedState::default())),
        }))
    }
}

struct ConsoleListener;

impl PlaybackListener for ConsoleListener {
    fn progress(&self, current: f64, duration: f64) {
        println!(
            "  progress {} / {}",
            format_hhmmss_f64(current),
            format_hhmmss_f64(duration)
        );
    }

    fn state_changed(&self, is_playing: bool) {
        println!("  {}", if is_playing { "playing" } else { "paused" });
    }

    fn favorites_changed(&self, favorites: &HashSet<String>) {
        let mut ids: Vec<_> = favorites.iter().collect();
        ids.sort();
        println!("  favorites: {:?}", ids);
    }

    fn pins_changed(&self, pins: &[f64]) {
        let pins: Vec<_> = pins.iter().map(|p| format_hhmmss_f64(*p)).collect();
        println!("  pins: {:?}", pins);
    }

    fn playback_failed(&self, error: &PlaybackError) {
        println!("  error: {}", error);
    }
}

/// Applies completions for `period`, then returns.
async fn pump(controller: &mut PlaybackController, period: Duration) {
    let _ = tokio::time::timeout(period, async {
        while controller.process_next().await {}
    })
    .await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db_path = std::env::temp_dir().join("pmoplayback-demo").join("bookmarks.db");
    let config = PlaybackConfig {
        progress_interval_ms: 250,
        ..Default::default()
    };

    let listener = Arc::new(ConsoleListener);
    let favorites = Arc::new(InMemoryFavorites::with_ids(["episode-7"]));
    let mut controller = PlaybackController::builder(Arc::new(SimulatedLoader))
        .config(config)
        .bookmark_store(Arc::new(SqliteBookmarkStore::open(&db_path)?))
        .favorites_gateway(favorites.clone())
        .build()?;
    controller.set_listener(&listener);

    println!("Configuring episode-42 (pins in {})", db_path.display());
    controller.configure("https://example.org/episode-42.mp3", "episode-42")?;
    controller.play();
    pump(&mut controller, Duration::from_secs(1)).await;

    println!("Skipping forward and pinning");
    controller.skip_forward();
    controller.pin_current_timestamp();
    controller.toggle_favorite();
    pump(&mut controller, Duration::from_millis(600)).await;

    println!("Rate x2");
    controller.set_rate(2.0);
    pump(&mut controller, Duration::from_millis(600)).await;

    println!("Loading an invalid source");
    if let Err(e) = controller.configure("ftp://example.org/broken.mp3", "episode-0") {
        println!("  configure failed: {}", e);
    }

    println!("Back to episode-7");
    controller.configure("https://example.org/episode-7.mp3", "episode-7")?;
    controller.seek(1800.0);
    controller.play();
    pump(&mut controller, Duration::from_millis(600)).await;
    println!("  favorite: {}", controller.is_favorite());

    controller.shutdown();
    println!("Favorites in back-end: {:?}", favorites.snapshot());
    Ok(())
}
