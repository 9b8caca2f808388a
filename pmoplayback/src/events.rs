use std::collections::HashSet;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::errors::PlaybackError;

/// Receiver of the controller's notifications.
///
/// Every call happens on the context that drives the controller.
pub trait PlaybackListener: Send + Sync {
    fn progress(&self, current: f64, duration: f64);

    fn state_changed(&self, is_playing: bool);

    fn favorites_changed(&self, favorites: &HashSet<String>);

    fn pins_changed(&self, pins: &[f64]);

    /// A collaborator failed; the controller state was left untouched.
    fn playback_failed(&self, _error: &PlaybackError) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    Progress { current: f64, duration: f64 },
    StateChanged { is_playing: bool },
    FavoritesChanged { favorites: HashSet<String> },
    PinsChanged { pins: Vec<f64> },
    Failed { message: String },
}

/// Listener fanning notifications out to channel subscribers.
#[derive(Clone, Default)]
pub struct PlaybackEventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlaybackEvent>>>>,
}

impl PlaybackEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = unbounded::<PlaybackEvent>();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub(crate) fn broadcast(&self, event: PlaybackEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl PlaybackListener for PlaybackEventBus {
    fn progress(&self, current: f64, duration: f64) {
        self.broadcast(PlaybackEvent::Progress { current, duration });
    }

    fn state_changed(&self, is_playing: bool) {
        self.broadcast(PlaybackEvent::StateChanged { is_playing });
    }

    fn favorites_changed(&self, favorites: &HashSet<String>) {
        self.broadcast(PlaybackEvent::FavoritesChanged {
            favorites: favorites.clone(),
        });
    }

    fn pins_changed(&self, pins: &[f64]) {
        self.broadcast(PlaybackEvent::PinsChanged {
            pins: pins.to_vec(),
        });
    }

    fn playback_failed(&self, error: &PlaybackError) {
        self.broadcast(PlaybackEvent::Failed {
            message: error.to_string(),
        });
    }
}
