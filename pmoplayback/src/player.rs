//! Media player adapter traits.
//!
//! The decoding/rendering engine is opaque to this crate: it is reached
//! through [`PlayerLoader`] (build a player for a source) and [`MediaPlayer`]
//! (transport primitives and periodic time observation).
//!
//! A periodic observer registration is represented by an [`ObserverGuard`],
//! which keeps the player it was registered on and unregisters itself when
//! released or dropped. The token can therefore never outlive its player.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::time_utils::MediaTime;

/// Callback invoked by a player with its current time in seconds.
///
/// Players call it from whatever thread they own; implementations must not
/// assume the caller's context.
pub type TimeCallback = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// Identifier of a periodic observer registration on a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

/// Transport and observation primitives of a loaded player.
pub trait MediaPlayer: Send + Sync {
    fn play(&self);

    fn pause(&self);

    fn seek(&self, position: MediaTime);

    fn set_rate(&self, rate: f32);

    /// Current playback rate, 0 when paused.
    fn rate(&self) -> f32;

    /// Current position in seconds.
    fn current_time(&self) -> f64;

    /// Duration of the loaded item in seconds, `None` while unknown.
    fn duration(&self) -> Option<f64>;

    fn add_periodic_observer(&self, interval: Duration, callback: TimeCallback) -> ObserverToken;

    fn remove_observer(&self, token: ObserverToken);
}

/// Builds a player bound to a media source.
pub trait PlayerLoader: Send + Sync {
    /// Loads `source`, failing if it is unreachable or malformed.
    fn load(&self, source: &str) -> Result<Arc<dyn MediaPlayer>>;
}

/// Live periodic observer registration.
///
/// Dropping the guard unregisters the observer from the player it was
/// registered on.
pub struct ObserverGuard {
    player: Arc<dyn MediaPlayer>,
    token: Option<ObserverToken>,
}

impl ObserverGuard {
    /// Registers `callback` on `player` every `interval`.
    pub fn register(
        player: Arc<dyn MediaPlayer>,
        interval: Duration,
        callback: TimeCallback,
    ) -> Self {
        let token = player.add_periodic_observer(interval, callback);
        debug!(token = token.0, ?interval, "Periodic observer registered");
        Self {
            player,
            token: Some(token),
        }
    }

    pub fn token(&self) -> Option<ObserverToken> {
        self.token
    }

    /// Unregisters the observer now.
    pub fn release(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if let Some(token) = self.token.take() {
            self.player.remove_observer(token);
            debug!(token = token.0, "Periodic observer unregistered");
        }
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl fmt::Debug for ObserverGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverGuard")
            .field("token", &self.token)
            .finish()
    }
}
