//! # pmoplayback
//!
//! Playback session coordination for PMOMusic episode players.
//!
//! The crate sits on top of a platform media player and provides a single
//! controller that:
//! - wraps transport controls (play, pause, seek, rate, skip),
//! - tracks favorite status of the current episode through an asynchronous
//!   favorites back-end,
//! - keeps per-episode bookmark ("pin") timestamps in a key/value store,
//! - republishes periodic progress to a listener.
//!
//! ## Architecture
//!
//! - **[`PlaybackController`]**: owns the active session and all its state
//! - **[`MediaPlayer`] / [`PlayerLoader`]**: opaque player adapter
//! - **[`FavoritesGateway`]**: async favorites back-end
//! - **[`BookmarkStore`]**: pin persistence (memory or SQLite)
//! - **[`PlaybackListener`]**: notification target, e.g. [`PlaybackEventBus`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pmoplayback::{PlaybackController, PlaybackEventBus, InMemoryFavorites};
//!
//! let bus = Arc::new(PlaybackEventBus::new());
//! let events = bus.subscribe();
//!
//! let mut controller = PlaybackController::builder(loader)
//!     .favorites_gateway(Arc::new(InMemoryFavorites::new()))
//!     .build()?;
//! controller.set_listener(&bus);
//!
//! controller.configure("https://example.org/episode-42.mp3", "42")?;
//! controller.play();
//!
//! // Sur le contexte principal : appliquer les ticks et les réponses du back-end
//! while controller.process_next().await {}
//! ```

pub mod bookmarks;
pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod favorites;
pub mod player;
pub mod time_utils;

pub use bookmarks::{BookmarkStore, MemoryBookmarkStore, SqliteBookmarkStore, pin_key};
pub use config::PlaybackConfig;
pub use controller::{PlaybackController, PlaybackControllerBuilder, PlaybackProgress};
pub use errors::{PlaybackError, Result};
pub use events::{PlaybackEvent, PlaybackEventBus, PlaybackListener};
pub use favorites::{FavoritesGateway, InMemoryFavorites};
pub use player::{MediaPlayer, ObserverGuard, ObserverToken, PlayerLoader, TimeCallback};
pub use time_utils::MediaTime;
