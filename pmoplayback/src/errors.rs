use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    // Le lecteur n'a pas pu charger la source demandée
    #[error("Cannot load media source {source_uri}: {reason}")]
    Load { source_uri: String, reason: String },
    #[error("Favorites gateway {operation} failed: {reason}")]
    Favorites { operation: String, reason: String },
    #[error("Bookmark store error on key {key}: {reason}")]
    Bookmarks { key: String, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("PlaybackController requires a running tokio runtime")]
    NoRuntime,
}

impl PlaybackError {
    pub fn load(source_uri: &str, reason: impl std::fmt::Display) -> Self {
        PlaybackError::Load {
            source_uri: source_uri.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn favorites(operation: &str, reason: impl std::fmt::Display) -> Self {
        PlaybackError::Favorites {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn bookmarks(key: &str, reason: impl std::fmt::Display) -> Self {
        PlaybackError::Bookmarks {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for playback session operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
