//! Favorites back-end abstraction.
//!
//! The controller only talks to favorites through [`FavoritesGateway`]; the
//! back-end may be remote or local. [`InMemoryFavorites`] is the local
//! variant.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Asynchronous favorites back-end.
#[async_trait]
pub trait FavoritesGateway: Send + Sync {
    /// Returns the complete set of favorite episode IDs.
    async fn fetch_all(&self) -> Result<HashSet<String>>;

    /// Marks `id` as favorite.
    async fn add(&self, id: &str) -> Result<()>;

    /// Removes `id` from the favorites.
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Process-local favorites back-end.
#[derive(Debug, Default)]
pub struct InMemoryFavorites {
    ids: RwLock<HashSet<String>>,
}

impl InMemoryFavorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a back-end already holding `ids`.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: RwLock::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.read().contains(id)
    }

    pub fn snapshot(&self) -> HashSet<String> {
        self.ids.read().clone()
    }
}

#[async_trait]
impl FavoritesGateway for InMemoryFavorites {
    async fn fetch_all(&self) -> Result<HashSet<String>> {
        Ok(self.snapshot())
    }

    async fn add(&self, id: &str) -> Result<()> {
        self.ids.write().insert(id.to_string());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.ids.write().remove(id);
        Ok(())
    }
}
