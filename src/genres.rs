use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult, GenreNotFound, ResolveError};
use crate::models::{Genre, MediaType};
use crate::tmdb::CatalogApi;

/// id -> name lookup for one media type. Ordered by id so name resolution is
/// deterministic when two ids share a name modulo case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GenreMap(BTreeMap<u32, String>);

impl GenreMap {
    pub fn from_genres(genres: impl IntoIterator<Item = Genre>) -> Self {
        Self(genres.into_iter().map(|g| (g.id, g.name)).collect())
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    /// Names for `ids`, skipping ids the map does not know.
    pub fn names(&self, ids: &[u32]) -> Vec<&str> {
        ids.iter().filter_map(|id| self.name(*id)).collect()
    }

    /// Case-insensitive exact match on the genre name.
    pub fn find(&self, name: &str) -> Option<u32> {
        let wanted = name.to_lowercase();
        self.0
            .iter()
            .find(|(_, n)| n.to_lowercase() == wanted)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Process-lifetime memo of genre maps, one slot per media type. A failed fetch
/// leaves the slot empty so the next caller retries.
#[derive(Debug, Default)]
pub struct GenreCache {
    movie: OnceCell<Arc<GenreMap>>,
    tv: OnceCell<Arc<GenreMap>>,
}

impl GenreCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, media_type: MediaType) -> &OnceCell<Arc<GenreMap>> {
        match media_type {
            MediaType::Movie => &self.movie,
            MediaType::Tv => &self.tv,
        }
    }

    pub fn cached(&self, media_type: MediaType) -> Option<Arc<GenreMap>> {
        self.slot(media_type).get().cloned()
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        media_type: MediaType,
        fetch: F,
    ) -> CatalogResult<Arc<GenreMap>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<Vec<Genre>>>,
    {
        self.slot(media_type)
            .get_or_try_init(move || async move {
                let genres = fetch().await?;
                debug!(media_type = %media_type, count = genres.len(), "Cached genre map");
                Ok::<_, CatalogError>(Arc::new(GenreMap::from_genres(genres)))
            })
            .await
            .cloned()
    }
}

/// Maps a human-readable genre name to the catalog id for `media_type`.
pub async fn resolve_genre_id(
    catalog: &dyn CatalogApi,
    media_type: MediaType,
    genre_name: &str,
) -> Result<u32, ResolveError> {
    let map = catalog.genre_map(media_type).await?;
    map.find(genre_name).ok_or_else(|| {
        ResolveError::NotFound(GenreNotFound {
            media_type,
            name: genre_name.to_string(),
        })
    })
}
