//! In-memory catalog used by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Genre, MediaItem, MediaType, SearchResultPage, TimeWindow};
use crate::tmdb::{CatalogApi, DetailSection, MediaDetails};

pub(crate) fn media(id: u64, media_type: MediaType, title: &str) -> MediaItem {
    MediaItem {
        id,
        media_type,
        title: title.to_string(),
        release_date: None,
        poster_path: Some(format!("/{}-{}.jpg", media_type, id)),
        overview: String::new(),
        vote_average: 0.0,
        genre_ids: Vec::new(),
        popularity: 0.0,
    }
}

pub(crate) fn page_of(items: Vec<MediaItem>) -> SearchResultPage {
    SearchResultPage {
        total_pages: 1,
        current_page: 1,
        total_results: items.len() as u32,
        results: items,
    }
}

/// Responses are keyed by call, e.g. `popular:movie:1` or `search:dune:1`.
/// Unknown list keys answer with an empty page.
#[derive(Default)]
pub(crate) struct FakeCatalog {
    pages: HashMap<String, SearchResultPage>,
    delays: HashMap<String, Duration>,
    genres: HashMap<MediaType, Vec<Genre>>,
    details: HashMap<(MediaType, u64), MediaDetails>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, key: &str, page: SearchResultPage) -> Self {
        self.pages.insert(key.to_string(), page);
        self
    }

    pub(crate) fn with_search(self, query: &str, items: Vec<MediaItem>) -> Self {
        self.with_page(&format!("search:{}:1", query), page_of(items))
    }

    pub(crate) fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub(crate) fn with_genres(mut self, media_type: MediaType, genres: &[(u32, &str)]) -> Self {
        self.genres.insert(
            media_type,
            genres
                .iter()
                .map(|(id, name)| Genre {
                    id: *id,
                    name: name.to_string(),
                })
                .collect(),
        );
        self
    }

    pub(crate) fn with_details(mut self, details: MediaDetails) -> Self {
        self.details
            .insert((details.item.media_type, details.item.id), details);
        self
    }

    pub(crate) fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, key: &str) -> CatalogResult<()> {
        self.calls.lock().unwrap().push(key.to_string());
        if self.failing.contains(key) {
            return Err(CatalogError::Upstream {
                status: 500,
                message: format!("{} failed", key),
            });
        }
        Ok(())
    }

    fn list(&self, key: String, page: u32) -> CatalogResult<SearchResultPage> {
        self.record(&key)?;
        Ok(self
            .pages
            .get(&key)
            .cloned()
            .unwrap_or_else(|| SearchResultPage::empty(page)))
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn trending(
        &self,
        media_type: MediaType,
        window: TimeWindow,
        page: u32,
    ) -> CatalogResult<SearchResultPage> {
        self.list(format!("trending:{}:{}:{}", media_type, window.as_str(), page), page)
    }

    async fn popular(&self, media_type: MediaType, page: u32) -> CatalogResult<SearchResultPage> {
        self.list(format!("popular:{}:{}", media_type, page), page)
    }

    async fn details(
        &self,
        media_type: MediaType,
        id: u64,
        _append: &[DetailSection],
    ) -> CatalogResult<MediaDetails> {
        self.record(&format!("details:{}:{}", media_type, id))?;
        self.details
            .get(&(media_type, id))
            .cloned()
            .ok_or_else(|| CatalogError::Upstream {
                status: 404,
                message: "The resource you requested could not be found.".to_string(),
            })
    }

    async fn search(&self, query: &str, page: u32) -> CatalogResult<SearchResultPage> {
        let key = format!("search:{}:{}", query, page);
        if let Some(delay) = self.delays.get(query) {
            self.calls.lock().unwrap().push(key.clone());
            tokio::time::sleep(*delay).await;
            return self
                .pages
                .get(&key)
                .cloned()
                .ok_or(CatalogError::Timeout);
        }
        self.list(key, page)
    }

    async fn discover(
        &self,
        media_type: MediaType,
        genre_id: u32,
        page: u32,
    ) -> CatalogResult<SearchResultPage> {
        self.list(format!("discover:{}:{}:{}", media_type, genre_id, page), page)
    }

    async fn genre_list(&self, media_type: MediaType) -> CatalogResult<Vec<Genre>> {
        self.record(&format!("genres:{}", media_type))?;
        Ok(self.genres.get(&media_type).cloned().unwrap_or_default())
    }
}
