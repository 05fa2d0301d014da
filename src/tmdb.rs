use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::genres::{GenreCache, GenreMap};
use crate::models::{Genre, MediaItem, MediaType, SearchResultPage, TimeWindow};

/// Sections the details endpoint can inline via `append_to_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailSection {
    Videos,
    ReleaseDates,
    ContentRatings,
}

impl DetailSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailSection::Videos => "videos",
            DetailSection::ReleaseDates => "release_dates",
            DetailSection::ContentRatings => "content_ratings",
        }
    }

    /// The sections a detail page needs for `media_type`.
    pub fn for_detail_page(media_type: MediaType) -> &'static [DetailSection] {
        match media_type {
            MediaType::Movie => &[DetailSection::Videos, DetailSection::ReleaseDates],
            MediaType::Tv => &[DetailSection::Videos, DetailSection::ContentRatings],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDetails {
    #[serde(flatten)]
    pub item: MediaItem,
    pub genres: Vec<Genre>,
    pub tagline: Option<String>,
    pub status: Option<String>,
    pub homepage: Option<String>,
    pub backdrop_path: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub number_of_seasons: Option<u32>,
    pub number_of_episodes: Option<u32>,
    /// YouTube key of the first official trailer.
    pub trailer_key: Option<String>,
    /// US certification (movies) or US content rating (shows).
    pub certification: Option<String>,
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn trending(
        &self,
        media_type: MediaType,
        window: TimeWindow,
        page: u32,
    ) -> CatalogResult<SearchResultPage>;
    async fn popular(&self, media_type: MediaType, page: u32) -> CatalogResult<SearchResultPage>;
    async fn details(
        &self,
        media_type: MediaType,
        id: u64,
        append: &[DetailSection],
    ) -> CatalogResult<MediaDetails>;
    /// Multi-search. Results other than movies and shows are dropped.
    async fn search(&self, query: &str, page: u32) -> CatalogResult<SearchResultPage>;
    async fn discover(
        &self,
        media_type: MediaType,
        genre_id: u32,
        page: u32,
    ) -> CatalogResult<SearchResultPage>;
    async fn genre_list(&self, media_type: MediaType) -> CatalogResult<Vec<Genre>>;

    /// Genre map for `media_type`. Implementations backed by the network should
    /// memoize; the default simply converts `genre_list`.
    async fn genre_map(&self, media_type: MediaType) -> CatalogResult<Arc<GenreMap>> {
        let genres = self.genre_list(media_type).await?;
        Ok(Arc::new(GenreMap::from_genres(genres)))
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    language: String,
    genres: Arc<GenreCache>,
}

impl TmdbClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let user_agent = format!("movista/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(config.request_timeout())
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: config.tmdb_api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.tmdb_base_url.trim_end_matches('/').to_string(),
            language: config.tmdb_language.clone(),
            genres: Arc::new(GenreCache::new()),
        })
    }

    /// Shares a genre cache with other clients, or hands in a fresh one.
    pub fn with_genre_cache(mut self, genres: Arc<GenreCache>) -> Self {
        self.genres = genres;
        self
    }

    pub fn genre_cache(&self) -> &Arc<GenreCache> {
        &self.genres
    }

    fn url(&self, endpoint: &str, params: &[(&str, String)]) -> CatalogResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CatalogError::MissingCredential)?;
        let mut url = format!(
            "{}/{}?api_key={}&language={}",
            self.base_url,
            endpoint,
            urlencoding::encode(api_key),
            urlencoding::encode(&self.language)
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> CatalogResult<T> {
        let url = self.url(endpoint, params)?;
        debug!(endpoint = %endpoint, "TMDB request");
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            let message = upstream_message(&text);
            warn!(
                endpoint = %endpoint,
                status = status.as_u16(),
                "TMDB API error: {}",
                message
            );
            return Err(CatalogError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn list(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        media_type: Option<MediaType>,
    ) -> CatalogResult<SearchResultPage> {
        let raw: RawPage = self.get_json(endpoint, params).await?;
        Ok(raw.normalize(media_type))
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn trending(
        &self,
        media_type: MediaType,
        window: TimeWindow,
        page: u32,
    ) -> CatalogResult<SearchResultPage> {
        let endpoint = format!("trending/{}/{}", media_type, window.as_str());
        self.list(&endpoint, &[("page", page.to_string())], Some(media_type))
            .await
    }

    async fn popular(&self, media_type: MediaType, page: u32) -> CatalogResult<SearchResultPage> {
        let endpoint = format!("{}/popular", media_type);
        self.list(&endpoint, &[("page", page.to_string())], Some(media_type))
            .await
    }

    async fn details(
        &self,
        media_type: MediaType,
        id: u64,
        append: &[DetailSection],
    ) -> CatalogResult<MediaDetails> {
        let endpoint = format!("{}/{}", media_type, id);
        let mut params = Vec::new();
        if !append.is_empty() {
            let sections = append
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("append_to_response", sections));
        }
        let raw: RawDetails = self.get_json(&endpoint, &params).await?;
        raw.normalize(media_type)
            .ok_or_else(|| CatalogError::Upstream {
                status: 404,
                message: format!("{} {} has no usable details", media_type, id),
            })
    }

    async fn search(&self, query: &str, page: u32) -> CatalogResult<SearchResultPage> {
        let params = [
            ("query", query.to_string()),
            ("page", page.to_string()),
            ("include_adult", "false".to_string()),
        ];
        self.list("search/multi", &params, None).await
    }

    async fn discover(
        &self,
        media_type: MediaType,
        genre_id: u32,
        page: u32,
    ) -> CatalogResult<SearchResultPage> {
        let endpoint = format!("discover/{}", media_type);
        let params = [
            ("with_genres", genre_id.to_string()),
            ("page", page.to_string()),
            ("sort_by", "popularity.desc".to_string()),
        ];
        self.list(&endpoint, &params, Some(media_type)).await
    }

    async fn genre_list(&self, media_type: MediaType) -> CatalogResult<Vec<Genre>> {
        #[derive(Deserialize)]
        struct GenreResponse {
            genres: Vec<Genre>,
        }

        let endpoint = format!("genre/{}/list", media_type);
        let data: GenreResponse = self.get_json(&endpoint, &[]).await?;
        Ok(data.genres)
    }

    async fn genre_map(&self, media_type: MediaType) -> CatalogResult<Arc<GenreMap>> {
        self.genres
            .get_or_fetch(media_type, || self.genre_list(media_type))
            .await
    }
}

fn upstream_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        status_message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.status_message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
    #[serde(default)]
    genre_ids: Vec<u32>,
    popularity: Option<f64>,
    media_type: Option<String>,
}

impl RawMedia {
    /// `fallback` tags items from single-type endpoints, which omit `media_type`.
    fn normalize(self, fallback: Option<MediaType>) -> Option<MediaItem> {
        let media_type = match self.media_type.as_deref() {
            Some(raw) => raw.parse().ok()?,
            None => fallback?,
        };
        let title = self.title.or(self.name).unwrap_or_default();
        let release_date = self
            .release_date
            .or(self.first_air_date)
            .filter(|d| !d.trim().is_empty());
        Some(MediaItem {
            id: self.id,
            media_type,
            title,
            release_date,
            poster_path: self.poster_path.filter(|p| !p.is_empty()),
            overview: self.overview.unwrap_or_default(),
            vote_average: self.vote_average.unwrap_or(0.0),
            genre_ids: self.genre_ids,
            popularity: self.popularity.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    results: Vec<RawMedia>,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    total_results: u32,
}

fn first_page() -> u32 {
    1
}

impl RawPage {
    fn normalize(self, media_type: Option<MediaType>) -> SearchResultPage {
        SearchResultPage {
            results: self
                .results
                .into_iter()
                .filter_map(|r| r.normalize(media_type))
                .collect(),
            total_pages: self.total_pages,
            current_page: self.page,
            total_results: self.total_results,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    #[serde(flatten)]
    media: RawMedia,
    #[serde(default)]
    genres: Vec<Genre>,
    tagline: Option<String>,
    status: Option<String>,
    homepage: Option<String>,
    backdrop_path: Option<String>,
    runtime: Option<u32>,
    episode_run_time: Option<Vec<u32>>,
    number_of_seasons: Option<u32>,
    number_of_episodes: Option<u32>,
    videos: Option<Videos>,
    release_dates: Option<ReleaseDates>,
    content_ratings: Option<ContentRatings>,
}

#[derive(Debug, Deserialize)]
struct Videos {
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    site: String,
    #[serde(rename = "type")]
    video_type: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseDates {
    results: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    iso_3166_1: String,
    release_dates: Vec<ReleaseCert>,
}

#[derive(Debug, Deserialize)]
struct ReleaseCert {
    #[serde(default)]
    certification: String,
    #[serde(rename = "type")]
    release_type: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ContentRatings {
    results: Vec<RatingEntry>,
}

#[derive(Debug, Deserialize)]
struct RatingEntry {
    iso_3166_1: String,
    #[serde(default)]
    rating: String,
}

const THEATRICAL_RELEASE: u8 = 3;

impl RawDetails {
    fn normalize(self, media_type: MediaType) -> Option<MediaDetails> {
        let certification = match media_type {
            MediaType::Movie => self.release_dates.as_ref().and_then(us_certification),
            MediaType::Tv => self.content_ratings.as_ref().and_then(us_rating),
        };
        let trailer_key = self.videos.as_ref().and_then(select_trailer);
        let runtime_minutes = self.runtime.filter(|r| *r > 0).or_else(|| {
            self.episode_run_time
                .as_ref()
                .and_then(|r| r.first().copied())
        });
        let genres = self.genres;
        let mut item = self.media.normalize(Some(media_type))?;
        if item.genre_ids.is_empty() {
            item.genre_ids = genres.iter().map(|g| g.id).collect();
        }
        Some(MediaDetails {
            item,
            genres,
            tagline: self.tagline.filter(|t| !t.is_empty()),
            status: self.status,
            homepage: self.homepage.filter(|h| !h.is_empty()),
            backdrop_path: self.backdrop_path,
            runtime_minutes,
            number_of_seasons: self.number_of_seasons,
            number_of_episodes: self.number_of_episodes,
            trailer_key,
            certification,
        })
    }
}

fn us_certification(data: &ReleaseDates) -> Option<String> {
    let us = data.results.iter().find(|r| r.iso_3166_1 == "US")?;
    us.release_dates
        .iter()
        .find(|rd| !rd.certification.is_empty() && rd.release_type == Some(THEATRICAL_RELEASE))
        .or_else(|| us.release_dates.iter().find(|rd| !rd.certification.is_empty()))
        .map(|rd| rd.certification.clone())
}

fn us_rating(data: &ContentRatings) -> Option<String> {
    data.results
        .iter()
        .find(|r| r.iso_3166_1 == "US" && !r.rating.is_empty())
        .map(|r| r.rating.clone())
}

fn select_trailer(videos: &Videos) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.site == "YouTube" && v.video_type == "Trailer")
        .map(|v| v.key.clone())
}
