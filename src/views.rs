//! Page loads. Each one fans out to the catalog and fails as a whole if any
//! call fails; nothing is rendered half-loaded.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::{discover_combined, filter_displayable, paginate, sort_results, SortBy, SortOrder};
use crate::error::{CatalogError, ViewError, ViewResult};
use crate::genres::GenreMap;
use crate::models::{FavoriteItem, MediaItem, MediaType, SearchResultPage, TimeWindow};
use crate::tmdb::{CatalogApi, DetailSection, MediaDetails};

pub const HOME_TRENDING_LIMIT: usize = 10;
pub const HOME_POPULAR_LIMIT: usize = 8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub trending_movies: Vec<MediaItem>,
    pub trending_shows: Vec<MediaItem>,
    pub popular_movies: Vec<MediaItem>,
    pub popular_shows: Vec<MediaItem>,
    pub movie_genres: GenreMap,
    pub tv_genres: GenreMap,
}

pub async fn load_home(catalog: &dyn CatalogApi) -> ViewResult<HomeView> {
    let (trending_movies, trending_shows, popular_movies, popular_shows, movie_genres, tv_genres) =
        tokio::try_join!(
            catalog.trending(MediaType::Movie, TimeWindow::Day, 1),
            catalog.trending(MediaType::Tv, TimeWindow::Day, 1),
            catalog.popular(MediaType::Movie, 1),
            catalog.popular(MediaType::Tv, 1),
            catalog.genre_map(MediaType::Movie),
            catalog.genre_map(MediaType::Tv),
        )?;

    Ok(HomeView {
        trending_movies: truncated(trending_movies.results, HOME_TRENDING_LIMIT),
        trending_shows: truncated(trending_shows.results, HOME_TRENDING_LIMIT),
        popular_movies: truncated(popular_movies.results, HOME_POPULAR_LIMIT),
        popular_shows: truncated(popular_shows.results, HOME_POPULAR_LIMIT),
        movie_genres: (*movie_genres).clone(),
        tv_genres: (*tv_genres).clone(),
    })
}

fn truncated(mut items: Vec<MediaItem>, limit: usize) -> Vec<MediaItem> {
    items.truncate(limit);
    items
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingView {
    pub media_type: MediaType,
    pub window: TimeWindow,
    #[serde(flatten)]
    pub page: SearchResultPage,
}

pub async fn load_trending(
    catalog: &dyn CatalogApi,
    media_type: MediaType,
    window: TimeWindow,
    page: u32,
) -> ViewResult<TrendingView> {
    if page < 1 {
        return Err(ViewError::InvalidInput(format!("page must be at least 1, got {}", page)));
    }
    let trending = catalog.trending(media_type, window, page).await?;
    Ok(TrendingView {
        media_type,
        window,
        page: paginate(trending),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularView {
    pub media_type: MediaType,
    #[serde(flatten)]
    pub page: SearchResultPage,
    pub genres: GenreMap,
}

pub async fn load_popular(
    catalog: &dyn CatalogApi,
    media_type: MediaType,
    page: u32,
) -> ViewResult<PopularView> {
    if page < 1 {
        return Err(ViewError::InvalidInput(format!("page must be at least 1, got {}", page)));
    }
    let (popular, genres) = tokio::try_join!(
        catalog.popular(media_type, page),
        catalog.genre_map(media_type),
    )?;
    if popular.results.is_empty() && page > 1 {
        return Err(ViewError::NotFound(format!("popular {} page {}", media_type, page)));
    }
    Ok(PopularView {
        media_type,
        page: paginate(popular),
        genres: (*genres).clone(),
    })
}

fn default_page() -> u32 {
    1
}

/// Query-string shape of a search: `genre_query` wins over `query`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub genre_query: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            genre_query: String::new(),
            page: default_page(),
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub query: String,
    pub genre_query: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: SearchResultPage,
    pub movie_genres: GenreMap,
    pub tv_genres: GenreMap,
}

pub async fn load_search(catalog: &dyn CatalogApi, params: SearchParams) -> ViewResult<SearchView> {
    if params.page < 1 {
        return Err(ViewError::InvalidInput(format!(
            "page must be at least 1, got {}",
            params.page
        )));
    }
    let query = params.query.trim().to_string();
    let genre_query = params.genre_query.trim().to_string();

    let (page, movie_genres, tv_genres) = if query.is_empty() && genre_query.is_empty() {
        (SearchResultPage::empty(params.page), GenreMap::default(), GenreMap::default())
    } else {
        let results = async {
            if !genre_query.is_empty() {
                discover_combined(catalog, &genre_query, params.page).await
            } else {
                catalog.search(&query, params.page).await
            }
        };
        let (page, movie, tv) = tokio::try_join!(
            results,
            catalog.genre_map(MediaType::Movie),
            catalog.genre_map(MediaType::Tv),
        )?;
        (page, (*movie).clone(), (*tv).clone())
    };

    let SearchResultPage {
        results,
        total_pages,
        current_page,
        total_results,
    } = page;
    let results = sort_results(filter_displayable(results), params.sort_by, params.sort_order);
    debug!(
        query = %query,
        genre_query = %genre_query,
        page = current_page,
        shown = results.len(),
        "Search loaded"
    );

    Ok(SearchView {
        query,
        genre_query,
        sort_by: params.sort_by,
        sort_order: params.sort_order,
        page: paginate(SearchResultPage {
            results,
            total_pages,
            current_page,
            total_results,
        }),
        movie_genres,
        tv_genres,
    })
}

/// Detail page. Any catalog rejection of the id reads as "not found".
pub async fn load_details(
    catalog: &dyn CatalogApi,
    media_type: MediaType,
    id: u64,
) -> ViewResult<MediaDetails> {
    catalog
        .details(media_type, id, DetailSection::for_detail_page(media_type))
        .await
        .map_err(|e| match e {
            CatalogError::Upstream { status, message } => {
                debug!(status, "Details for {} {} unavailable: {}", media_type, id, message);
                ViewError::NotFound(format!("{} {}", media_type, id))
            }
            other => ViewError::Catalog(other),
        })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesView {
    pub favorites: Vec<FavoriteItem>,
    pub movie_genres: GenreMap,
    pub tv_genres: GenreMap,
}

/// Favorites render without genre names rather than not at all.
pub async fn load_favorites(catalog: &dyn CatalogApi, favorites: Vec<FavoriteItem>) -> FavoritesView {
    let (movie_genres, tv_genres) = match tokio::try_join!(
        catalog.genre_map(MediaType::Movie),
        catalog.genre_map(MediaType::Tv),
    ) {
        Ok((movie, tv)) => ((*movie).clone(), (*tv).clone()),
        Err(e) => {
            warn!("Failed to load genre maps for favorites: {}", e);
            (GenreMap::default(), GenreMap::default())
        }
    };
    FavoritesView {
        favorites,
        movie_genres,
        tv_genres,
    }
}
