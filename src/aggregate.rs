//! Merging, sorting and page bounding for catalog result lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{CatalogResult, ResolveError};
use crate::genres::resolve_genre_id;
use crate::models::{parse_date, MediaItem, MediaType, SearchResultPage};
use crate::tmdb::CatalogApi;

/// The catalog refuses pages past this, whatever `total_pages` says.
pub const MAX_PAGES: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Upstream order, untouched.
    #[default]
    Relevance,
    Title,
    #[serde(alias = "releaseDate")]
    ReleaseDate,
    #[serde(alias = "voteAverage")]
    VoteAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

fn missing_release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

fn release_key(item: &MediaItem) -> NaiveDate {
    item.release_date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or_else(missing_release_date)
}

fn compare(a: &MediaItem, b: &MediaItem, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Relevance => Ordering::Equal,
        SortBy::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortBy::ReleaseDate => release_key(a).cmp(&release_key(b)),
        SortBy::VoteAverage => a.vote_average.total_cmp(&b.vote_average),
    }
}

/// Stable sort by `sort_by`. Equal keys keep their incoming order in both
/// directions; `Relevance` returns the input as is.
pub fn sort_results(mut items: Vec<MediaItem>, sort_by: SortBy, order: SortOrder) -> Vec<MediaItem> {
    if sort_by == SortBy::Relevance {
        return items;
    }
    items.sort_by(|a, b| match order {
        SortOrder::Asc => compare(a, b, sort_by),
        SortOrder::Desc => compare(b, a, sort_by),
    });
    items
}

/// Drops what the grid cannot render: items without a poster.
pub fn filter_displayable(items: Vec<MediaItem>) -> Vec<MediaItem> {
    items
        .into_iter()
        .filter(|i| i.poster_path.as_deref().is_some_and(|p| !p.is_empty()))
        .collect()
}

/// Bounds `total_pages` at [`MAX_PAGES`]. Results are already paged upstream
/// and are never re-sliced here.
pub fn paginate(mut page: SearchResultPage) -> SearchResultPage {
    page.total_pages = page.total_pages.min(MAX_PAGES);
    page
}

/// Merges one page of movie results with one page of show results.
///
/// Items are tagged with their source type, de-duplicated by `(id, type)` and
/// ordered by popularity, highest first, keeping source order on ties. The
/// pagination metadata is an approximation: the larger of the two page counts
/// and the sum of both result counts. Page N of the merge is not page N of
/// either source past the first page.
pub fn combine_by_genre(
    movies: SearchResultPage,
    shows: SearchResultPage,
    page: u32,
) -> SearchResultPage {
    let total_pages = movies.total_pages.max(shows.total_pages);
    let total_results = movies.total_results.saturating_add(shows.total_results);

    let tagged = movies
        .results
        .into_iter()
        .map(|i| with_type(i, MediaType::Movie))
        .chain(shows.results.into_iter().map(|i| with_type(i, MediaType::Tv)));

    let mut seen = HashSet::new();
    let mut results: Vec<MediaItem> = tagged.filter(|i| seen.insert(i.key())).collect();
    results.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));

    SearchResultPage {
        results,
        total_pages,
        current_page: page,
        total_results,
    }
}

fn with_type(mut item: MediaItem, media_type: MediaType) -> MediaItem {
    item.media_type = media_type;
    item
}

/// Discover-by-genre for one media type. An unknown genre name is an empty
/// page, not an error.
pub async fn discover_by_genre_name(
    catalog: &dyn CatalogApi,
    media_type: MediaType,
    genre_name: &str,
    page: u32,
) -> CatalogResult<SearchResultPage> {
    match resolve_genre_id(catalog, media_type, genre_name).await {
        Ok(id) => catalog.discover(media_type, id, page).await,
        Err(ResolveError::NotFound(e)) => {
            debug!("{}; returning empty page", e);
            Ok(SearchResultPage::empty(page))
        }
        Err(ResolveError::Catalog(e)) => Err(e),
    }
}

/// Discover-by-genre across movies and shows, combined into one page.
pub async fn discover_combined(
    catalog: &dyn CatalogApi,
    genre_name: &str,
    page: u32,
) -> CatalogResult<SearchResultPage> {
    let (movies, shows) = tokio::try_join!(
        discover_by_genre_name(catalog, MediaType::Movie, genre_name, page),
        discover_by_genre_name(catalog, MediaType::Tv, genre_name, page),
    )?;
    Ok(combine_by_genre(movies, shows, page))
}
