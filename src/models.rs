use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(format!("unsupported media type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    Day,
    Week,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
        }
    }
}

/// A movie or show as the UI consumes it. Movies and shows may share a numeric
/// id, so identity is always the `(id, media_type)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: u64,
    pub media_type: MediaType,
    pub title: String,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub overview: String,
    pub vote_average: f64,
    pub genre_ids: Vec<u32>,
    pub popularity: f64,
}

impl MediaItem {
    pub fn key(&self) -> (u64, MediaType) {
        (self.id, self.media_type)
    }

    pub fn year(&self) -> Option<i32> {
        self.release_date.as_deref().and_then(extract_year)
    }

    /// "Title (Year)", or the bare title when the item has no usable date.
    pub fn label(&self) -> String {
        labelled(&self.title, self.year())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultPage {
    pub results: Vec<MediaItem>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total_results: u32,
}

impl SearchResultPage {
    pub fn empty(page: u32) -> Self {
        Self {
            results: Vec::new(),
            total_pages: 0,
            current_page: page,
            total_results: 0,
        }
    }
}

/// Reduced projection of a [`MediaItem`] kept in the favorites mirror.
/// Exactly one of `release_date` / `first_air_date` is set, by media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub id: u64,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
}

impl FavoriteItem {
    pub fn key(&self) -> (u64, MediaType) {
        (self.id, self.media_type)
    }

    pub fn date(&self) -> Option<&str> {
        match self.media_type {
            MediaType::Movie => self.release_date.as_deref(),
            MediaType::Tv => self.first_air_date.as_deref(),
        }
    }

    pub fn label(&self) -> String {
        labelled(&self.title, self.date().and_then(extract_year))
    }

    /// Keeps a single date, in the field matching `media_type`. A date sent
    /// under the other field is moved over when the right one is empty.
    pub fn normalized(mut self) -> Self {
        let (release, first_air) = (self.release_date.take(), self.first_air_date.take());
        match self.media_type {
            MediaType::Movie => self.release_date = release.or(first_air),
            MediaType::Tv => self.first_air_date = first_air.or(release),
        }
        self
    }
}

impl From<&MediaItem> for FavoriteItem {
    fn from(item: &MediaItem) -> Self {
        let (release_date, first_air_date) = match item.media_type {
            MediaType::Movie => (item.release_date.clone(), None),
            MediaType::Tv => (None, item.release_date.clone()),
        };
        Self {
            id: item.id,
            media_type: item.media_type,
            title: item.title.clone(),
            poster_path: item.poster_path.clone(),
            overview: item.overview.clone(),
            vote_average: item.vote_average,
            genre_ids: item.genre_ids.clone(),
            release_date,
            first_air_date,
        }
    }
}

/// Parses a catalog date ("YYYY-MM-DD"). Empty or malformed strings are `None`.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    date.trim().parse::<NaiveDate>().ok()
}

pub fn extract_year(date: &str) -> Option<i32> {
    use chrono::Datelike;
    parse_date(date).map(|d| d.year())
}

fn labelled(title: &str, year: Option<i32>) -> String {
    match year {
        Some(y) => format!("{} ({})", title, y),
        None => title.to_string(),
    }
}
