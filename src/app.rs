use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::advisor::{self, SuggestionForm};
use crate::config::Config;
use crate::error::{ViewError, ViewResult};
use crate::favorites::FavoritesStore;
use crate::models::{FavoriteItem, MediaType, TimeWindow};
use crate::storage::FileStore;
use crate::tmdb::{CatalogApi, MediaDetails, TmdbClient};
use crate::typeahead::{self, PickerKind, Profile};
use crate::views::{self, SearchParams};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogApi>,
    pub favorites: Arc<Mutex<FavoritesStore>>,
    pub image_base_url: String,
}

impl AppState {
    pub fn new(catalog: Arc<dyn CatalogApi>, favorites: FavoritesStore, image_base_url: &str) -> Self {
        Self {
            catalog,
            favorites: Arc::new(Mutex::new(favorites)),
            image_base_url: image_base_url.to_string(),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbClient::new(&config)?);
    if config.tmdb_api_key.is_none() {
        warn!("TMDB_API_KEY is not set; catalog calls will fail until it is");
    }

    let backend = Arc::new(FileStore::new(&config.favorites_dir));
    let favorites = FavoritesStore::load(backend);
    info!(
        "Loaded {} favorites from {}",
        favorites.len(),
        config.favorites_dir.display()
    );

    let state = AppState::new(catalog, favorites, &config.tmdb_image_base_url);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(client_config))
        .route("/api/home", get(home))
        .route("/api/trending/:media_type", get(trending))
        .route("/api/popular/:media_type/:page", get(popular))
        .route("/api/search", get(search))
        .route("/api/suggest", get(suggest))
        .route("/api/favorites", get(list_favorites).post(add_favorite))
        .route("/api/favorites/:media_type/:id", delete(remove_favorite))
        .route("/api/suggestions/request", post(suggestion_request))
        .route("/api/movie/:id", get(movie_details))
        .route("/api/tv/:id", get(tv_details))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn client_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "imageBaseUrl": state.image_base_url }))
}

/// Unknown media types and unparsable ids are pages that do not exist.
fn parse_media_type(raw: &str) -> ViewResult<MediaType> {
    raw.parse().map_err(ViewError::NotFound)
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> ViewResult<T> {
    raw.parse()
        .map_err(|_| ViewError::NotFound(format!("{} '{}'", what, raw)))
}

async fn home(State(state): State<AppState>) -> ViewResult<Json<views::HomeView>> {
    Ok(Json(views::load_home(state.catalog.as_ref()).await?))
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    #[serde(default)]
    window: TimeWindow,
    #[serde(default)]
    page: Option<u32>,
}

async fn trending(
    State(state): State<AppState>,
    Path(media_type): Path<String>,
    Query(params): Query<TrendingParams>,
) -> ViewResult<Json<views::TrendingView>> {
    let media_type = parse_media_type(&media_type)?;
    Ok(Json(
        views::load_trending(
            state.catalog.as_ref(),
            media_type,
            params.window,
            params.page.unwrap_or(1),
        )
        .await?,
    ))
}

async fn popular(
    State(state): State<AppState>,
    Path((media_type, page)): Path<(String, String)>,
) -> ViewResult<Json<views::PopularView>> {
    let media_type = parse_media_type(&media_type)?;
    let page: u32 = parse_number(&page, "page")?;
    if page < 1 {
        return Err(ViewError::NotFound(format!("page {}", page)));
    }
    Ok(Json(
        views::load_popular(state.catalog.as_ref(), media_type, page).await?,
    ))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ViewResult<Json<views::SearchView>> {
    Ok(Json(views::load_search(state.catalog.as_ref(), params).await?))
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    picker: Option<PickerKind>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Json<Vec<typeahead::Suggestion>> {
    let mut profile = Profile::for_kind(params.picker.unwrap_or(PickerKind::SearchBar));
    if let Some(limit) = params.limit {
        profile.limit = limit.clamp(1, profile.limit);
    }
    Json(typeahead::suggest_once(state.catalog.as_ref(), &params.q, &profile).await)
}

async fn movie_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ViewResult<Json<MediaDetails>> {
    details(&state, MediaType::Movie, &id).await
}

async fn tv_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ViewResult<Json<MediaDetails>> {
    details(&state, MediaType::Tv, &id).await
}

async fn details(state: &AppState, media_type: MediaType, id: &str) -> ViewResult<Json<MediaDetails>> {
    let id: u64 = parse_number(id, "id")?;
    Ok(Json(
        views::load_details(state.catalog.as_ref(), media_type, id).await?,
    ))
}

async fn list_favorites(State(state): State<AppState>) -> Json<views::FavoritesView> {
    let favorites = state.favorites.lock().await.all().to_vec();
    Json(views::load_favorites(state.catalog.as_ref(), favorites).await)
}

/// Runs `f` against the favorites on the blocking pool, since every
/// mutation writes the mirror through synchronous file I/O.
async fn with_favorites<T, F>(state: &AppState, f: F) -> ViewResult<T>
where
    F: FnOnce(&mut FavoritesStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let favorites = state.favorites.clone();
    let out = tokio::task::spawn_blocking(move || f(&mut favorites.blocking_lock())).await?;
    Ok(out)
}

async fn add_favorite(
    State(state): State<AppState>,
    Json(item): Json<FavoriteItem>,
) -> ViewResult<Response> {
    let (media_type, id) = (item.media_type, item.id);
    let (added, count) = with_favorites(&state, move |favorites| {
        let added = favorites.add(item);
        (added, favorites.len())
    })
    .await?;
    if added {
        info!("Added favorite {} {}", media_type, id);
    }
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = json!({ "added": added, "count": count });
    Ok((status, Json(body)).into_response())
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, String)>,
) -> ViewResult<StatusCode> {
    let media_type = parse_media_type(&media_type)?;
    let id: u64 = parse_number(&id, "id")?;
    if with_favorites(&state, move |favorites| favorites.remove(id, media_type)).await? {
        info!("Removed favorite {} {}", media_type, id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ViewError::NotFound(format!("favorite {} {}", media_type, id)))
    }
}

async fn suggestion_request(
    State(state): State<AppState>,
    Json(form): Json<SuggestionForm>,
) -> ViewResult<Json<serde_json::Value>> {
    let labels = state.favorites.lock().await.labels();
    let request = advisor::assemble(form, &labels)?;
    let prompt = advisor::render_prompt(&request);
    Ok(Json(json!({ "request": request, "prompt": prompt })))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
