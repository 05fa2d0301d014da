use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use movista::config::Config;
use movista::error::CatalogError;
use movista::genres::resolve_genre_id;
use movista::models::{MediaType, TimeWindow};
use movista::tmdb::{CatalogApi, DetailSection, TmdbClient};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API_KEY: &str = "test-key";

#[derive(Default)]
struct Upstream {
    genre_calls: AtomicUsize,
    requests: AtomicUsize,
    last_params: Mutex<HashMap<String, String>>,
}

type Params = Query<HashMap<String, String>>;

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status_code": 34,
            "status_message": "The resource you requested could not be found."
        })),
    )
        .into_response()
}

/// Records the call and rejects anything without the test key.
fn admit(upstream: &Upstream, params: &HashMap<String, String>) -> Option<Response> {
    upstream.requests.fetch_add(1, Ordering::SeqCst);
    *upstream.last_params.lock().unwrap() = params.clone();
    if params.get("api_key").map(String::as_str) != Some(API_KEY) {
        return Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "status_code": 7,
                    "status_message": "Invalid API key: You must be granted a valid key."
                })),
            )
                .into_response(),
        );
    }
    None
}

async fn genres(
    State(upstream): State<Arc<Upstream>>,
    Path(media_type): Path<String>,
    Query(params): Params,
) -> Response {
    if let Some(rejection) = admit(&upstream, &params) {
        return rejection;
    }
    upstream.genre_calls.fetch_add(1, Ordering::SeqCst);
    let genres = match media_type.as_str() {
        "movie" => json!([{ "id": 28, "name": "Action" }, { "id": 35, "name": "Comedy" }]),
        _ => json!([{ "id": 10759, "name": "Action & Adventure" }]),
    };
    Json(json!({ "genres": genres })).into_response()
}

async fn popular_movies(State(upstream): State<Arc<Upstream>>, Query(params): Params) -> Response {
    if let Some(rejection) = admit(&upstream, &params) {
        return rejection;
    }
    Json(json!({
        "page": 2,
        "total_pages": 41_000,
        "total_results": 820_000,
        "results": [
            { "id": 603, "title": "The Matrix", "release_date": "1999-03-31",
              "poster_path": "/matrix.jpg", "overview": "Neo", "vote_average": 8.2,
              "genre_ids": [28, 878], "popularity": 80.5 }
        ]
    }))
    .into_response()
}

async fn search_multi(State(upstream): State<Arc<Upstream>>, Query(params): Params) -> Response {
    if let Some(rejection) = admit(&upstream, &params) {
        return rejection;
    }
    Json(json!({
        "page": 1,
        "total_pages": 1,
        "total_results": 3,
        "results": [
            { "id": 9799, "media_type": "movie", "title": "The Fast and the Furious",
              "release_date": "2001-06-22", "poster_path": "/ff.jpg", "popularity": 30.0 },
            { "id": 5, "media_type": "person", "name": "Vin Diesel" },
            { "id": 77, "media_type": "tv", "name": "Fast & Furious Spy Racers",
              "first_air_date": "2019-12-26", "poster_path": "/spy.jpg", "popularity": 4.0 }
        ]
    }))
    .into_response()
}

async fn movie_details(
    State(upstream): State<Arc<Upstream>>,
    Path(id): Path<u64>,
    Query(params): Params,
) -> Response {
    if let Some(rejection) = admit(&upstream, &params) {
        return rejection;
    }
    if id != 603 {
        return not_found();
    }
    Json(json!({
        "id": 603,
        "title": "The Matrix",
        "release_date": "1999-03-31",
        "runtime": 136,
        "tagline": "Welcome to the Real World.",
        "genres": [{ "id": 28, "name": "Action" }],
        "videos": { "results": [{ "site": "YouTube", "type": "Trailer", "key": "vKQi3bBA1y8" }] },
        "release_dates": { "results": [
            { "iso_3166_1": "US", "release_dates": [{ "certification": "R", "type": 3 }] }
        ]}
    }))
    .into_response()
}

async fn trending_down(State(upstream): State<Arc<Upstream>>, Query(params): Params) -> Response {
    if let Some(rejection) = admit(&upstream, &params) {
        return rejection;
    }
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down\n").into_response()
}

async fn slow_popular_tv(State(upstream): State<Arc<Upstream>>, Query(params): Params) -> Response {
    if let Some(rejection) = admit(&upstream, &params) {
        return rejection;
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "page": 1, "results": [], "total_pages": 0, "total_results": 0 })).into_response()
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/3/genre/:media_type/list", get(genres))
        .route("/3/movie/popular", get(popular_movies))
        .route("/3/movie/:id", get(movie_details))
        .route("/3/tv/popular", get(slow_popular_tv))
        .route("/3/search/multi", get(search_multi))
        .route("/3/trending/movie/day", get(trending_down))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/3", addr), upstream)
}

fn client(base_url: &str, api_key: Option<&str>) -> TmdbClient {
    let config = Config {
        tmdb_api_key: api_key.map(str::to_string),
        tmdb_base_url: base_url.to_string(),
        request_timeout_secs: 1,
        ..Config::default()
    };
    TmdbClient::new(&config).unwrap()
}

#[tokio::test]
async fn popular_page_is_normalized_and_tagged() {
    let (base, upstream) = spawn_upstream().await;
    let page = client(&base, Some(API_KEY))
        .popular(MediaType::Movie, 2)
        .await
        .unwrap();

    assert_eq!(page.current_page, 2);
    assert_eq!(page.total_pages, 41_000);
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].media_type, MediaType::Movie);
    assert_eq!(page.results[0].title, "The Matrix");

    let params = upstream.last_params.lock().unwrap().clone();
    assert_eq!(params.get("page").map(String::as_str), Some("2"));
    assert_eq!(params.get("language").map(String::as_str), Some("en-US"));
}

#[tokio::test]
async fn search_sends_query_and_drops_people() {
    let (base, upstream) = spawn_upstream().await;
    let page = client(&base, Some(API_KEY))
        .search("fast & furious", 1)
        .await
        .unwrap();

    let params = upstream.last_params.lock().unwrap().clone();
    assert_eq!(params.get("query").map(String::as_str), Some("fast & furious"));
    assert_eq!(params.get("include_adult").map(String::as_str), Some("false"));

    let kinds: Vec<_> = page.results.iter().map(|i| i.media_type).collect();
    assert_eq!(kinds, vec![MediaType::Movie, MediaType::Tv]);
    assert_eq!(page.results[1].title, "Fast & Furious Spy Racers");
}

#[tokio::test]
async fn genre_map_is_fetched_once_per_media_type() {
    let (base, upstream) = spawn_upstream().await;
    let tmdb = client(&base, Some(API_KEY));

    let first = resolve_genre_id(&tmdb, MediaType::Movie, "action").await.unwrap();
    let second = resolve_genre_id(&tmdb, MediaType::Movie, "ACTION").await.unwrap();
    let map = tmdb.genre_map(MediaType::Movie).await.unwrap();
    assert_eq!(first, 28);
    assert_eq!(second, 28);
    assert_eq!(map.name(35), Some("Comedy"));
    assert_eq!(upstream.genre_calls.load(Ordering::SeqCst), 1);

    assert!(resolve_genre_id(&tmdb, MediaType::Movie, "Polka").await.is_err());
    tmdb.genre_map(MediaType::Tv).await.unwrap();
    assert_eq!(upstream.genre_calls.load(Ordering::SeqCst), 2);
    assert!(tmdb.genre_cache().cached(MediaType::Tv).is_some());
}

#[tokio::test]
async fn details_append_sections_and_normalize() {
    let (base, upstream) = spawn_upstream().await;
    let details = client(&base, Some(API_KEY))
        .details(
            MediaType::Movie,
            603,
            DetailSection::for_detail_page(MediaType::Movie),
        )
        .await
        .unwrap();

    let params = upstream.last_params.lock().unwrap().clone();
    assert_eq!(
        params.get("append_to_response").map(String::as_str),
        Some("videos,release_dates")
    );
    assert_eq!(details.certification.as_deref(), Some("R"));
    assert_eq!(details.trailer_key.as_deref(), Some("vKQi3bBA1y8"));
    assert_eq!(details.tagline.as_deref(), Some("Welcome to the Real World."));
}

#[tokio::test]
async fn unknown_id_is_upstream_not_found() {
    let (base, _upstream) = spawn_upstream().await;
    let err = client(&base, Some(API_KEY))
        .details(MediaType::Movie, 1, &[])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    match err {
        CatalogError::Upstream { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "The resource you requested could not be found.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn bad_key_surfaces_status_message() {
    let (base, _upstream) = spawn_upstream().await;
    let err = client(&base, Some("wrong"))
        .popular(MediaType::Movie, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Upstream { status: 401, ref message } if message.starts_with("Invalid API key")
    ));
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_text() {
    let (base, _upstream) = spawn_upstream().await;
    let err = client(&base, Some(API_KEY))
        .trending(MediaType::Movie, TimeWindow::Day, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Upstream { status: 503, ref message } if message == "upstream down"
    ));
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let (base, upstream) = spawn_upstream().await;
    let err = client(&base, None)
        .genre_list(MediaType::Movie)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::MissingCredential));
    assert_eq!(upstream.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let (base, _upstream) = spawn_upstream().await;
    let err = client(&base, Some(API_KEY))
        .popular(MediaType::Tv, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Timeout), "got {err:?}");
}
