use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use crate::models::MediaType;

/// Failures talking to the media catalog.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("TMDB API key is missing")]
    MissingCredential,

    #[error("Catalog returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Catalog request timed out")]
    Timeout,

    #[error("Catalog request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Catalog response could not be parsed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CatalogError::Timeout
        } else {
            CatalogError::Transport(e)
        }
    }
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::Upstream { status: 404, .. })
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Local key-value store failures. Always recovered where they happen.
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("Stored value is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("No {media_type} genre named '{name}'")]
pub struct GenreNotFound {
    pub media_type: MediaType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("Invalid suggestion request: {}", join_fields(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// Errors surfaced by view loads and the JSON API.
#[derive(thiserror::Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type ViewResult<T> = Result<T, ViewError>;

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ViewError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ViewError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ViewError::Task(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            ),
            ViewError::Validation(v) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string(), "fields": v.errors }),
            ),
            ViewError::Catalog(e) => {
                let status = match e {
                    CatalogError::Upstream { status: 404, .. } => StatusCode::NOT_FOUND,
                    CatalogError::Upstream { .. }
                    | CatalogError::Transport(_)
                    | CatalogError::Decode(_) => StatusCode::BAD_GATEWAY,
                    CatalogError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    CatalogError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, json!({ "error": e.to_string() }))
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    NotFound(#[from] GenreNotFound),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
