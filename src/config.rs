use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings read from the environment (and `.env`, when present).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Catalog API key. Absence is only reported when the first call is made.
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub tmdb_base_url: String,

    /// Handed to the rendering layer, which builds image URLs itself.
    #[serde(default = "default_image_base_url")]
    pub tmdb_image_base_url: String,

    #[serde(default = "default_language")]
    pub tmdb_language: String,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_favorites_dir")]
    pub favorites_dir: PathBuf,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_image_base_url() -> String {
    "https://image.tmdb.org/t/p/".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_favorites_dir() -> PathBuf {
    PathBuf::from(".movista")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3146
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        envy::from_env::<Config>().context("Failed to load config")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_base_url: default_base_url(),
            tmdb_image_base_url: default_image_base_url(),
            tmdb_language: default_language(),
            request_timeout_secs: default_timeout_secs(),
            favorites_dir: default_favorites_dir(),
            host: default_host(),
            port: default_port(),
        }
    }
}
