pub mod advisor;
pub mod aggregate;
pub mod app;
pub mod config;
pub mod error;
pub mod favorites;
pub mod genres;
pub mod models;
pub mod storage;
pub mod tmdb;
pub mod typeahead;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;
