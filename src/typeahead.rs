//! Debounced type-ahead suggestions for the search bar and the media picker.
//!
//! [`SuggestionState`] is the pure state machine
//! (`Idle -> Debouncing -> Fetching -> Resolved | Failed`). Every keystroke bumps
//! a sequence number, and a fetch may only land if its [`Ticket`] still carries
//! the current one. [`SuggestionEngine`] drives the machine on the tokio clock
//! and aborts superseded fetches outright.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::MediaItem;
use crate::tmdb::CatalogApi;

pub const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickerKind {
    /// Top search bar: selecting navigates to the results page.
    SearchBar,
    /// Liked/watched pickers: selecting adds a "Title (Year)" badge.
    MediaPicker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub kind: PickerKind,
    pub debounce: Duration,
    pub limit: usize,
}

impl Profile {
    pub fn for_kind(kind: PickerKind) -> Profile {
        match kind {
            PickerKind::SearchBar => Profile::SEARCH_BAR,
            PickerKind::MediaPicker => Profile::MEDIA_PICKER,
        }
    }

    pub const SEARCH_BAR: Profile = Profile {
        kind: PickerKind::SearchBar,
        debounce: Duration::from_millis(300),
        limit: 7,
    };

    pub const MEDIA_PICKER: Profile = Profile {
        kind: PickerKind::MediaPicker,
        debounce: Duration::from_millis(500),
        limit: 10,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Debouncing,
    Fetching,
    Resolved,
    Failed,
}

/// Identifies one issued query. Stale tickets are refused by the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    query: String,
}

impl Ticket {
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub label: String,
    pub item: MediaItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Navigate { query: String },
    Added(String),
    AlreadySelected(String),
}

/// Keeps movies and shows with a poster, capped at `limit`.
pub fn to_suggestions(items: Vec<MediaItem>, profile: &Profile) -> Vec<Suggestion> {
    items
        .into_iter()
        .filter(|i| i.poster_path.as_deref().is_some_and(|p| !p.is_empty()))
        .take(profile.limit)
        .map(|item| Suggestion {
            label: match profile.kind {
                PickerKind::SearchBar => item.title.clone(),
                PickerKind::MediaPicker => item.label(),
            },
            item,
        })
        .collect()
}

pub fn is_searchable(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_LEN
}

#[derive(Debug, Clone)]
pub struct SuggestionState {
    profile: Profile,
    phase: Phase,
    seq: u64,
    text: String,
    suggestions: Vec<Suggestion>,
    open: bool,
    selected: Vec<String>,
}

impl SuggestionState {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            phase: Phase::Idle,
            seq: 0,
            text: String::new(),
            suggestions: Vec::new(),
            open: false,
            selected: Vec::new(),
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// A keystroke. Returns the ticket to fetch with once the debounce window
    /// passes, or `None` when the query is too short to search.
    pub fn input(&mut self, text: &str) -> Option<Ticket> {
        self.seq += 1;
        self.text = text.to_string();
        if !is_searchable(text) {
            self.suggestions.clear();
            self.phase = Phase::Idle;
            self.open = false;
            return None;
        }
        self.phase = Phase::Debouncing;
        self.open = true;
        Some(Ticket {
            seq: self.seq,
            query: text.trim().to_string(),
        })
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.seq == self.seq
    }

    pub fn begin_fetch(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = Phase::Fetching;
        true
    }

    pub fn resolve(&mut self, ticket: &Ticket, items: Vec<MediaItem>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.suggestions = to_suggestions(items, &self.profile);
        self.phase = Phase::Resolved;
        true
    }

    /// Failed fetches degrade to an empty list; the input stays usable.
    pub fn fail(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.suggestions.clear();
        self.phase = Phase::Failed;
        true
    }

    /// Picks the suggestion at `index`, clears the query and closes the popup.
    pub fn select(&mut self, index: usize) -> Option<Selection> {
        let picked = self.suggestions.get(index)?.clone();
        self.seq += 1;
        self.text.clear();
        self.suggestions.clear();
        self.phase = Phase::Idle;
        self.open = false;

        let selection = match self.profile.kind {
            PickerKind::SearchBar => Selection::Navigate {
                query: picked.item.title,
            },
            PickerKind::MediaPicker => {
                if self.selected.contains(&picked.label) {
                    Selection::AlreadySelected(picked.label)
                } else {
                    self.selected.push(picked.label.clone());
                    Selection::Added(picked.label)
                }
            }
        };
        Some(selection)
    }

    pub fn remove_selected(&mut self, label: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s != label);
        self.selected.len() != before
    }

    pub fn focus(&mut self) {
        if is_searchable(&self.text) {
            self.open = true;
        }
    }

    /// Blur leaves the popup open so a mouse-down on a suggestion still lands.
    pub fn blur(&mut self) {}

    /// Click outside the popup.
    pub fn dismiss(&mut self) {
        self.open = false;
    }
}

/// One request, no debounce: what a stateless caller gets for `query`.
/// Short queries and catalog failures both yield no suggestions.
pub async fn suggest_once(catalog: &dyn CatalogApi, query: &str, profile: &Profile) -> Vec<Suggestion> {
    let query = query.trim();
    if !is_searchable(query) {
        return Vec::new();
    }
    match catalog.search(query, 1).await {
        Ok(page) => to_suggestions(page.results, profile),
        Err(e) => {
            warn!(query = %query, "Failed to fetch suggestions: {}", e);
            Vec::new()
        }
    }
}

/// Runs a [`SuggestionState`] against the catalog with real timers.
pub struct SuggestionEngine {
    catalog: Arc<dyn CatalogApi>,
    state: Arc<watch::Sender<SuggestionState>>,
    inflight: Option<JoinHandle<()>>,
}

impl SuggestionEngine {
    pub fn new(catalog: Arc<dyn CatalogApi>, profile: Profile) -> Self {
        let (tx, _rx) = watch::channel(SuggestionState::new(profile));
        Self {
            catalog,
            state: Arc::new(tx),
            inflight: None,
        }
    }

    /// Receives every visible change to the state.
    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    fn cancel_inflight(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
    }

    /// Must be called from inside a tokio runtime.
    pub fn on_input(&mut self, text: &str) {
        self.cancel_inflight();
        let mut issued = None;
        self.state.send_modify(|st| issued = st.input(text));
        let Some(ticket) = issued else {
            return;
        };

        let catalog = Arc::clone(&self.catalog);
        let state = Arc::clone(&self.state);
        let debounce = self.state.borrow().profile().debounce;
        self.inflight = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !state.send_if_modified(|st| st.begin_fetch(&ticket)) {
                return;
            }
            debug!(query = %ticket.query(), "Fetching suggestions");
            match catalog.search(ticket.query(), 1).await {
                Ok(page) => {
                    state.send_if_modified(|st| st.resolve(&ticket, page.results));
                }
                Err(e) => {
                    warn!(query = %ticket.query(), "Failed to fetch suggestions: {}", e);
                    state.send_if_modified(|st| st.fail(&ticket));
                }
            }
        }));
    }

    pub fn select(&mut self, index: usize) -> Option<Selection> {
        self.cancel_inflight();
        let mut selection = None;
        self.state.send_if_modified(|st| {
            selection = st.select(index);
            selection.is_some()
        });
        selection
    }

    pub fn remove_selected(&mut self, label: &str) -> bool {
        self.state.send_if_modified(|st| st.remove_selected(label))
    }

    pub fn focus(&self) {
        self.state.send_modify(|st| st.focus());
    }

    pub fn blur(&self) {
        self.state.send_modify(|st| st.blur());
    }

    pub fn dismiss(&self) {
        self.state.send_modify(|st| st.dismiss());
    }
}

impl Drop for SuggestionEngine {
    fn drop(&mut self) {
        self.cancel_inflight();
    }
}
