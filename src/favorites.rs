use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::models::{FavoriteItem, MediaType};
use crate::storage::KeyValueStore;

/// Key the favorites array is stored under.
pub const FAVORITES_KEY: &str = "movista-favorites";

/// The user's favorites, in insertion order, mirrored to a [`KeyValueStore`]
/// after every change. Nothing here ever fails: a bad mirror loads as empty,
/// a failed write is logged and the in-memory list stays authoritative.
pub struct FavoritesStore {
    items: Vec<FavoriteItem>,
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl FavoritesStore {
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::load_key(backend, FAVORITES_KEY)
    }

    pub fn load_key(backend: Arc<dyn KeyValueStore>, key: &str) -> Self {
        let items = match read_items(backend.as_ref(), key) {
            Ok(items) => items,
            Err(e) => {
                warn!("Discarding stored favorites: {}", e);
                Vec::new()
            }
        };
        debug!("Loaded {} favorites", items.len());
        Self {
            items,
            backend,
            key: key.to_string(),
        }
    }

    /// Appends `item` unless the same `(id, media_type)` is already present.
    /// Returns whether the list changed.
    pub fn add(&mut self, item: FavoriteItem) -> bool {
        if self.contains(item.id, item.media_type) {
            return false;
        }
        self.items.push(item.normalized());
        self.persist();
        true
    }

    pub fn remove(&mut self, id: u64, media_type: MediaType) -> bool {
        let before = self.items.len();
        self.items.retain(|f| f.key() != (id, media_type));
        if self.items.len() == before {
            return false;
        }
        self.persist();
        true
    }

    /// Adds or removes `item`; returns whether it is a favorite afterwards.
    pub fn toggle(&mut self, item: FavoriteItem) -> bool {
        if self.remove(item.id, item.media_type) {
            false
        } else {
            self.add(item)
        }
    }

    pub fn contains(&self, id: u64, media_type: MediaType) -> bool {
        self.get(id, media_type).is_some()
    }

    pub fn get(&self, id: u64, media_type: MediaType) -> Option<&FavoriteItem> {
        self.items.iter().find(|f| f.key() == (id, media_type))
    }

    pub fn all(&self) -> &[FavoriteItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// "Title (Year)" labels, used to seed suggestion requests.
    pub fn labels(&self) -> Vec<String> {
        self.items.iter().map(FavoriteItem::label).collect()
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.items)
            .map_err(PersistenceError::from)
            .and_then(|json| self.backend.set(&self.key, &json));
        if let Err(e) = result {
            warn!("Failed to persist favorites: {}", e);
        }
    }
}

fn read_items(backend: &dyn KeyValueStore, key: &str) -> Result<Vec<FavoriteItem>, PersistenceError> {
    let Some(raw) = backend.get(key)? else {
        return Ok(Vec::new());
    };
    let items: Vec<FavoriteItem> = serde_json::from_str(&raw)?;
    let mut seen = HashSet::new();
    Ok(items
        .into_iter()
        .filter(|f| seen.insert(f.key()))
        .map(FavoriteItem::normalized)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn favorite(id: u64, media_type: MediaType, title: &str) -> FavoriteItem {
        FavoriteItem {
            id,
            media_type,
            title: title.to_string(),
            poster_path: Some(format!("/{}.jpg", id)),
            overview: String::new(),
            vote_average: 7.0,
            genre_ids: vec![18],
            release_date: Some("2010-07-16".to_string()),
            first_air_date: None,
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Read {
                key: key.to_string(),
                reason: "disk on fire".to_string(),
            })
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Write {
                key: key.to_string(),
                reason: "disk on fire".to_string(),
            })
        }

        fn remove(&self, _key: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[test]
    fn corrupt_mirror_loads_empty_and_next_add_persists() {
        let backend = Arc::new(MemoryStore::with_entry(FAVORITES_KEY, "{not json"));
        let mut store = FavoritesStore::load(backend.clone());
        assert!(store.is_empty());

        assert!(store.add(favorite(27205, MediaType::Movie, "Inception")));
        let raw = backend.get(FAVORITES_KEY).unwrap().unwrap();
        let mirrored: Vec<FavoriteItem> = serde_json::from_str(&raw).unwrap();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].id, 27205);
    }

    #[test]
    fn add_then_remove_restores_previous_state() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = FavoritesStore::load(backend.clone());
        store.add(favorite(1, MediaType::Movie, "Heat"));

        assert!(store.add(favorite(1, MediaType::Tv, "Heat")));
        assert!(store.contains(1, MediaType::Tv));
        assert!(store.remove(1, MediaType::Tv));

        assert_eq!(store.len(), 1);
        assert!(!store.contains(1, MediaType::Tv));
        let reloaded = FavoritesStore::load(backend);
        assert_eq!(reloaded.all(), store.all());
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = FavoritesStore::load(backend.clone());
        assert!(store.add(favorite(5, MediaType::Movie, "Alien")));
        assert!(!store.add(favorite(5, MediaType::Movie, "Alien (renamed)")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(5, MediaType::Movie).unwrap().title, "Alien");
        assert!(!store.remove(6, MediaType::Movie));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut store = FavoritesStore::load(Arc::new(MemoryStore::new()));
        assert!(store.toggle(favorite(9, MediaType::Movie, "Up")));
        assert!(!store.toggle(favorite(9, MediaType::Movie, "Up")));
        assert!(store.is_empty());
    }

    #[test]
    fn duplicates_in_mirror_are_collapsed_on_load() {
        let items = vec![
            favorite(3, MediaType::Movie, "First"),
            favorite(3, MediaType::Movie, "Second"),
            favorite(3, MediaType::Tv, "Show"),
        ];
        let raw = serde_json::to_string(&items).unwrap();
        let store = FavoritesStore::load(Arc::new(MemoryStore::with_entry(FAVORITES_KEY, &raw)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.all()[0].title, "First");
    }

    #[test]
    fn show_added_with_release_date_is_stored_under_first_air_date() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = FavoritesStore::load(backend.clone());
        let mut show = favorite(1399, MediaType::Tv, "Game of Thrones");
        show.release_date = Some("2011-04-17".to_string());

        assert!(store.add(show));
        let raw = backend.get(FAVORITES_KEY).unwrap().unwrap();
        let mirrored: Vec<FavoriteItem> = serde_json::from_str(&raw).unwrap();
        assert_eq!(mirrored[0].release_date, None);
        assert_eq!(mirrored[0].first_air_date.as_deref(), Some("2011-04-17"));
        assert_eq!(store.labels(), vec!["Game of Thrones (2011)".to_string()]);
    }

    #[test]
    fn misfiled_dates_in_mirror_are_fixed_on_load() {
        let raw = r#"[{"id":1399,"mediaType":"tv","title":"Game of Thrones","posterPath":null,"releaseDate":"2011-04-17"}]"#;
        let store = FavoritesStore::load(Arc::new(MemoryStore::with_entry(FAVORITES_KEY, raw)));
        assert_eq!(store.all()[0].first_air_date.as_deref(), Some("2011-04-17"));
        assert_eq!(store.labels(), vec!["Game of Thrones (2011)".to_string()]);
    }

    #[test]
    fn storage_failures_leave_memory_authoritative() {
        let mut store = FavoritesStore::load(Arc::new(BrokenStore));
        assert!(store.is_empty());
        assert!(store.add(favorite(1, MediaType::Movie, "Inception")));
        assert!(store.contains(1, MediaType::Movie));
        assert_eq!(store.labels(), vec!["Inception (2010)".to_string()]);
    }
}
