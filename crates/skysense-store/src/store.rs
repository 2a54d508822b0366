//! Favorites, history and settings over the key-value backend.
//!
//! Every mutation reads the whole collection, changes it and writes it back.
//! Collections are independent; there is no cross-collection transaction.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use skysense_core::StorageError;
use std::path::Path;
use uuid::Uuid;

use crate::backend::KeyValueStore;
use crate::types::{FavoritePlace, HistoryEntry, Settings, SettingsPatch};

const FAVORITES_KEY: &str = "skysense_favorites";
const HISTORY_KEY: &str = "skysense_history";
const SETTINGS_KEY: &str = "skysense_settings";

/// History keeps this many entries, newest first.
pub const MAX_HISTORY_ITEMS: usize = 10;

pub struct WeatherStore {
    kv: KeyValueStore,
}

impl WeatherStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Ok(Self::new(KeyValueStore::open(path)?))
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(KeyValueStore::in_memory()?))
    }

    pub fn new(kv: KeyValueStore) -> Self {
        Self { kv }
    }

    fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        decode(key, self.kv.get(key))
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.kv.set(key, &encode(value)?).map_err(|e| {
            tracing::error!("Failed to write {}: {}", key, e);
            e
        })
    }

    /// Load, edit and persist one collection without letting another
    /// mutation in between.
    fn modify<T, R>(
        &self,
        key: &str,
        edit: impl FnOnce(&mut T) -> Edit<R>,
    ) -> Result<R, StorageError>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        self.kv
            .update(key, |raw| {
                let mut value: T = decode(key, raw);
                match edit(&mut value) {
                    Edit::Keep(output) => Ok((None, output)),
                    Edit::Save(output) => Ok((Some(encode(&value)?), output)),
                }
            })
            .map_err(|e| {
                tracing::error!("Failed to write {}: {}", key, e);
                e
            })
    }

    // Favorites

    pub fn favorites(&self) -> Vec<FavoritePlace> {
        self.read(FAVORITES_KEY)
    }

    /// Add a favorite, or return the existing one with the same city
    /// (case-insensitive). New favorites go first.
    pub fn add_favorite(&self, city: &str, country: &str) -> Result<FavoritePlace, StorageError> {
        self.modify(FAVORITES_KEY, |favorites: &mut Vec<FavoritePlace>| {
            if let Some(existing) = favorites.iter().find(|f| same_city(&f.city, city)) {
                return Edit::Keep(existing.clone());
            }

            let favorite = new_favorite(city, country);
            favorites.insert(0, favorite.clone());
            tracing::info!("Added favorite {}, {}", city, country);
            Edit::Save(favorite)
        })
    }

    /// Remove by id. Unknown ids are ignored.
    pub fn remove_favorite(&self, id: &str) -> Result<(), StorageError> {
        self.modify(FAVORITES_KEY, |favorites: &mut Vec<FavoritePlace>| {
            let before = favorites.len();
            favorites.retain(|f| f.id != id);
            if favorites.len() == before {
                Edit::Keep(())
            } else {
                Edit::Save(())
            }
        })
    }

    /// Remove the city if it is a favorite, add it otherwise. Returns whether
    /// it is a favorite afterwards.
    pub fn toggle_favorite(&self, city: &str, country: &str) -> Result<bool, StorageError> {
        self.modify(FAVORITES_KEY, |favorites: &mut Vec<FavoritePlace>| {
            let before = favorites.len();
            favorites.retain(|f| !same_city(&f.city, city));
            if favorites.len() != before {
                tracing::info!("Removed favorite {}", city);
                return Edit::Save(false);
            }

            favorites.insert(0, new_favorite(city, country));
            tracing::info!("Added favorite {}, {}", city, country);
            Edit::Save(true)
        })
    }

    pub fn is_favorite(&self, city: &str) -> bool {
        self.favorites().iter().any(|f| same_city(&f.city, city))
    }

    // History

    /// Newest first, at most `MAX_HISTORY_ITEMS`.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut history: Vec<HistoryEntry> = self.read(HISTORY_KEY);
        history.truncate(MAX_HISTORY_ITEMS);
        history
    }

    /// Record a search. A previous entry for the same city is replaced and the
    /// new one moves to the front; the oldest entries fall off past the cap.
    pub fn add_history(&self, city: &str, country: &str) -> Result<HistoryEntry, StorageError> {
        self.modify(HISTORY_KEY, |history: &mut Vec<HistoryEntry>| {
            history.retain(|h| !same_city(&h.city, city));

            let entry = HistoryEntry {
                id: Uuid::new_v4().to_string(),
                city: city.to_string(),
                country: country.to_string(),
                searched_at: Utc::now(),
            };
            history.insert(0, entry.clone());
            history.truncate(MAX_HISTORY_ITEMS);
            Edit::Save(entry)
        })
    }

    pub fn clear_history(&self) -> Result<(), StorageError> {
        self.write::<[HistoryEntry]>(HISTORY_KEY, &[])
    }

    // Settings

    pub fn settings(&self) -> Settings {
        self.read(SETTINGS_KEY)
    }

    /// Merge `patch` onto the stored settings, persist and return the result.
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError> {
        self.modify(SETTINGS_KEY, |settings: &mut Settings| {
            *settings = patch.apply(*settings);
            Edit::Save(*settings)
        })
    }
}

/// What a collection edit did.
enum Edit<R> {
    /// Nothing changed; skip the write
    Keep(R),
    Save(R),
}

fn decode<T: DeserializeOwned + Default>(key: &str, raw: Option<String>) -> T {
    let Some(raw) = raw else {
        return T::default();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!("Discarding unreadable {}: {}", key, e);
        T::default()
    })
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn new_favorite(city: &str, country: &str) -> FavoritePlace {
    FavoritePlace {
        id: Uuid::new_v4().to_string(),
        city: city.to_string(),
        country: country.to_string(),
        added_at: Utc::now(),
    }
}

fn same_city(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::types::{TemperatureUnit, Theme};

    fn store() -> WeatherStore {
        WeatherStore::in_memory().unwrap()
    }

    #[test]
    fn test_empty_store_reads_defaults() {
        let store = store();
        assert!(store.favorites().is_empty());
        assert!(store.history().is_empty());
        assert_eq!(store.settings(), Settings::default());
    }

    #[test]
    fn test_add_favorite_prepends() {
        let store = store();
        store.add_favorite("London", "GB").unwrap();
        store.add_favorite("Paris", "FR").unwrap();

        let favorites = store.favorites();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].city, "Paris");
        assert_eq!(favorites[1].city, "London");
    }

    #[test]
    fn test_duplicate_favorite_returns_original() {
        let store = store();
        let first = store.add_favorite("London", "GB").unwrap();
        let second = store.add_favorite("LONDON", "GB").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.favorites().len(), 1);
    }

    #[test]
    fn test_remove_and_contains_favorite() {
        let store = store();
        let fav = store.add_favorite("Tokyo", "JP").unwrap();
        assert!(store.is_favorite("tokyo"));

        store.remove_favorite(&fav.id).unwrap();
        assert!(!store.is_favorite("Tokyo"));

        store.remove_favorite("missing-id").unwrap();
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn test_history_dedupes_case_insensitively() {
        let store = store();
        let first = store.add_history("London", "GB").unwrap();
        store.add_history("Paris", "FR").unwrap();
        let again = store.add_history("london", "GB").unwrap();

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, again.id);
        assert_ne!(history[0].id, first.id);
        assert_eq!(history[0].city, "london");
        assert_eq!(history[1].city, "Paris");
        assert!(history[0].searched_at >= history[1].searched_at);
    }

    #[test]
    fn test_history_cap_evicts_oldest() {
        let store = store();
        for i in 0..=MAX_HISTORY_ITEMS {
            store.add_history(&format!("City {}", i), "XX").unwrap();
        }

        let history = store.history();
        assert_eq!(history.len(), MAX_HISTORY_ITEMS);
        assert_eq!(history[0].city, "City 10");
        assert!(history.iter().all(|h| h.city != "City 0"));
    }

    #[test]
    fn test_toggle_favorite() {
        let store = store();
        assert!(store.toggle_favorite("Quito", "EC").unwrap());
        assert!(store.is_favorite("quito"));
        assert!(!store.toggle_favorite("QUITO", "EC").unwrap());
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn test_clear_history() {
        let store = store();
        store.add_history("Oslo", "NO").unwrap();
        store.clear_history().unwrap();
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_update_settings_merges() {
        let store = store();
        let updated = store
            .update_settings(SettingsPatch {
                temperature_unit: Some(TemperatureUnit::F),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(updated.temperature_unit, TemperatureUnit::F);
        assert_eq!(updated.theme, Theme::Light);

        let updated = store
            .update_settings(SettingsPatch {
                theme: Some(Theme::Dark),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(updated.temperature_unit, TemperatureUnit::F);
        assert_eq!(store.settings(), updated);
    }

    #[test]
    fn test_corrupted_collections_degrade() {
        let kv = KeyValueStore::in_memory().unwrap();
        kv.set(FAVORITES_KEY, "{not json").unwrap();
        kv.set(HISTORY_KEY, "42").unwrap();
        kv.set(SETTINGS_KEY, "[]").unwrap();
        let store = WeatherStore::new(kv);

        assert!(store.favorites().is_empty());
        assert!(store.history().is_empty());
        assert_eq!(store.settings(), Settings::default());

        // and recover on the next write
        store.add_favorite("Rome", "IT").unwrap();
        assert_eq!(store.favorites().len(), 1);
    }
}
