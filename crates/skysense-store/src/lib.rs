//! Local persistence for SkySense: favorite places, search history and
//! display settings, each stored as one JSON document in SQLite.

pub mod backend;
pub mod store;
pub mod types;

pub use backend::KeyValueStore;
pub use store::{WeatherStore, MAX_HISTORY_ITEMS};
pub use types::{
    convert_temperature, FavoritePlace, HistoryEntry, Settings, SettingsPatch, TemperatureUnit,
    Theme,
};
