use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A place the user pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritePlace {
    pub id: String,
    pub city: String,
    pub country: String,
    pub added_at: DateTime<Utc>,
}

/// A successful text search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub city: String,
    pub country: String,
    pub searched_at: DateTime<Utc>,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TemperatureUnit {
    #[default]
    C,
    F,
}

impl TemperatureUnit {
    pub fn toggled(self) -> Self {
        match self {
            TemperatureUnit::C => TemperatureUnit::F,
            TemperatureUnit::F => TemperatureUnit::C,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::C => "C",
            TemperatureUnit::F => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Display preferences. Missing fields in stored JSON take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub temperature_unit: TemperatureUnit,
    pub theme: Theme,
}

/// Fields to change in `Settings`; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsPatch {
    pub temperature_unit: Option<TemperatureUnit>,
    pub theme: Option<Theme>,
}

impl SettingsPatch {
    pub fn apply(self, current: Settings) -> Settings {
        Settings {
            temperature_unit: self.temperature_unit.unwrap_or(current.temperature_unit),
            theme: self.theme.unwrap_or(current.theme),
        }
    }
}

/// Convert a whole-degree Celsius value for display.
///
/// Celsius passes through untouched; Fahrenheit is rounded half-up.
pub fn convert_temperature(celsius: i32, unit: TemperatureUnit) -> i32 {
    match unit {
        TemperatureUnit::C => celsius,
        TemperatureUnit::F => (f64::from(celsius) * 9.0 / 5.0 + 32.0 + 0.5).floor() as i32,
    }
}
