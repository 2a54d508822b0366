use serde::{Deserialize, Serialize};

/// Presentation condition, classified from OpenWeatherMap condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConditionTag {
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
    Foggy,
    #[default]
    Default,
}

impl ConditionTag {
    /// Classify an OpenWeatherMap condition code.
    /// See: https://openweathermap.org/weather-conditions
    ///
    /// Total over `i32`: anything outside the documented groups is `Default`.
    /// Snow (6xx) has no dedicated tag and also lands on `Default`.
    /// The 9xx extreme and additional codes are not clouds, so they are
    /// `Default` too even though they sort above 801..=899.
    pub fn from_code(code: i32) -> Self {
        match code {
            200..=299 => Self::Stormy,
            300..=599 => Self::Rainy, // drizzle + rain
            700..=799 => Self::Foggy, // mist, haze, fog and other atmosphere
            800 => Self::Sunny,
            801..=899 => Self::Cloudy,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
            Self::Stormy => "stormy",
            Self::Foggy => "foggy",
            Self::Default => "default",
        }
    }

    /// Short advice line shown under the current conditions.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Sunny => "Use sunscreen and stay hydrated!",
            Self::Cloudy => "A light jacket is recommended.",
            Self::Rainy => "Don't forget your umbrella!",
            Self::Stormy => "Stay indoors if possible.",
            Self::Foggy => "Drive carefully, visibility is low.",
            Self::Default => "Have a great day!",
        }
    }
}

impl std::fmt::Display for ConditionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic location reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Current conditions for one place. Temperatures are whole degrees Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    /// ISO 3166 country code, empty when the provider has none
    pub country: String,
    pub temperature: i32,
    pub feels_like: i32,
    pub condition: ConditionTag,
    /// Provider description, first letter capitalized
    pub condition_label: String,
    pub humidity: u8,
    /// km/h
    pub wind_speed: i32,
    /// Place-local 12 hour clock, e.g. "06:05 AM"
    pub sunrise: String,
    pub sunset: String,
}

/// One future day. `high >= low` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// e.g. "Jan 5"
    pub date: String,
    /// e.g. "Mon"
    pub day: String,
    pub high: i32,
    pub low: i32,
    pub condition: ConditionTag,
}

/// Result of one successful acquisition: both halves or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub weather: WeatherSnapshot,
    pub forecast: Vec<ForecastDay>,
}
