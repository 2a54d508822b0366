//! OpenWeatherMap response bodies. Only the fields we map are declared;
//! anything missing or mistyped fails deserialization and surfaces as a
//! provider error.

use serde::Deserialize;
use skysense_core::AcquisitionError;

use crate::forecast::{format_clock_time, round_half_up, Sample};
use crate::types::{ConditionTag, WeatherSnapshot};

/// m/s to km/h
const MS_TO_KMH: f64 = 3.6;

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentResponse {
    pub name: String,
    /// Shift in seconds from UTC
    #[serde(default)]
    pub timezone: i64,
    pub main: CurrentMain,
    pub wind: Wind,
    pub weather: Vec<Condition>,
    pub sys: Sys,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Wind {
    pub speed: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Condition {
    pub id: i32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Sys {
    #[serde(default)]
    pub country: String,
    pub sunrise: i64,
    pub sunset: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub list: Vec<ForecastItem>,
    #[serde(default)]
    pub city: ForecastCity,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastItem {
    pub dt: i64,
    pub main: ForecastMain,
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastMain {
    pub temp: f64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ForecastCity {
    #[serde(default)]
    pub timezone: i64,
}

/// Error body, e.g. `{"cod":"404","message":"city not found"}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl TryFrom<CurrentResponse> for WeatherSnapshot {
    type Error = AcquisitionError;

    fn try_from(resp: CurrentResponse) -> Result<Self, Self::Error> {
        let condition = resp.weather.first().ok_or_else(|| {
            AcquisitionError::Provider("current conditions carry no weather entry".into())
        })?;

        Ok(WeatherSnapshot {
            city: resp.name,
            country: resp.sys.country,
            temperature: round_half_up(resp.main.temp),
            feels_like: round_half_up(resp.main.feels_like),
            condition: ConditionTag::from_code(condition.id),
            condition_label: capitalize(&condition.description),
            humidity: resp.main.humidity,
            wind_speed: round_half_up(resp.wind.speed * MS_TO_KMH),
            sunrise: format_clock_time(resp.sys.sunrise, resp.timezone),
            sunset: format_clock_time(resp.sys.sunset, resp.timezone),
        })
    }
}

impl ForecastResponse {
    /// Validated samples in provider order.
    pub fn samples(&self) -> Result<Vec<Sample>, AcquisitionError> {
        self.list
            .iter()
            .map(|item| {
                let condition = item.weather.first().ok_or_else(|| {
                    AcquisitionError::Provider(format!(
                        "forecast sample at {} carries no weather entry",
                        item.dt
                    ))
                })?;
                Ok(Sample {
                    timestamp: item.dt,
                    temperature: item.main.temp,
                    condition_code: condition.id,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn london_json() -> serde_json::Value {
        serde_json::json!({
            "name": "London",
            "timezone": 3600,
            "main": { "temp": 14.6, "feels_like": 13.5, "humidity": 72 },
            "wind": { "speed": 4.1 },
            "weather": [{ "id": 801, "description": "few clouds" }],
            "sys": { "country": "GB", "sunrise": 1_717_214_700, "sunset": 1_717_273_800 }
        })
    }

    #[test]
    fn test_maps_current_conditions() {
        let resp: CurrentResponse = serde_json::from_value(london_json()).unwrap();
        let snapshot = WeatherSnapshot::try_from(resp).unwrap();

        assert_eq!(snapshot.city, "London");
        assert_eq!(snapshot.country, "GB");
        assert_eq!(snapshot.temperature, 15);
        assert_eq!(snapshot.feels_like, 14);
        assert_eq!(snapshot.condition, ConditionTag::Cloudy);
        assert_eq!(snapshot.condition_label, "Few clouds");
        assert_eq!(snapshot.humidity, 72);
        // 4.1 m/s = 14.76 km/h
        assert_eq!(snapshot.wind_speed, 15);
        // 04:05 UTC + 1h
        assert_eq!(snapshot.sunrise, "05:05 AM");
    }

    #[test]
    fn test_missing_weather_entry_is_provider_error() {
        let mut json = london_json();
        json["weather"] = serde_json::json!([]);
        let resp: CurrentResponse = serde_json::from_value(json).unwrap();

        let err = WeatherSnapshot::try_from(resp).unwrap_err();
        assert!(matches!(err, AcquisitionError::Provider(_)));
    }

    #[test]
    fn test_missing_required_field_fails_to_parse() {
        let mut json = london_json();
        json.as_object_mut().unwrap().remove("main");
        assert!(serde_json::from_value::<CurrentResponse>(json).is_err());
    }

    #[test]
    fn test_missing_country_is_empty() {
        let mut json = london_json();
        json["sys"].as_object_mut().unwrap().remove("country");
        let resp: CurrentResponse = serde_json::from_value(json).unwrap();
        assert_eq!(WeatherSnapshot::try_from(resp).unwrap().country, "");
    }

    #[test]
    fn test_forecast_samples() {
        let resp: ForecastResponse = serde_json::from_value(serde_json::json!({
            "list": [
                { "dt": 100, "main": { "temp": 1.5 }, "weather": [{ "id": 500 }] },
                { "dt": 200, "main": { "temp": 2.5 }, "weather": [{ "id": 800 }] }
            ],
            "city": { "timezone": -18000 }
        }))
        .unwrap();

        assert_eq!(resp.city.timezone, -18000);
        let samples = resp.samples().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].condition_code, 800);
    }

    #[test]
    fn test_forecast_sample_without_weather_is_provider_error() {
        let resp: ForecastResponse = serde_json::from_value(serde_json::json!({
            "list": [{ "dt": 100, "main": { "temp": 1.5 }, "weather": [] }]
        }))
        .unwrap();

        assert!(matches!(resp.samples(), Err(AcquisitionError::Provider(_))));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("light rain"), "Light rain");
        assert_eq!(capitalize(""), "");
    }
}
