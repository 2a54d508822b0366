//! Weather acquisition for SkySense
//!
//! Resolves a free-text place, a postal code or a coordinate pair into a
//! normalized current-conditions snapshot plus a five day forecast, using the
//! OpenWeatherMap REST API. Also defines the platform geolocation contract.

pub mod forecast;
pub mod location;
pub mod provider;
pub mod types;

mod schema;

pub use forecast::{aggregate_daily, Sample, FORECAST_DAYS};
pub use location::{
    Geolocator, LocationError, PermissionState, PermissionStatus, PositionOptions,
    UnsupportedGeolocator,
};
pub use provider::{OpenWeatherClient, PlaceQuery, WeatherSource};
pub use types::*;
