//! OpenWeatherMap client: one current-conditions call and one 5 day / 3 hour
//! forecast call per acquisition, issued together.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use skysense_core::{AcquisitionError, ProviderConfig, ReqwestErrorExt};
use tracing::instrument;

use crate::forecast::aggregate_daily;
use crate::schema::{CurrentResponse, ErrorBody, ForecastResponse};
use crate::types::{WeatherReport, WeatherSnapshot};

/// Anything that can turn a place or a coordinate pair into a report.
pub trait WeatherSource: Send + Sync {
    fn resolve_by_query(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<WeatherReport, AcquisitionError>> + Send;

    fn resolve_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<WeatherReport, AcquisitionError>> + Send;
}

/// A validated text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceQuery {
    /// Free-text place name, e.g. "london" or "Paris,FR"
    Name(String),
    /// 4 to 6 digit postal code
    PostalCode(String),
}

impl PlaceQuery {
    /// Trim and classify. Blank input is `InvalidInput`.
    pub fn parse(query: &str) -> Result<Self, AcquisitionError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(AcquisitionError::InvalidInput(
                "query is empty".to_string(),
            ));
        }

        let is_postal = (4..=6).contains(&trimmed.len())
            && trimmed.bytes().all(|b| b.is_ascii_digit());

        Ok(if is_postal {
            PlaceQuery::PostalCode(trimmed.to_string())
        } else {
            PlaceQuery::Name(trimmed.to_string())
        })
    }

    fn param(&self) -> (&'static str, String) {
        match self {
            PlaceQuery::Name(name) => ("q", name.clone()),
            PlaceQuery::PostalCode(code) => ("zip", code.clone()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            PlaceQuery::Name(s) | PlaceQuery::PostalCode(s) => s,
        }
    }
}

/// How a 404 on current conditions is reported.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Place,
    Coordinates,
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Current(Lookup),
    Forecast,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::Current(_) => "weather",
            Endpoint::Forecast => "forecast",
        }
    }
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    units: String,
}

impl std::fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("base_url", &self.base_url)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, AcquisitionError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AcquisitionError::from(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            units: config.units.clone(),
        })
    }

    async fn fetch(
        &self,
        location: (&'static str, String),
        extra: Option<(&'static str, String)>,
        lookup: Lookup,
        subject: &str,
    ) -> Result<WeatherReport, AcquisitionError> {
        let mut params = vec![
            location,
            ("appid", self.api_key.clone()),
            ("units", self.units.clone()),
        ];
        params.extend(extra);

        let (current, forecast) = tokio::join!(
            self.get_json::<CurrentResponse>(Endpoint::Current(lookup), &params, subject),
            self.get_json::<ForecastResponse>(Endpoint::Forecast, &params, subject),
        );

        // Current conditions decide the error when both fail.
        let current = current?;
        let forecast = forecast?;

        let weather = WeatherSnapshot::try_from(current)?;
        let samples = forecast.samples()?;
        let forecast = aggregate_daily(&samples, forecast.city.timezone);

        tracing::info!(
            "Resolved {} to {}, {} ({}, {} forecast days)",
            subject,
            weather.city,
            weather.country,
            weather.condition,
            forecast.len()
        );

        Ok(WeatherReport { weather, forecast })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        params: &[(&'static str, String)],
        subject: &str,
    ) -> Result<T, AcquisitionError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("{} request failed: {}", endpoint.path(), e);
                AcquisitionError::from(e.into_network_error())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AcquisitionError::from(e.into_network_error()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_default();
            tracing::debug!(
                "{} returned status {}: {}",
                endpoint.path(),
                status,
                message
            );
            return Err(map_status(status, endpoint, subject, &message));
        }

        serde_json::from_str(&body).map_err(|e| {
            AcquisitionError::Provider(format!("malformed {} response: {}", endpoint.path(), e))
        })
    }
}

fn map_status(
    status: StatusCode,
    endpoint: Endpoint,
    subject: &str,
    message: &str,
) -> AcquisitionError {
    match (status, endpoint) {
        (StatusCode::UNAUTHORIZED, _) => AcquisitionError::Unauthorized,
        (StatusCode::NOT_FOUND, Endpoint::Current(Lookup::Place)) => {
            AcquisitionError::NotFound(subject.to_string())
        }
        (StatusCode::NOT_FOUND, Endpoint::Current(Lookup::Coordinates)) => {
            AcquisitionError::LocationNotFound(subject.to_string())
        }
        _ if message.is_empty() => {
            AcquisitionError::Provider(format!("{} returned {}", endpoint.path(), status))
        }
        _ => AcquisitionError::Provider(format!(
            "{} returned {}: {}",
            endpoint.path(),
            status,
            message
        )),
    }
}

impl WeatherSource for OpenWeatherClient {
    #[instrument(skip(self), level = "info")]
    async fn resolve_by_query(&self, query: &str) -> Result<WeatherReport, AcquisitionError> {
        let place = PlaceQuery::parse(query)?;
        self.fetch(place.param(), None, Lookup::Place, place.as_str())
            .await
    }

    #[instrument(skip(self), level = "info")]
    async fn resolve_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherReport, AcquisitionError> {
        let subject = format!("{:.4}, {:.4}", latitude, longitude);
        self.fetch(
            ("lat", latitude.to_string()),
            Some(("lon", longitude.to_string())),
            Lookup::Coordinates,
            &subject,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_blank_query_is_invalid() {
        assert!(matches!(
            PlaceQuery::parse(""),
            Err(AcquisitionError::InvalidInput(_))
        ));
        assert!(matches!(
            PlaceQuery::parse("   \t"),
            Err(AcquisitionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_postal_code_detection() {
        assert_eq!(
            PlaceQuery::parse(" 110001 ").unwrap(),
            PlaceQuery::PostalCode("110001".into())
        );
        assert_eq!(
            PlaceQuery::parse("2000").unwrap(),
            PlaceQuery::PostalCode("2000".into())
        );
        assert_eq!(
            PlaceQuery::parse("123").unwrap(),
            PlaceQuery::Name("123".into())
        );
        assert_eq!(
            PlaceQuery::parse("1234567").unwrap(),
            PlaceQuery::Name("1234567".into())
        );
        assert_eq!(
            PlaceQuery::parse("london").unwrap(),
            PlaceQuery::Name("london".into())
        );
        assert_eq!(
            PlaceQuery::parse("10 001").unwrap(),
            PlaceQuery::Name("10 001".into())
        );
    }

    #[test]
    fn test_query_params() {
        assert_eq!(
            PlaceQuery::parse("94040").unwrap().param(),
            ("zip", "94040".to_string())
        );
        assert_eq!(
            PlaceQuery::parse("Paris").unwrap().param(),
            ("q", "Paris".to_string())
        );
    }

    #[test]
    fn test_status_mapping() {
        let place = Endpoint::Current(Lookup::Place);
        let coords = Endpoint::Current(Lookup::Coordinates);

        assert_eq!(
            map_status(StatusCode::UNAUTHORIZED, Endpoint::Forecast, "x", ""),
            AcquisitionError::Unauthorized
        );
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, place, "atlantis", "city not found"),
            AcquisitionError::NotFound("atlantis".into())
        );
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, coords, "0, 0", ""),
            AcquisitionError::LocationNotFound("0, 0".into())
        );
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, Endpoint::Forecast, "x", ""),
            AcquisitionError::Provider(_)
        ));
        assert!(matches!(
            map_status(StatusCode::INTERNAL_SERVER_ERROR, place, "x", "boom"),
            AcquisitionError::Provider(msg) if msg.contains("boom")
        ));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ProviderConfig {
            api_key: "secret-key".into(),
            ..ProviderConfig::default()
        };
        let client = OpenWeatherClient::new(&config).unwrap();
        assert!(!format!("{:?}", client).contains("secret-key"));
    }
}
