//! Platform geolocation contract and the permission state machine values.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skysense_core::{AcquisitionError, LocationConfig};

use crate::types::Location;

/// Where the session stands with respect to location access.
///
/// `Idle -> Requesting -> Granted | Denied | Unavailable`; startup probing may
/// land on `Granted`/`Denied`/`Unavailable` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Idle,
    Requesting,
    Granted,
    Denied,
    Unavailable,
}

impl PermissionState {
    /// True if a new position request may be issued from this state.
    pub fn can_request(self) -> bool {
        matches!(
            self,
            PermissionState::Idle | PermissionState::Granted | PermissionState::Denied
        )
    }
}

/// Answer of the platform's permission introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The platform would ask the user
    Prompt,
}

/// Options for a single position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may return
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::from(&LocationConfig::default())
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_secs(config.timeout_secs),
            maximum_age: Duration::from_secs(config.max_cached_age_secs),
        }
    }
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

impl From<LocationError> for AcquisitionError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::PermissionDenied => AcquisitionError::PermissionDenied,
            LocationError::ServiceUnavailable => AcquisitionError::CapabilityUnavailable,
            LocationError::Timeout => AcquisitionError::LocationTimeout,
            LocationError::Other(msg) => AcquisitionError::LocationNotFound(msg),
        }
    }
}

/// Platform geolocation as the session sees it.
pub trait Geolocator: Send + Sync {
    /// Whether the platform has a location service at all.
    fn has_capability(&self) -> bool;

    /// Current permission without prompting. `None` when the platform cannot
    /// be introspected.
    fn query_permission(&self) -> impl Future<Output = Option<PermissionStatus>> + Send;

    /// Ask for a fix, prompting the user if needed.
    fn current_position(
        &self,
        options: &PositionOptions,
    ) -> impl Future<Output = Result<Location, LocationError>> + Send;
}

/// Geolocator for platforms without a location service.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedGeolocator;

impl Geolocator for UnsupportedGeolocator {
    fn has_capability(&self) -> bool {
        false
    }

    async fn query_permission(&self) -> Option<PermissionStatus> {
        None
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Location, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}
