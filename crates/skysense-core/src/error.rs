//! Centralized error types for SkySense.
//!
//! Every layer reports failures through a typed enum:
//! - `AcquisitionError` for anything that stops a weather lookup
//! - `StorageError` for failed writes to the local store
//! - `NetworkError` for transport-level classification inside the provider
//!
//! `AppError`, `AcquisitionError` and `StorageError` offer `user_message()` with short, non-technical text that the
//! session layer shows to the user verbatim.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0:#}")]
    Config(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Acquisition(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Config(_) => "SkySense settings could not be loaded. Check the config file.",
        }
    }
}

/// Why a weather acquisition did not produce a result.
///
/// Provider and transport faults are folded into these variants at the
/// provider boundary; nothing above it sees a raw `reqwest::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Place not found: {0}")]
    NotFound(String),

    #[error("No weather for coordinates: {0}")]
    LocationNotFound(String),

    #[error("Provider rejected the API credential")]
    Unauthorized,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Geolocation is not available on this platform")]
    CapabilityUnavailable,

    #[error("Location request timed out")]
    LocationTimeout,
}

impl AcquisitionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AcquisitionError::InvalidInput(_) => "Please enter a city name.",
            AcquisitionError::NotFound(_) => {
                "City not found. Check the city name or postal code."
            }
            AcquisitionError::LocationNotFound(_) => {
                "Could not find weather for your location."
            }
            AcquisitionError::Unauthorized => "Weather API key is invalid. Check settings.",
            AcquisitionError::Provider(_) => "Failed to fetch weather data. Please try again.",
            AcquisitionError::PermissionDenied => {
                "Location access was denied. Search for a city instead."
            }
            AcquisitionError::CapabilityUnavailable => {
                "Location is not supported on this device. Search for a city instead."
            }
            AcquisitionError::LocationTimeout => {
                "Finding your location took too long. Search for a city instead."
            }
        }
    }
}

impl From<NetworkError> for AcquisitionError {
    fn from(e: NetworkError) -> Self {
        AcquisitionError::Provider(e.to_string())
    }
}

/// Local store errors. Reads never fail (they degrade to defaults); only
/// writes surface these.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage open failed: {0}")]
    OpenFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::OpenFailed(_) => "Unable to access local data. Try restarting the app.",
            StorageError::WriteFailed(_) => "Could not save your changes. Please try again.",
            StorageError::Serialization(_) => "Could not save your changes. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            rusqlite::Error::SqliteFailure(_, _) => StorageError::WriteFailed(self.to_string()),
            _ => StorageError::OpenFailed(self.to_string()),
        }
    }
}
