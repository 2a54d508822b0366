//! Shared foundation for SkySense: configuration, the error taxonomy and
//! logging setup used by every other crate in the workspace.

pub mod config;
pub mod error;

pub use config::{Config, LocationConfig, ProviderConfig, StorageConfig, ValidationResult};
pub use error::{
    AcquisitionError, AppError, NetworkError, ReqwestErrorExt, RusqliteErrorExt, StorageError,
};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to `info`. A second call is a no-op.
pub fn init() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("SkySense core initialized");
    }
}
