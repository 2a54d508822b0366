//! Acquisition orchestration and the location permission state machine.
//!
//! Every acquisition takes a generation number when it starts. Its result is
//! applied only if no newer acquisition has started since, so a slow response
//! can never overwrite a newer one.

use std::path::Path;

use parking_lot::Mutex;
use skysense_core::{AcquisitionError, AppError, Config, StorageError};
use skysense_store::{
    convert_temperature, FavoritePlace, HistoryEntry, Settings, SettingsPatch, WeatherStore,
};
use skysense_weather::{
    ConditionTag, ForecastDay, Geolocator, LocationError, OpenWeatherClient, PermissionState,
    PermissionStatus, PositionOptions, WeatherReport, WeatherSnapshot, WeatherSource,
};

use crate::theme::{NoopThemeSink, ThemeSink};

/// Everything the UI renders, as one consistent copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastDay>,
    /// Condition of the displayed weather, `Default` when nothing is shown
    pub condition: ConditionTag,
    pub is_loading: bool,
    /// User-facing message of the last failure
    pub error: Option<String>,
    pub permission: PermissionState,
    pub favorites: Vec<FavoritePlace>,
    pub history: Vec<HistoryEntry>,
    pub settings: Settings,
}

/// What happened to an acquisition that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The result is now displayed
    Applied,
    /// A newer acquisition started first; the result was dropped
    Superseded,
    /// Nothing was attempted
    Skipped,
}

struct Inner {
    view: SessionState,
    /// Latest generation handed out
    generation: u64,
}

pub struct WeatherOrchestrator<W, G> {
    source: W,
    geolocator: G,
    store: WeatherStore,
    theme_sink: Box<dyn ThemeSink>,
    position_options: PositionOptions,
    inner: Mutex<Inner>,
}

impl<G: Geolocator> WeatherOrchestrator<OpenWeatherClient, G> {
    /// Wire up the OpenWeatherMap client and the on-disk store from config.
    pub fn from_config(config: &Config, geolocator: G) -> Result<Self, AppError> {
        let source = OpenWeatherClient::new(&config.provider)?;
        let store = WeatherStore::open(config.database_path())?;
        Ok(Self::new(source, geolocator, store)
            .with_position_options(PositionOptions::from(&config.location)))
    }

    /// Load and validate the config file at `path` (writing defaults if it is
    /// missing), then wire up as `from_config` does.
    pub fn from_config_file(path: &Path, geolocator: G) -> Result<Self, AppError> {
        let (config, validation) = Config::load_validated_from(path)?;
        tracing::info!(
            "Loaded config from {} ({} warnings)",
            path.display(),
            validation.warnings.len()
        );
        Self::from_config(&config, geolocator)
    }
}

impl<W: WeatherSource, G: Geolocator> WeatherOrchestrator<W, G> {
    pub fn new(source: W, geolocator: G, store: WeatherStore) -> Self {
        Self {
            source,
            geolocator,
            store,
            theme_sink: Box::new(NoopThemeSink),
            position_options: PositionOptions::default(),
            inner: Mutex::new(Inner {
                view: SessionState::default(),
                generation: 0,
            }),
        }
    }

    pub fn with_position_options(mut self, options: PositionOptions) -> Self {
        self.position_options = options;
        self
    }

    pub fn with_theme_sink(mut self, sink: impl ThemeSink + 'static) -> Self {
        self.theme_sink = Box::new(sink);
        self
    }

    /// Hydrate favorites, history and settings from the store, apply the
    /// saved theme and probe location permission.
    ///
    /// If permission is already granted, an acquisition for the current
    /// position runs before this returns.
    pub async fn initialize(&self) -> Result<Outcome, AcquisitionError> {
        let settings = self.store.settings();
        {
            let mut inner = self.inner.lock();
            inner.view.favorites = self.store.favorites();
            inner.view.history = self.store.history();
            inner.view.settings = settings;
        }
        self.theme_sink.apply_theme(settings.theme);

        let permission = if !self.geolocator.has_capability() {
            PermissionState::Unavailable
        } else {
            match self.geolocator.query_permission().await {
                Some(PermissionStatus::Granted) => PermissionState::Granted,
                Some(PermissionStatus::Denied) => PermissionState::Denied,
                Some(PermissionStatus::Prompt) | None => PermissionState::Idle,
            }
        };
        self.set_permission(permission);
        tracing::info!("Session initialized, location permission {:?}", permission);

        if permission == PermissionState::Granted {
            self.acquire_position().await
        } else {
            Ok(Outcome::Skipped)
        }
    }

    /// Look up weather for a place name or postal code.
    ///
    /// Blank input is rejected without contacting the provider; the current
    /// display is kept and any in-flight acquisition is left alone.
    pub async fn search(&self, query: &str) -> Result<Outcome, AcquisitionError> {
        if query.trim().is_empty() {
            let err = AcquisitionError::InvalidInput("query is empty".to_string());
            self.inner.lock().view.error = Some(err.user_message().to_string());
            return Err(err);
        }

        let generation = self.begin();
        tracing::info!("Searching weather for {:?} (generation {})", query, generation);

        let result = self.source.resolve_by_query(query).await;
        self.complete(generation, result, true)
    }

    /// Ask the platform for the current position and show its weather.
    ///
    /// Ignored while a request is in flight or when the platform has no
    /// location service.
    pub async fn request_location(&self) -> Result<Outcome, AcquisitionError> {
        let current = self.permission();
        if !current.can_request() {
            tracing::debug!("Location request ignored in state {:?}", current);
            return Ok(Outcome::Skipped);
        }

        if !self.geolocator.has_capability() {
            self.set_permission(PermissionState::Unavailable);
            let err = AcquisitionError::CapabilityUnavailable;
            self.inner.lock().view.error = Some(err.user_message().to_string());
            return Err(err);
        }

        self.set_permission(PermissionState::Requesting);
        self.acquire_position().await
    }

    async fn acquire_position(&self) -> Result<Outcome, AcquisitionError> {
        let generation = self.begin();
        let options = self.position_options;

        let position = match tokio::time::timeout(
            options.timeout,
            self.geolocator.current_position(&options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        let location = match position {
            Ok(location) => {
                self.set_permission(PermissionState::Granted);
                location
            }
            Err(e) => {
                let settled = self.permission_after_failure(&e).await;
                tracing::warn!("Location request failed: {} (permission {:?})", e, settled);
                self.set_permission(settled);
                return self.complete(generation, Err(e.into()), false);
            }
        };

        tracing::info!(
            "Got location {:.4}, {:.4} (generation {})",
            location.latitude,
            location.longitude,
            generation
        );
        let result = self
            .source
            .resolve_by_coordinates(location.latitude, location.longitude)
            .await;
        self.complete(generation, result, false)
    }

    /// Terminal permission state for a failed position request.
    ///
    /// Timeouts settle on `Denied` so the UI falls back to manual search while
    /// still allowing a retry.
    async fn permission_after_failure(&self, error: &LocationError) -> PermissionState {
        match error {
            LocationError::PermissionDenied | LocationError::Timeout => PermissionState::Denied,
            LocationError::ServiceUnavailable => PermissionState::Unavailable,
            LocationError::Other(_) => match self.geolocator.query_permission().await {
                Some(PermissionStatus::Granted) => PermissionState::Granted,
                Some(PermissionStatus::Denied) => PermissionState::Denied,
                Some(PermissionStatus::Prompt) | None => PermissionState::Idle,
            },
        }
    }

    /// Start an acquisition: new generation, loading on, error cleared.
    fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.view.is_loading = true;
        inner.view.error = None;
        inner.generation
    }

    fn complete(
        &self,
        generation: u64,
        result: Result<WeatherReport, AcquisitionError>,
        record_history: bool,
    ) -> Result<Outcome, AcquisitionError> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(
                "Dropping result of generation {} (latest is {})",
                generation,
                inner.generation
            );
            return match result {
                Ok(_) => Ok(Outcome::Superseded),
                Err(e) => Err(e),
            };
        }

        let view = &mut inner.view;
        view.is_loading = false;

        match result {
            Ok(report) => {
                if record_history {
                    if let Err(e) = self
                        .store
                        .add_history(&report.weather.city, &report.weather.country)
                    {
                        tracing::error!("Failed to record search history: {}", e);
                    }
                    view.history = self.store.history();
                }

                // a blank search may have set an error after this one began
                view.error = None;
                view.condition = report.weather.condition;
                view.weather = Some(report.weather);
                view.forecast = report.forecast;
                Ok(Outcome::Applied)
            }
            Err(e) => {
                tracing::warn!("Acquisition {} failed: {}", generation, e);
                view.weather = None;
                view.forecast.clear();
                view.condition = ConditionTag::Default;
                view.error = Some(e.user_message().to_string());
                Err(e)
            }
        }
    }

    fn set_permission(&self, permission: PermissionState) {
        self.inner.lock().view.permission = permission;
    }

    fn storage_failed(&self, e: StorageError) -> StorageError {
        tracing::error!("Storage write failed: {}", e);
        self.inner.lock().view.error = Some(e.user_message().to_string());
        e
    }

    fn refresh_favorites(&self) {
        let favorites = self.store.favorites();
        self.inner.lock().view.favorites = favorites;
    }

    // Favorites

    pub fn add_favorite(&self, city: &str, country: &str) -> Result<FavoritePlace, StorageError> {
        let result = self.store.add_favorite(city, country);
        self.refresh_favorites();
        result.map_err(|e| self.storage_failed(e))
    }

    pub fn remove_favorite(&self, id: &str) -> Result<(), StorageError> {
        let result = self.store.remove_favorite(id);
        self.refresh_favorites();
        result.map_err(|e| self.storage_failed(e))
    }

    pub fn is_favorite(&self, city: &str) -> bool {
        self.store.is_favorite(city)
    }

    /// Add the place if it isn't a favorite, remove it if it is.
    /// Returns whether it is a favorite afterwards.
    pub fn toggle_favorite(&self, city: &str, country: &str) -> Result<bool, StorageError> {
        let result = self.store.toggle_favorite(city, country);
        self.refresh_favorites();
        result.map_err(|e| self.storage_failed(e))
    }

    // History

    pub fn clear_history(&self) -> Result<(), StorageError> {
        let result = self.store.clear_history();
        let history = self.store.history();
        self.inner.lock().view.history = history;
        result.map_err(|e| self.storage_failed(e))
    }

    // Settings

    pub fn toggle_temperature_unit(&self) -> Result<Settings, StorageError> {
        let unit = self.settings().temperature_unit.toggled();
        self.update_settings(SettingsPatch {
            temperature_unit: Some(unit),
            ..SettingsPatch::default()
        })
    }

    /// Flip light/dark, persist it and hand the new theme to the sink.
    pub fn toggle_theme(&self) -> Result<Settings, StorageError> {
        let theme = self.settings().theme.toggled();
        let settings = self.update_settings(SettingsPatch {
            theme: Some(theme),
            ..SettingsPatch::default()
        })?;
        self.theme_sink.apply_theme(settings.theme);
        Ok(settings)
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError> {
        let result = self.store.update_settings(patch);
        let settings = self.store.settings();
        self.inner.lock().view.settings = settings;
        result.map_err(|e| self.storage_failed(e))
    }

    /// Format a Celsius value in the preferred unit, e.g. "72°F".
    pub fn display_temperature(&self, celsius: i32) -> String {
        let unit = self.settings().temperature_unit;
        format!("{}°{}", convert_temperature(celsius, unit), unit.symbol())
    }

    // Read access

    pub fn state(&self) -> SessionState {
        self.inner.lock().view.clone()
    }

    pub fn weather(&self) -> Option<WeatherSnapshot> {
        self.inner.lock().view.weather.clone()
    }

    pub fn forecast(&self) -> Vec<ForecastDay> {
        self.inner.lock().view.forecast.clone()
    }

    pub fn condition(&self) -> ConditionTag {
        self.inner.lock().view.condition
    }

    /// Advice line for the displayed condition.
    pub fn suggestion(&self) -> &'static str {
        self.condition().suggestion()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().view.is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().view.error.clone()
    }

    pub fn permission(&self) -> PermissionState {
        self.inner.lock().view.permission
    }

    pub fn favorites(&self) -> Vec<FavoritePlace> {
        self.inner.lock().view.favorites.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().view.history.clone()
    }

    pub fn settings(&self) -> Settings {
        self.inner.lock().view.settings
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use skysense_weather::UnsupportedGeolocator;
    use tokio::sync::oneshot;

    type Reply = Result<WeatherReport, AcquisitionError>;

    /// Source whose answers are handed in by the test, one per call.
    #[derive(Default)]
    struct ManualSource {
        pending: Mutex<Vec<oneshot::Receiver<Reply>>>,
    }

    impl ManualSource {
        fn expect_call(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().push(rx);
            tx
        }

        async fn next(&self) -> Reply {
            let rx = self.pending.lock().remove(0);
            rx.await.unwrap()
        }
    }

    impl WeatherSource for ManualSource {
        async fn resolve_by_query(&self, _query: &str) -> Reply {
            self.next().await
        }

        async fn resolve_by_coordinates(&self, _latitude: f64, _longitude: f64) -> Reply {
            self.next().await
        }
    }

    fn report(city: &str, condition: ConditionTag) -> WeatherReport {
        WeatherReport {
            weather: WeatherSnapshot {
                city: city.to_string(),
                country: "XX".to_string(),
                temperature: 20,
                feels_like: 19,
                condition,
                condition_label: "Test".to_string(),
                humidity: 40,
                wind_speed: 7,
                sunrise: "06:00 AM".to_string(),
                sunset: "06:00 PM".to_string(),
            },
            forecast: Vec::new(),
        }
    }

    fn orchestrator() -> WeatherOrchestrator<ManualSource, UnsupportedGeolocator> {
        WeatherOrchestrator::new(
            ManualSource::default(),
            UnsupportedGeolocator,
            WeatherStore::in_memory().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_loading_flag_tracks_latest_acquisition() {
        let session = orchestrator();
        let first = session.source.expect_call();
        let second = session.source.expect_call();

        let run = async {
            let a = session.search("first");
            let b = session.search("second");
            tokio::join!(a, b)
        };
        let drive = async {
            tokio::task::yield_now().await;
            assert!(session.is_loading());
            second.send(Ok(report("Second", ConditionTag::Sunny))).unwrap();
            tokio::task::yield_now().await;
            first.send(Ok(report("First", ConditionTag::Stormy))).unwrap();
        };
        let ((a, b), ()) = tokio::join!(run, drive);

        assert_eq!(a.unwrap(), Outcome::Superseded);
        assert_eq!(b.unwrap(), Outcome::Applied);
        assert_eq!(session.weather().unwrap().city, "Second");
        assert_eq!(session.condition(), ConditionTag::Sunny);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_stale_failure_leaves_state_alone() {
        let session = orchestrator();
        let first = session.source.expect_call();
        let second = session.source.expect_call();

        let run = async { tokio::join!(session.search("first"), session.search("second")) };
        let drive = async {
            tokio::task::yield_now().await;
            second.send(Ok(report("Second", ConditionTag::Foggy))).unwrap();
            tokio::task::yield_now().await;
            first
                .send(Err(AcquisitionError::Provider("boom".into())))
                .unwrap();
        };
        let ((a, b), ()) = tokio::join!(run, drive);

        assert!(matches!(a, Err(AcquisitionError::Provider(_))));
        assert_eq!(b.unwrap(), Outcome::Applied);
        let state = session.state();
        assert!(state.error.is_none());
        assert_eq!(state.weather.unwrap().city, "Second");
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_applied_result_clears_blank_query_error() {
        let session = orchestrator();
        let pending = session.source.expect_call();

        let run = session.search("quito");
        let drive = async {
            tokio::task::yield_now().await;
            assert!(session.search("  ").await.is_err());
            assert!(session.error().is_some());
            pending.send(Ok(report("Quito", ConditionTag::Sunny))).unwrap();
        };
        let (outcome, ()) = tokio::join!(run, drive);

        assert_eq!(outcome.unwrap(), Outcome::Applied);
        assert_eq!(session.weather().unwrap().city, "Quito");
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_new_acquisition_clears_previous_error() {
        let session = orchestrator();

        session
            .source
            .expect_call()
            .send(Err(AcquisitionError::Unauthorized))
            .unwrap();
        assert!(session.search("x").await.is_err());
        assert_eq!(
            session.error().as_deref(),
            Some(AcquisitionError::Unauthorized.user_message())
        );

        session
            .source
            .expect_call()
            .send(Ok(report("Lima", ConditionTag::Cloudy)))
            .unwrap();
        session.search("lima").await.unwrap();
        assert!(session.error().is_none());
        assert_eq!(session.suggestion(), ConditionTag::Cloudy.suggestion());
    }

    #[tokio::test]
    async fn test_unsupported_platform_initializes_unavailable() {
        let session = orchestrator();
        assert_eq!(session.initialize().await.unwrap(), Outcome::Skipped);
        assert_eq!(session.permission(), PermissionState::Unavailable);
        assert_eq!(session.request_location().await.unwrap(), Outcome::Skipped);
    }
}
