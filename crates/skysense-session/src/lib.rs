//! Session layer for SkySense.
//!
//! `WeatherOrchestrator` owns what is on screen: the current snapshot and
//! forecast, loading and error flags, the location permission state, and a
//! cached view of favorites, history and settings.

pub mod orchestrator;
pub mod theme;

pub use orchestrator::{Outcome, SessionState, WeatherOrchestrator};
pub use theme::{NoopThemeSink, ThemeSink};
