//! `AeroWeather` - aviation weather reports with AI-generated summaries
//!
//! This library fetches METAR/TAF reports, normalizes their units and times
//! into a display model, and caches the AI analysis of each report pair.

pub mod analysis;
pub mod api;
pub mod aviation_weather;
pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod gate;
pub mod local_time;
pub mod locale;
pub mod models;
pub mod service;
pub mod telemetry;
pub mod time;
pub mod units;
pub mod web;

// Re-export core types for public API
pub use analysis::{AnalysisCache, GeminiAnalyzer, WeatherAnalyzer};
pub use api::AppState;
pub use aviation_weather::{AviationWeatherClient, ReportKind, WeatherDataProvider};
pub use config::AeroWeatherConfig;
pub use display::{AnalysisState, WeatherDisplay};
pub use error::AeroWeatherError;
pub use gate::AccessGate;
pub use locale::Language;
pub use models::{AnalysisResult, ForecastReport, StationInfo, WeatherObservation};
pub use service::WeatherService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
