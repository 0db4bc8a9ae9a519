//! AI analysis of weather reports

use async_trait::async_trait;

use crate::error::AeroWeatherError;
use crate::models::{AnalysisResult, ForecastReport, WeatherObservation};

pub mod cache;
pub mod gemini;

pub use cache::AnalysisCache;
pub use gemini::GeminiAnalyzer;

/// Produces a natural-language analysis of an observation/forecast pair.
///
/// At least one of the two reports is present whenever this is called.
#[async_trait]
pub trait WeatherAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        observation: Option<&WeatherObservation>,
        forecast: Option<&ForecastReport>,
    ) -> Result<AnalysisResult, AeroWeatherError>;
}
