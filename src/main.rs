use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use aeroweather::analysis::{AnalysisCache, GeminiAnalyzer, WeatherAnalyzer};
use aeroweather::cache::CacheHandle;
use aeroweather::{
    AccessGate, AeroWeatherConfig, AppState, AviationWeatherClient, WeatherService, telemetry, web,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AeroWeatherConfig::load_from_path(config_path)?;
    let _telemetry = telemetry::init_tracing(&config.logging)?;

    tracing::info!(version = aeroweather::VERSION, "Starting AeroWeather");
    if config.access.key.is_none() {
        tracing::warn!("ACCESS_KEY not set, authorization disabled");
    }
    if config.cache.location.is_none() {
        tracing::info!("No cache location configured, analysis caching disabled");
    }

    let provider = AviationWeatherClient::new(&config.aviation_weather)
        .context("Failed to create weather data client")?;
    let analyzer = GeminiAnalyzer::from_config(&config.analysis, config.display.language)
        .context("Failed to create analysis client")?
        .map(|analyzer| Arc::new(analyzer) as Arc<dyn WeatherAnalyzer>);
    let cache = AnalysisCache::new(
        Arc::new(CacheHandle::new(config.cache.location.clone())),
        Duration::from_secs(config.cache.ttl_seconds),
    );

    let service = WeatherService::new(
        Arc::new(provider),
        analyzer,
        Arc::new(cache),
        config.display.language,
    )
    .with_analysis_timeout(Duration::from_secs(config.analysis.timeout_seconds));

    let state = AppState {
        service: Arc::new(service),
        gate: Arc::new(AccessGate::new(config.access.key.clone())),
    };

    let app = web::build_app(state, &config.server);
    web::run(app, &config.server).await
}
