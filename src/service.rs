//! Station weather orchestration
//!
//! Loading a station runs in two phases. Reports are fetched concurrently and
//! decide success or failure of the whole request. Analysis runs afterwards
//! and can only degrade its own section of the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::analysis::{AnalysisCache, WeatherAnalyzer};
use crate::aviation_weather::WeatherDataProvider;
use crate::display::{self, AnalysisState, WeatherDisplay};
use crate::error::AeroWeatherError;
use crate::locale::Language;
use crate::models::{AnalysisResult, ForecastReport, StationInfo, WeatherObservation};

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything fetched for one station
#[derive(Debug, Clone, Default)]
pub struct StationReports {
    pub observation: Option<WeatherObservation>,
    pub forecast: Option<ForecastReport>,
    pub station: Option<StationInfo>,
}

pub struct WeatherService {
    provider: Arc<dyn WeatherDataProvider>,
    analyzer: Option<Arc<dyn WeatherAnalyzer>>,
    cache: Arc<AnalysisCache>,
    language: Language,
    analysis_timeout: Duration,
}

/// Normalize a station code; three or four ASCII letters or digits
pub fn validate_station_code(raw: &str) -> Result<String, AeroWeatherError> {
    let code = raw.trim().to_ascii_uppercase();
    if (3..=4).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(code)
    } else {
        Err(AeroWeatherError::validation("Invalid airport code"))
    }
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherDataProvider>,
        analyzer: Option<Arc<dyn WeatherAnalyzer>>,
        cache: Arc<AnalysisCache>,
        language: Language,
    ) -> Self {
        Self {
            provider,
            analyzer,
            cache,
            language,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn has_analyzer(&self) -> bool {
        self.analyzer.is_some()
    }

    pub fn provider(&self) -> &Arc<dyn WeatherDataProvider> {
        &self.provider
    }

    /// Fetch observation, forecast and station info concurrently.
    ///
    /// Fails with `NotFound` when neither an observation nor a forecast exists.
    #[instrument(skip(self))]
    pub async fn fetch_reports(&self, station: &str) -> Result<StationReports, AeroWeatherError> {
        let (observation, forecast, info) = tokio::join!(
            self.provider.fetch_observation(station),
            self.provider.fetch_forecast(station),
            self.provider.fetch_station(station),
        );

        let observation = observation?;
        let forecast = forecast.unwrap_or_else(|e| {
            warn!("Ignoring forecast failure: {e}");
            None
        });
        let station_info = info.unwrap_or_else(|e| {
            warn!("Ignoring station info failure: {e}");
            None
        });

        if observation.is_none() && forecast.is_none() {
            return Err(AeroWeatherError::not_found(station));
        }

        Ok(StationReports {
            observation,
            forecast,
            station: station_info,
        })
    }

    /// Analysis of a report pair, served from the cache when possible
    pub async fn analyze(
        &self,
        observation: Option<&WeatherObservation>,
        forecast: Option<&ForecastReport>,
    ) -> Result<AnalysisResult, AeroWeatherError> {
        if observation.is_none() && forecast.is_none() {
            return Err(AeroWeatherError::validation("No weather data provided"));
        }
        let analyzer = self
            .analyzer
            .as_ref()
            .ok_or_else(|| AeroWeatherError::config("Analysis API key is not configured"))?;

        self.cache
            .fetch_or_compute(observation, forecast, || {
                analyzer.analyze(observation, forecast)
            })
            .await
    }

    /// Full display model for a station
    #[instrument(skip(self, now))]
    pub async fn load(
        &self,
        station: &str,
        now: DateTime<Utc>,
    ) -> Result<WeatherDisplay, AeroWeatherError> {
        let station = validate_station_code(station)?;
        let reports = self.fetch_reports(&station).await?;
        let analysis = self.analysis_state(&reports).await;
        Ok(display::build(&station, &reports, analysis, now, self.language))
    }

    async fn analysis_state(&self, reports: &StationReports) -> AnalysisState {
        if self.analyzer.is_none() {
            return AnalysisState::Unavailable { retryable: false };
        }

        let analysis = self.analyze(reports.observation.as_ref(), reports.forecast.as_ref());
        match tokio::time::timeout(self.analysis_timeout, analysis).await {
            Ok(Ok(result)) => {
                info!("Analysis attached");
                AnalysisState::ready(result)
            }
            Ok(Err(e)) => {
                warn!("Analysis failed, showing weather without it: {e}");
                AnalysisState::Unavailable { retryable: true }
            }
            Err(_) => {
                warn!(
                    "Analysis timed out after {:?}, showing weather without it",
                    self.analysis_timeout
                );
                AnalysisState::Unavailable { retryable: true }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aviation_weather::{ReportKind, UpstreamResponse};
    use async_trait::async_trait;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticProvider {
        responses: HashMap<ReportKind, UpstreamResponse>,
    }

    impl StaticProvider {
        fn new(entries: &[(ReportKind, u16, &str)]) -> Arc<Self> {
            Arc::new(Self {
                responses: entries
                    .iter()
                    .map(|(kind, status, body)| {
                        (
                            *kind,
                            UpstreamResponse {
                                status: *status,
                                body: (*body).to_string(),
                            },
                        )
                    })
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl WeatherDataProvider for StaticProvider {
        async fn fetch_raw(
            &self,
            kind: ReportKind,
            _ids: &str,
        ) -> Result<UpstreamResponse, AeroWeatherError> {
            Ok(self.responses.get(&kind).cloned().unwrap_or(UpstreamResponse {
                status: 200,
                body: "[]".to_string(),
            }))
        }
    }

    struct CountingAnalyzer {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl WeatherAnalyzer for CountingAnalyzer {
        async fn analyze(
            &self,
            _observation: Option<&WeatherObservation>,
            _forecast: Option<&ForecastReport>,
        ) -> Result<AnalysisResult, AeroWeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(AnalysisResult {
                summary: "Calm.".into(),
                conditions_rating: "Good".into(),
                hazards: vec![],
                forecast_summary: "Steady.".into(),
                airport_name: "Almaty".into(),
                local_time: "15.11 03:13".into(),
            })
        }
    }

    const METAR: &str = r#"[{"icaoId":"UAAA","obsTime":1700000000,"rawOb":"METAR UAAA 142213Z"}]"#;
    const TAF: &str = r#"[{"icaoId":"UAAA","issueTime":1699981200,"rawTAF":"TAF UAAA 141700Z"}]"#;

    fn service(provider: Arc<StaticProvider>, analyzer: Option<Arc<CountingAnalyzer>>) -> WeatherService {
        WeatherService::new(
            provider,
            analyzer.map(|a| a as Arc<dyn WeatherAnalyzer>),
            Arc::new(AnalysisCache::disabled()),
            Language::En,
        )
    }

    fn analyzer(delay: Duration) -> Arc<CountingAnalyzer> {
        Arc::new(CountingAnalyzer {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    #[rstest]
    #[case(" uaaa ", Some("UAAA"))]
    #[case("KJFK", Some("KJFK"))]
    #[case("LAX", Some("LAX"))]
    #[case("UA", None)]
    #[case("UAAA1", None)]
    #[case("UA-A", None)]
    #[case("", None)]
    fn test_validate_station_code(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(validate_station_code(input).ok().as_deref(), expected);
    }

    #[tokio::test]
    async fn test_both_reports_absent_is_not_found() {
        let service = service(StaticProvider::new(&[]), None);
        let err = service.fetch_reports("ZZZZ").await.unwrap_err();
        assert!(matches!(err, AeroWeatherError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_forecast_alone_is_enough() {
        let provider = StaticProvider::new(&[(ReportKind::Metar, 404, ""), (ReportKind::Taf, 200, TAF)]);
        let reports = service(provider, None).fetch_reports("UAAA").await.unwrap();
        assert!(reports.observation.is_none());
        assert!(reports.forecast.is_some());
    }

    #[tokio::test]
    async fn test_metar_server_error_fails_the_load() {
        let provider = StaticProvider::new(&[(ReportKind::Metar, 503, ""), (ReportKind::Taf, 200, TAF)]);
        let err = service(provider, None).fetch_reports("UAAA").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_analysis_timeout_keeps_weather() {
        let provider = StaticProvider::new(&[(ReportKind::Metar, 200, METAR), (ReportKind::Taf, 200, TAF)]);
        let service = service(provider, Some(analyzer(Duration::from_secs(5))))
            .with_analysis_timeout(Duration::from_millis(20));

        let display = service.load("UAAA", Utc::now()).await.unwrap();
        assert!(matches!(display.analysis, AnalysisState::Unavailable { retryable: true }));
        assert!(display.conditions.is_some());
        assert!(display.forecast.is_some());
        assert!(!display.clock.is_local);
    }

    #[tokio::test]
    async fn test_analysis_ready_overlays_local_time() {
        let provider = StaticProvider::new(&[(ReportKind::Metar, 200, METAR)]);
        let counting = analyzer(Duration::ZERO);
        let service = service(provider, Some(counting.clone()));

        let display = service.load("uaaa", Utc::now()).await.unwrap();
        assert!(matches!(display.analysis, AnalysisState::Ready { .. }));
        assert!(display.clock.is_local);
        assert_eq!(display.city_name, "Almaty");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_without_analyzer_analysis_is_not_retryable() {
        let provider = StaticProvider::new(&[(ReportKind::Metar, 200, METAR)]);
        let service = service(provider, None);

        let display = service.load("UAAA", Utc::now()).await.unwrap();
        assert!(matches!(display.analysis, AnalysisState::Unavailable { retryable: false }));

        let err = service.analyze(None, None).await.unwrap_err();
        assert!(matches!(err, AeroWeatherError::Validation { .. }));
    }
}
