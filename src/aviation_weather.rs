//! Client for the aviationweather.gov data API
//!
//! Every endpoint answers with a JSON array of zero or more records. Only the
//! first record is used. An empty body, an empty array or a body that does not
//! decode all mean "no data", which is not an error.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::AviationWeatherConfig;
use crate::error::AeroWeatherError;
use crate::models::{ForecastReport, StationInfo, WeatherObservation};

/// Report type served by the data API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Metar,
    Taf,
    Station,
}

impl ReportKind {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "metar" => Some(ReportKind::Metar),
            "taf" => Some(ReportKind::Taf),
            "station" => Some(ReportKind::Station),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Metar => "metar",
            ReportKind::Taf => "taf",
            ReportKind::Station => "station",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream answer, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of raw aviation weather records.
///
/// `fetch_raw` only fails on transport errors; any HTTP answer, including
/// error statuses, comes back as an [`UpstreamResponse`].
#[async_trait]
pub trait WeatherDataProvider: Send + Sync {
    async fn fetch_raw(
        &self,
        kind: ReportKind,
        ids: &str,
    ) -> Result<UpstreamResponse, AeroWeatherError>;

    /// Latest METAR. A 404 is absence, any other failure status is an error.
    async fn fetch_observation(
        &self,
        station: &str,
    ) -> Result<Option<WeatherObservation>, AeroWeatherError> {
        let response = self.fetch_raw(ReportKind::Metar, station).await?;
        match response.status {
            _ if response.is_success() => Ok(first_record(&response.body, ReportKind::Metar)),
            404 => Ok(None),
            status => {
                warn!(station, status, "METAR fetch failed");
                Err(AeroWeatherError::upstream(
                    Some(status),
                    format!("Upstream error: {status}"),
                ))
            }
        }
    }

    /// Latest TAF. Many stations have none, so every failure is absence.
    async fn fetch_forecast(
        &self,
        station: &str,
    ) -> Result<Option<ForecastReport>, AeroWeatherError> {
        optional_record(self.fetch_raw(ReportKind::Taf, station).await, ReportKind::Taf, station)
    }

    async fn fetch_station(
        &self,
        station: &str,
    ) -> Result<Option<StationInfo>, AeroWeatherError> {
        optional_record(
            self.fetch_raw(ReportKind::Station, station).await,
            ReportKind::Station,
            station,
        )
    }
}

fn optional_record<T: DeserializeOwned>(
    response: Result<UpstreamResponse, AeroWeatherError>,
    kind: ReportKind,
    station: &str,
) -> Result<Option<T>, AeroWeatherError> {
    match response {
        Ok(response) if response.is_success() => Ok(first_record(&response.body, kind)),
        Ok(response) => {
            warn!(station, status = response.status, "{kind} fetch failed, treating as absent");
            Ok(None)
        }
        Err(e) => {
            warn!(station, "{kind} fetch failed, treating as absent: {e}");
            Ok(None)
        }
    }
}

/// First element of a JSON array body, if there is one that decodes
pub fn first_record<T: DeserializeOwned>(body: &str, kind: ReportKind) -> Option<T> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let first = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(records)) => records.into_iter().next()?,
        Ok(Value::Null) => return None,
        Ok(other) => other,
        Err(e) => {
            warn!("{kind} response is not valid JSON: {e}");
            return None;
        }
    };

    match serde_json::from_value(first) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("{kind} record has an unexpected shape: {e}");
            None
        }
    }
}

/// HTTP client for aviationweather.gov
pub struct AviationWeatherClient {
    client: Client,
    base_url: String,
}

impl AviationWeatherClient {
    pub fn new(config: &AviationWeatherConfig) -> Result<Self, AeroWeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AeroWeatherError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, kind: ReportKind, ids: &str) -> String {
        format!(
            "{}/{}?ids={}&format=json",
            self.base_url,
            kind,
            urlencoding::encode(ids)
        )
    }
}

#[async_trait]
impl WeatherDataProvider for AviationWeatherClient {
    #[instrument(skip(self))]
    async fn fetch_raw(
        &self,
        kind: ReportKind,
        ids: &str,
    ) -> Result<UpstreamResponse, AeroWeatherError> {
        let url = self.url(kind, ids);
        debug!("Data API request URL: {url}");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Data API request failed: {e}");
            AeroWeatherError::upstream(None, format!("Request failed: {e}"))
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AeroWeatherError::upstream(Some(status), format!("Failed to read body: {e}")))?;
        debug!(status, bytes = body.len(), "Data API response received");

        Ok(UpstreamResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AviationWeatherClient {
        AviationWeatherClient::new(&AviationWeatherConfig {
            base_url: server.uri(),
            timeout_seconds: 5,
            user_agent: "AeroWeatherTest/1.0".to_string(),
        })
        .unwrap()
    }

    async fn respond(server: &MockServer, kind: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{kind}")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[rstest]
    #[case("", true)]
    #[case("   ", true)]
    #[case("[]", true)]
    #[case("null", true)]
    #[case("<html>busy</html>", true)]
    #[case(r#"[{"icaoId":"UAAA","rawOb":"METAR UAAA"}]"#, false)]
    fn test_first_record(#[case] body: &str, #[case] absent: bool) {
        let record: Option<WeatherObservation> = first_record(body, ReportKind::Metar);
        assert_eq!(record.is_none(), absent);
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!(ReportKind::parse("taf"), Some(ReportKind::Taf));
        assert_eq!(ReportKind::parse("pirep"), None);
        assert_eq!(ReportKind::parse("METAR"), None);
    }

    #[tokio::test]
    async fn test_fetch_raw_sends_query_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metar"))
            .and(query_param("ids", "UAAA"))
            .and(query_param("format", "json"))
            .and(header("user-agent", "AeroWeatherTest/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server).fetch_raw(ReportKind::Metar, "UAAA").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "[]");
    }

    #[tokio::test]
    async fn test_observation_takes_first_element() {
        let server = MockServer::start().await;
        respond(
            &server,
            "metar",
            200,
            r#"[{"icaoId":"UAAA","rawOb":"first"},{"icaoId":"UAAA","rawOb":"second"}]"#,
        )
        .await;

        let obs = client(&server).fetch_observation("UAAA").await.unwrap().unwrap();
        assert_eq!(obs.raw_ob, "first");
    }

    #[tokio::test]
    async fn test_observation_404_is_absent() {
        let server = MockServer::start().await;
        respond(&server, "metar", 404, "").await;
        assert!(client(&server).fetch_observation("ZZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_observation_server_error_propagates() {
        let server = MockServer::start().await;
        respond(&server, "metar", 500, "").await;
        let err = client(&server).fetch_observation("UAAA").await.unwrap_err();
        assert!(matches!(err, AeroWeatherError::Upstream { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn test_forecast_and_station_failures_are_absent() {
        let server = MockServer::start().await;
        respond(&server, "taf", 502, "").await;
        respond(&server, "station", 500, "").await;

        let client = client(&server);
        assert!(client.fetch_forecast("UAAA").await.unwrap().is_none());
        assert!(client.fetch_station("UAAA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_upstream_error() {
        let client = AviationWeatherClient::new(&AviationWeatherConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
            user_agent: "test".to_string(),
        })
        .unwrap();
        let err = client.fetch_raw(ReportKind::Metar, "UAAA").await.unwrap_err();
        assert!(matches!(err, AeroWeatherError::Upstream { status: None, .. }));
    }
}
