//! Gemini `generateContent` client
//!
//! The model is asked for a JSON object matching a fixed response schema, so
//! the candidate text can be decoded straight into [`AnalysisResult`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::WeatherAnalyzer;
use crate::config::AnalysisConfig;
use crate::error::AeroWeatherError;
use crate::locale::Language;
use crate::models::{AnalysisResult, ForecastReport, WeatherObservation};
use crate::time::{self, ResolvedTime};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UNKNOWN_AIRPORT: &str = "Unknown";

pub struct GeminiAnalyzer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    language: Language,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "conditions_rating": { "type": "STRING" },
            "hazards": { "type": "ARRAY", "items": { "type": "STRING" } },
            "forecast_summary": { "type": "STRING" },
            "airport_name": { "type": "STRING" },
            "local_time": { "type": "STRING" }
        },
        "required": [
            "summary",
            "conditions_rating",
            "hazards",
            "forecast_summary",
            "airport_name",
            "local_time"
        ]
    })
}

impl GeminiAnalyzer {
    /// Build the client, or `None` when no API key is configured
    pub fn from_config(
        config: &AnalysisConfig,
        language: Language,
    ) -> Result<Option<Self>, AeroWeatherError> {
        let Some(api_key) = config.api_key.clone().filter(|key| !key.trim().is_empty()) else {
            info!("No analysis API key configured, AI analysis disabled");
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AeroWeatherError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            language,
        }))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_prompt(
        &self,
        observation: Option<&WeatherObservation>,
        forecast: Option<&ForecastReport>,
    ) -> String {
        let no_data = self.language.no_data();
        let metar = observation.map_or(no_data, |obs| obs.raw_ob.as_str());
        let taf = forecast.map_or(no_data, |taf| taf.raw_taf.as_str());
        let airport = observation
            .map(|obs| obs.icao_id.as_str())
            .or(forecast.map(|taf| taf.icao_id.as_str()))
            .filter(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_AIRPORT);
        let observed_at = match time::resolve(observation.and_then(|obs| obs.obs_time.as_ref())) {
            ResolvedTime::Instant(instant) => instant.to_rfc3339(),
            ResolvedTime::Unparsed(text) => text,
            ResolvedTime::Missing => UNKNOWN_AIRPORT.to_string(),
        };

        match self.language {
            Language::En => format!(
                "You are an aviation meteorologist. Analyze the reports for airport {airport}.\n\
                 Observation date/time (UTC): {observed_at}\n\
                 RAW METAR: {metar}\n\
                 RAW TAF: {taf}\n\
                 Return JSON with the fields:\n\
                 1. summary: one sentence describing the current weather.\n\
                 2. conditions_rating: flight conditions, one of Good / Difficult / Dangerous / No-fly.\n\
                 3. hazards: array of hazard phrases such as \"Thunderstorm\" or \"Fog\"; empty when there are none.\n\
                 4. forecast_summary: two or three sentences about the next hours.\n\
                 5. airport_name: only the city name, e.g. \"Almaty\" instead of \"Almaty International Airport\".\n\
                 6. local_time: local time of the observation as \"DD.MM HH:MM\" (e.g. \"24.05 14:30\"), computed from the UTC observation time and the airport time zone. Use XX for any part you cannot determine."
            ),
            Language::Ru => format!(
                "Ты - авиационный метеоролог. Проанализируй данные для аэропорта {airport}.\n\
                 Дата/Время наблюдения (UTC): {observed_at}\n\
                 RAW METAR: {metar}\n\
                 RAW TAF: {taf}\n\
                 Верни JSON с полями:\n\
                 1. summary: краткое описание текущей погоды одним предложением на русском.\n\
                 2. conditions_rating: оценка условий для полетов (Хорошие / Сложные / Опасные / Нелетные).\n\
                 3. hazards: массив строк с опасными явлениями (например: \"Гроза\", \"Туман\"). Если опасностей нет, верни пустой массив.\n\
                 4. forecast_summary: краткий прогноз на ближайшие часы на русском языке (2-3 предложения).\n\
                 5. airport_name: только название города на русском языке (например, \"Алматы\").\n\
                 6. local_time: местное время наблюдения в формате \"DD.MM HH:MM\" (например \"24.05 14:30\"). Если время определить нельзя, используй XX."
            ),
        }
    }
}

#[async_trait]
impl WeatherAnalyzer for GeminiAnalyzer {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn analyze(
        &self,
        observation: Option<&WeatherObservation>,
        forecast: Option<&ForecastReport>,
    ) -> Result<AnalysisResult, AeroWeatherError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: self.build_prompt(observation, forecast),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        debug!("Requesting analysis from {}", self.endpoint());
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Analysis request failed: {e}");
                AeroWeatherError::analysis(format!("Analysis request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis API returned {status}");
            return Err(AeroWeatherError::analysis(format!(
                "Analysis API error {status}: {body}"
            )));
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|e| {
            AeroWeatherError::analysis(format!("Failed to parse analysis response: {e}"))
        })?;
        let text = payload
            .text()
            .ok_or_else(|| AeroWeatherError::analysis("No response from AI"))?;

        let result: AnalysisResult = serde_json::from_str(&text).map_err(|e| {
            AeroWeatherError::analysis(format!("Analysis is not valid JSON: {e}"))
        })?;
        info!(rating = %result.conditions_rating, "Analysis received");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, api_key: Option<&str>) -> AnalysisConfig {
        AnalysisConfig {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout_seconds: 5,
        }
    }

    fn observation() -> WeatherObservation {
        serde_json::from_value(json!({
            "icaoId": "UAAA",
            "obsTime": 1700000000,
            "rawOb": "METAR UAAA 142213Z 00000MPS CAVOK M03/M06 Q1021 NOSIG"
        }))
        .unwrap()
    }

    fn candidate(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn test_no_api_key_disables_analyzer() {
        let analyzer = GeminiAnalyzer::from_config(&config("http://x", None), Language::En).unwrap();
        assert!(analyzer.is_none());
        let blank = GeminiAnalyzer::from_config(&config("http://x", Some("  ")), Language::En).unwrap();
        assert!(blank.is_none());
    }

    #[test]
    fn test_prompt_mentions_reports() {
        let analyzer = GeminiAnalyzer::from_config(&config("http://x", Some("k")), Language::En)
            .unwrap()
            .unwrap();
        let prompt = analyzer.build_prompt(Some(&observation()), None);
        assert!(prompt.contains("airport UAAA"));
        assert!(prompt.contains("2023-11-14T22:13:20+00:00"));
        assert!(prompt.contains("RAW TAF: No data"));
    }

    #[tokio::test]
    async fn test_analyze_decodes_candidate_text() {
        let server = MockServer::start().await;
        let analysis = json!({
            "summary": "Clear skies, calm wind.",
            "conditions_rating": "Good",
            "hazards": [],
            "forecast_summary": "No significant change expected.",
            "airport_name": "Almaty",
            "local_time": "15.11 03:13"
        });
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(&analysis.to_string())))
            .expect(1)
            .mount(&server)
            .await;

        let analyzer = GeminiAnalyzer::from_config(&config(&server.uri(), Some("secret")), Language::En)
            .unwrap()
            .unwrap();
        let result = analyzer.analyze(Some(&observation()), None).await.unwrap();

        assert_eq!(result.airport_name, "Almaty");
        assert_eq!(result.local_time, "15.11 03:13");
        assert!(result.hazards.is_empty());
    }

    #[tokio::test]
    async fn test_empty_candidate_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let analyzer = GeminiAnalyzer::from_config(&config(&server.uri(), Some("k")), Language::En)
            .unwrap()
            .unwrap();
        let err = analyzer.analyze(Some(&observation()), None).await.unwrap_err();
        assert!(matches!(err, AeroWeatherError::Analysis { .. }));
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let analyzer = GeminiAnalyzer::from_config(&config(&server.uri(), Some("k")), Language::En)
            .unwrap()
            .unwrap();
        let err = analyzer.analyze(Some(&observation()), None).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_non_json_candidate_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("sunny, probably")))
            .mount(&server)
            .await;

        let analyzer = GeminiAnalyzer::from_config(&config(&server.uri(), Some("k")), Language::En)
            .unwrap()
            .unwrap();
        assert!(analyzer.analyze(Some(&observation()), None).await.is_err());
    }

    #[tokio::test]
    async fn test_candidate_missing_a_field_is_an_error() {
        let server = MockServer::start().await;
        let partial = json!({
            "summary": "Clear skies.",
            "conditions_rating": "Good",
            "forecast_summary": "No change.",
            "airport_name": "Almaty",
            "local_time": "15.11 04:43"
        });
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(candidate(&partial.to_string())),
            )
            .mount(&server)
            .await;

        let analyzer = GeminiAnalyzer::from_config(&config(&server.uri(), Some("k")), Language::En)
            .unwrap()
            .unwrap();
        let err = analyzer.analyze(Some(&observation()), None).await.unwrap_err();
        assert!(matches!(err, AeroWeatherError::Analysis { .. }));
        assert!(err.to_string().contains("hazards"));
    }
}
