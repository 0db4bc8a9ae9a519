//! Error types and handling for the `AeroWeather` service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the `AeroWeather` service
#[derive(Error, Debug)]
pub enum AeroWeatherError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Neither an observation nor a forecast exists for the station
    #[error("No weather data for station {station}")]
    NotFound { station: String },

    /// A required upstream data source failed
    #[error("Upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The AI collaborator failed or returned an unusable response
    #[error("Analysis error: {message}")]
    Analysis { message: String },

    /// Cache backend errors
    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl AeroWeatherError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(station: S) -> Self {
        Self::NotFound {
            station: station.into(),
        }
    }

    /// Create a new upstream error, keeping the upstream status when known
    pub fn upstream<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn analysis<S: Into<String>>(message: S) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            AeroWeatherError::Validation { .. } => StatusCode::BAD_REQUEST,
            AeroWeatherError::NotFound { .. } => StatusCode::NOT_FOUND,
            AeroWeatherError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AeroWeatherError::Config { .. }
            | AeroWeatherError::Analysis { .. }
            | AeroWeatherError::Cache { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AeroWeatherError::Config { .. } => "Server configuration error".to_string(),
            AeroWeatherError::NotFound { .. } => {
                "Airport not found or no data available.".to_string()
            }
            AeroWeatherError::Upstream { .. } => {
                "Failed to load weather data. Please try again.".to_string()
            }
            AeroWeatherError::Validation { message } => message.clone(),
            AeroWeatherError::Analysis { .. } => "Failed to analyze weather".to_string(),
            AeroWeatherError::Cache { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AeroWeatherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = match &self {
            AeroWeatherError::Analysis { message } => json!({
                "error": self.user_message(),
                "details": message,
            }),
            _ => json!({ "error": self.user_message() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = AeroWeatherError::config("missing API key");
        assert!(matches!(config_err, AeroWeatherError::Config { .. }));

        let upstream_err = AeroWeatherError::upstream(Some(503), "unavailable");
        assert!(matches!(
            upstream_err,
            AeroWeatherError::Upstream {
                status: Some(503),
                ..
            }
        ));

        let validation_err = AeroWeatherError::validation("bad station code");
        assert!(matches!(validation_err, AeroWeatherError::Validation { .. }));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AeroWeatherError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AeroWeatherError::not_found("ZZZZ").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AeroWeatherError::upstream(None, "down").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AeroWeatherError::config("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_user_messages() {
        let config_err = AeroWeatherError::config("GEMINI_API_KEY missing");
        assert_eq!(config_err.user_message(), "Server configuration error");

        let validation_err = AeroWeatherError::validation("Missing type or ids parameter");
        assert_eq!(validation_err.user_message(), "Missing type or ids parameter");

        let not_found = AeroWeatherError::not_found("ZZZZ");
        assert!(not_found.to_string().contains("ZZZZ"));
    }

    #[test]
    fn test_analysis_error_carries_details() {
        let err = AeroWeatherError::analysis("No response from AI");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Failed to analyze weather");
    }
}
