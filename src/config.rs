//! Configuration management for the `AeroWeather` service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::AeroWeatherError;
use crate::locale::Language;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Deployment variable holding the access secret
pub const ACCESS_KEY_VAR: &str = "ACCESS_KEY";
/// Deployment variable holding the AI credential
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Upper bound for analysis cache entries, in seconds
pub const MAX_CACHE_TTL_SECONDS: u64 = 900;

/// Root configuration structure for the `AeroWeather` service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AeroWeatherConfig {
    pub server: ServerConfig,
    pub access: AccessConfig,
    pub aviation_weather: AviationWeatherConfig,
    pub analysis: AnalysisConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    pub port: u16,
    /// Directory with the built single-page client
    pub static_dir: PathBuf,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
    /// PEM certificate chain; TLS is used when both cert and key are set
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

/// Access gate settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Shared secret; the gate is open when unset
    pub key: Option<String>,
}

/// aviationweather.gov data API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AviationWeatherConfig {
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// AI analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// API key; analysis is disabled when unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Analysis cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory; caching is disabled when unset
    pub location: Option<PathBuf>,
    pub ttl_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
    /// OTLP/HTTP endpoint for span export
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub language: Language,
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("frontend/dist")
}

fn default_request_timeout() -> u64 {
    60
}

fn default_aviation_weather_base_url() -> String {
    "https://aviationweather.gov/api/data".to_string()
}

fn default_aviation_weather_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; AeroWeather/1.0)".to_string()
}

fn default_analysis_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_analysis_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_analysis_timeout() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    MAX_CACHE_TTL_SECONDS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
            request_timeout_seconds: default_request_timeout(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for AviationWeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_aviation_weather_base_url(),
            timeout_seconds: default_aviation_weather_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_analysis_base_url(),
            model: default_analysis_model(),
            timeout_seconds: default_analysis_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: None,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl ServerConfig {
    /// Certificate and key paths, when TLS is configured
    #[must_use]
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.tls_cert.as_ref().zip(self.tls_key.as_ref())
    }
}

impl AeroWeatherConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. AEROWEATHER__SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("AEROWEATHER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        // Deployment variables win over everything else
        builder = builder
            .set_override_option("access.key", env::var(ACCESS_KEY_VAR).ok())
            .with_context(|| format!("Failed to apply {ACCESS_KEY_VAR}"))?
            .set_override_option("analysis.api_key", env::var(GEMINI_API_KEY_VAR).ok())
            .with_context(|| format!("Failed to apply {GEMINI_API_KEY_VAR}"))?;

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AeroWeatherConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aeroweather").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.bind.is_empty() {
            self.server.bind = default_bind();
        }
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.aviation_weather.base_url.is_empty() {
            self.aviation_weather.base_url = default_aviation_weather_base_url();
        }
        if self.aviation_weather.timeout_seconds == 0 {
            self.aviation_weather.timeout_seconds = default_aviation_weather_timeout();
        }
        if self.aviation_weather.user_agent.is_empty() {
            self.aviation_weather.user_agent = default_user_agent();
        }
        if self.analysis.base_url.is_empty() {
            self.analysis.base_url = default_analysis_base_url();
        }
        if self.analysis.model.is_empty() {
            self.analysis.model = default_analysis_model();
        }
        if self.analysis.timeout_seconds == 0 {
            self.analysis.timeout_seconds = default_analysis_timeout();
        }
        if self.cache.ttl_seconds == 0 {
            self.cache.ttl_seconds = default_cache_ttl();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        // Blank secrets from the environment mean "unset"
        if self.access.key.as_deref().is_some_and(str::is_empty) {
            self.access.key = None;
        }
        if self.analysis.api_key.as_deref().is_some_and(str::is_empty) {
            self.analysis.api_key = None;
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_tls()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.aviation_weather.timeout_seconds > 300 {
            return Err(
                AeroWeatherError::config("Weather data timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.analysis.timeout_seconds > 300 {
            return Err(AeroWeatherError::config("Analysis timeout cannot exceed 300 seconds").into());
        }

        if self.cache.ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(AeroWeatherError::config(format!(
                "Cache TTL cannot exceed {MAX_CACHE_TTL_SECONDS} seconds"
            ))
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AeroWeatherError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AeroWeatherError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather data", Some(&self.aviation_weather.base_url)),
            ("Analysis", Some(&self.analysis.base_url)),
            ("OTLP", self.logging.otlp_endpoint.as_ref()),
        ] {
            if let Some(url) = url
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                return Err(AeroWeatherError::config(format!(
                    "{name} URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_tls(&self) -> Result<()> {
        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            return Err(AeroWeatherError::config(
                "TLS needs both server.tls_cert and server.tls_key",
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AeroWeatherConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.aviation_weather.base_url, "https://aviationweather.gov/api/data");
        assert_eq!(config.analysis.model, "gemini-2.5-flash");
        assert_eq!(config.cache.ttl_seconds, 900);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.display.language, Language::En);
        assert!(config.access.key.is_none());
        assert!(config.cache.location.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AeroWeatherConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_cache_ttl_is_capped() {
        let mut config = AeroWeatherConfig::default();
        config.cache.ttl_seconds = 3600;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Cache TTL cannot exceed"));
    }

    #[test]
    fn test_tls_needs_both_paths() {
        let mut config = AeroWeatherConfig::default();
        config.server.tls_cert = Some(PathBuf::from("cert.pem"));
        assert!(config.validate().is_err());
        config.server.tls_key = Some(PathBuf::from("key.pem"));
        assert!(config.validate().is_ok());
        assert!(config.server.tls_paths().is_some());
    }

    #[test]
    fn test_apply_defaults_fills_zeroes_and_blank_secrets() {
        let mut config = AeroWeatherConfig::default();
        config.server.port = 0;
        config.cache.ttl_seconds = 0;
        config.analysis.api_key = Some(String::new());
        config.apply_defaults();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.cache.ttl_seconds, 900);
        assert!(config.analysis.api_key.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[cache]
location = "/var/cache/aeroweather"
ttl_seconds = 600

[display]
language = "ru"
"#
        )
        .unwrap();

        let config = AeroWeatherConfig::load_from_path(Some(path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.cache.ttl_seconds, 600);
        assert_eq!(
            config.cache.location,
            Some(PathBuf::from("/var/cache/aeroweather"))
        );
        assert_eq!(config.display.language, Language::Ru);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = AeroWeatherConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("aeroweather"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
