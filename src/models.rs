//! Data models for aviation weather reports and analysis results
//!
//! The report types mirror the JSON returned by the aviation weather data
//! service. Fields that arrive loosely typed upstream (times, visibility, wind
//! direction) are captured as tagged variants here and resolved into display
//! values by [`crate::units`] and [`crate::time`].

use serde::{Deserialize, Serialize};

use crate::time::RawTime;

/// Routine surface observation (METAR) as delivered by the data service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObservation {
    /// Station identifier (ICAO code)
    pub icao_id: String,
    /// Observation time, epoch seconds/milliseconds or a date string
    #[serde(default)]
    pub obs_time: Option<RawTime>,
    #[serde(default)]
    pub report_time: Option<RawTime>,
    #[serde(default)]
    pub receipt_time: Option<RawTime>,
    /// Temperature in Celsius
    #[serde(default)]
    pub temp: Option<f64>,
    /// Dew point in Celsius
    #[serde(default)]
    pub dewp: Option<f64>,
    /// Wind direction in degrees, or variable
    #[serde(default)]
    pub wdir: Option<WindDirection>,
    /// Wind speed in knots
    #[serde(default)]
    pub wspd: Option<f64>,
    /// Gust speed in knots
    #[serde(default)]
    pub wgst: Option<f64>,
    /// Visibility in meters or a statute-mile coded string
    #[serde(default)]
    pub visib: Option<VisibilityValue>,
    /// Altimeter setting in hPa
    #[serde(default)]
    pub altim: Option<f64>,
    /// Sea-level pressure in hPa
    #[serde(default)]
    pub slp: Option<f64>,
    #[serde(default)]
    pub clouds: Vec<CloudLayer>,
    /// Raw METAR text
    #[serde(default)]
    pub raw_ob: String,
}

/// Short-range aerodrome forecast (TAF)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub icao_id: String,
    #[serde(default)]
    pub issue_time: Option<RawTime>,
    #[serde(default)]
    pub bulletin_time: Option<RawTime>,
    #[serde(default)]
    pub valid_time_from: Option<RawTime>,
    #[serde(default)]
    pub valid_time_to: Option<RawTime>,
    /// Raw TAF text
    #[serde(rename = "rawTAF", default)]
    pub raw_taf: String,
    /// Structured forecast periods, when the service decodes them
    #[serde(default, alias = "fcsts")]
    pub forecast: Vec<ForecastPeriod>,
}

/// One change group of a TAF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    #[serde(rename = "fcst_time_from", alias = "timeFrom", default)]
    pub time_from: Option<RawTime>,
    #[serde(rename = "fcst_time_to", alias = "timeTo", default)]
    pub time_to: Option<RawTime>,
    /// FM, TEMPO, BECMG, PROB30 ...
    #[serde(rename = "change_indicator", alias = "fcstChange", default)]
    pub change_indicator: Option<String>,
    #[serde(default)]
    pub visib: Option<VisibilityValue>,
    #[serde(rename = "wx_string", alias = "wxString", default)]
    pub wx_string: Option<String>,
}

/// Station metadata. Not every provider has it, so it is always optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    pub icao_id: String,
    #[serde(default)]
    pub name: String,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Elevation in meters
    #[serde(default)]
    pub elev: Option<f64>,
    /// Country code
    #[serde(default)]
    pub country: Option<String>,
}

/// Cloud layer of an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudLayer {
    pub cover: CloudCover,
    /// Base height in feet
    #[serde(default)]
    pub base: Option<f64>,
    /// Convective type tag such as CB or TCU
    #[serde(rename = "type", default)]
    pub cloud_type: Option<String>,
}

/// Sky cover code of a cloud layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CloudCover {
    Few,
    Scattered,
    Broken,
    Overcast,
    VerticalVisibility,
    NoSignificantCloud,
    Cavok,
    Clear,
    /// Any code this service does not know, kept verbatim
    Other(String),
}

impl From<String> for CloudCover {
    fn from(code: String) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "FEW" => CloudCover::Few,
            "SCT" => CloudCover::Scattered,
            "BKN" => CloudCover::Broken,
            "OVC" | "OVX" => CloudCover::Overcast,
            "VV" => CloudCover::VerticalVisibility,
            "NSC" | "NCD" => CloudCover::NoSignificantCloud,
            "CAVOK" => CloudCover::Cavok,
            "SKC" | "CLR" => CloudCover::Clear,
            _ => CloudCover::Other(code),
        }
    }
}

impl From<CloudCover> for String {
    fn from(cover: CloudCover) -> Self {
        match cover {
            CloudCover::Few => "FEW".into(),
            CloudCover::Scattered => "SCT".into(),
            CloudCover::Broken => "BKN".into(),
            CloudCover::Overcast => "OVC".into(),
            CloudCover::VerticalVisibility => "VV".into(),
            CloudCover::NoSignificantCloud => "NSC".into(),
            CloudCover::Cavok => "CAVOK".into(),
            CloudCover::Clear => "SKC".into(),
            CloudCover::Other(code) => code,
        }
    }
}

/// Visibility as reported: plain meters, or a coded string like `10SM` or `6+`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibilityValue {
    Meters(f64),
    Text(String),
}

/// Wind direction: degrees, or the `VRB` sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawWindDirection", into = "RawWindDirection")]
pub enum WindDirection {
    Degrees(u16),
    Variable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawWindDirection {
    Number(f64),
    Text(String),
}

impl From<RawWindDirection> for WindDirection {
    fn from(raw: RawWindDirection) -> Self {
        match raw {
            RawWindDirection::Number(degrees) => {
                WindDirection::Degrees(degrees.round().clamp(0.0, 360.0) as u16)
            }
            // Anything that is not a number is treated as variable, VRB included
            RawWindDirection::Text(text) => match text.trim().parse::<u16>() {
                Ok(degrees) if degrees <= 360 => WindDirection::Degrees(degrees),
                _ => WindDirection::Variable,
            },
        }
    }
}

impl From<WindDirection> for RawWindDirection {
    fn from(direction: WindDirection) -> Self {
        match direction {
            WindDirection::Degrees(degrees) => RawWindDirection::Number(f64::from(degrees)),
            WindDirection::Variable => RawWindDirection::Text("VRB".into()),
        }
    }
}

/// Natural-language analysis produced by the AI collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// One-sentence summary of current conditions
    pub summary: String,
    /// Qualitative flight-conditions rating in the display language
    pub conditions_rating: String,
    /// Hazard phrases, empty when none
    pub hazards: Vec<String>,
    /// Short narrative for the next hours
    pub forecast_summary: String,
    /// Localized airport/city name
    #[serde(alias = "airport_name_ru")]
    pub airport_name: String,
    /// Local time of the observation, `DD.MM HH:MM`
    pub local_time: String,
}

impl AnalysisResult {
    #[must_use]
    pub fn rating(&self) -> FlightRating {
        FlightRating::classify(&self.conditions_rating)
    }
}

/// Closed set of flight-condition ratings the collaborator is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightRating {
    Good,
    Difficult,
    Dangerous,
    NoFly,
    Unrecognized,
}

impl FlightRating {
    /// Classify a rating label in either display language
    #[must_use]
    pub fn classify(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        // Checked before "good"/"fly" so "no-fly" and "нелетные" win
        if label.contains("no-fly") || label.contains("no fly") || label.contains("нелетн") {
            FlightRating::NoFly
        } else if label.contains("danger") || label.contains("опасн") {
            FlightRating::Dangerous
        } else if label.contains("difficult") || label.contains("сложн") {
            FlightRating::Difficult
        } else if label.contains("good") || label.contains("хорош") {
            FlightRating::Good
        } else {
            FlightRating::Unrecognized
        }
    }

    /// Display color hint, in the same vocabulary as visibility tiers
    #[must_use]
    pub fn color_hint(self) -> &'static str {
        match self {
            FlightRating::Good => "green",
            FlightRating::Difficult => "yellow",
            FlightRating::Dangerous => "orange",
            FlightRating::NoFly => "red",
            FlightRating::Unrecognized => "gray",
        }
    }
}
