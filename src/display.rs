//! Display-ready model of a station's weather
//!
//! Everything a client needs to render a station page, with units converted,
//! times resolved and labels localized. Building the model is pure: the
//! current time is passed in.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::local_time::{self, ClockDisplay};
use crate::locale::Language;
use crate::models::{AnalysisResult, FlightRating, ForecastPeriod, ForecastReport, WeatherObservation};
use crate::service::StationReports;
use crate::time::{self, ObservedTime};
use crate::units::{self, Tier};

#[derive(Debug, Clone, Serialize)]
pub struct WeatherDisplay {
    pub station_id: String,
    /// AI-localized city name, else the cleaned station name, else the code
    pub city_name: String,
    /// Cleaned station name, only when it differs from `city_name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    pub observed: ObservedTime,
    pub clock: ClockDisplay,
    pub conditions: Option<ConditionsDisplay>,
    pub raw_metar: Option<String>,
    pub raw_taf: Option<String>,
    pub forecast: Option<ForecastDisplay>,
    pub analysis: AnalysisState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionsDisplay {
    /// Celsius
    pub temperature: Option<f64>,
    /// Celsius
    pub dew_point: Option<f64>,
    pub wind: WindDisplay,
    pub visibility: VisibilityDisplay,
    pub clouds: String,
    /// hPa
    pub altimeter: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindDisplay {
    pub direction: String,
    pub speed_ms: Option<String>,
    pub gust_ms: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityDisplay {
    pub value: String,
    pub tier: Tier,
    pub color_hint: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastDisplay {
    pub issued: ObservedTime,
    pub valid_from: String,
    pub valid_to: String,
    pub periods: Vec<PeriodDisplay>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodDisplay {
    pub change: Option<String>,
    pub from: String,
    pub to: String,
    pub visibility: String,
    pub weather: Option<String>,
}

/// Analysis section of the display
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisState {
    Ready {
        #[serde(flatten)]
        result: AnalysisResult,
        rating: FlightRating,
        rating_color: &'static str,
    },
    /// Failed or timed out; the weather section is still valid
    Unavailable { retryable: bool },
}

impl AnalysisState {
    #[must_use]
    pub fn ready(result: AnalysisResult) -> Self {
        let rating = result.rating();
        AnalysisState::Ready {
            result,
            rating,
            rating_color: rating.color_hint(),
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisState::Ready { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Build the display model for one station
#[must_use]
pub fn build(
    station_id: &str,
    reports: &StationReports,
    analysis: AnalysisState,
    now: DateTime<Utc>,
    lang: Language,
) -> WeatherDisplay {
    let observation = reports.observation.as_ref();
    let observed = time::describe(observation.and_then(|obs| obs.obs_time.as_ref()), now, lang);
    let local = analysis.result().map(|result| result.local_time.as_str());
    let clock = local_time::overlay(&observed, local, lang);

    let cleaned_name = reports
        .station
        .as_ref()
        .map(|station| units::clean_station_name(&station.name))
        .filter(|name| !name.is_empty());
    let city_name = analysis
        .result()
        .map(|result| result.airport_name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| cleaned_name.clone())
        .unwrap_or_else(|| station_id.to_string());
    let station_name = cleaned_name.filter(|name| *name != city_name);

    WeatherDisplay {
        station_id: station_id.to_string(),
        city_name,
        station_name,
        observed,
        clock,
        conditions: observation.map(|obs| conditions(obs, lang)),
        raw_metar: observation.map(|obs| obs.raw_ob.clone()),
        raw_taf: reports.forecast.as_ref().map(|taf| taf.raw_taf.clone()),
        forecast: reports.forecast.as_ref().map(|taf| forecast(taf, now, lang)),
        analysis,
    }
}

fn conditions(obs: &WeatherObservation, lang: Language) -> ConditionsDisplay {
    let status = units::classify_visibility(obs.visib.as_ref());
    ConditionsDisplay {
        temperature: obs.temp,
        dew_point: obs.dewp,
        wind: WindDisplay {
            direction: units::format_wind_direction(obs.wdir.as_ref(), lang),
            speed_ms: units::knots_to_meters_per_second(obs.wspd),
            gust_ms: units::knots_to_meters_per_second(obs.wgst),
        },
        visibility: VisibilityDisplay {
            value: units::format_visibility_value(obs.visib.as_ref(), lang),
            tier: status.tier,
            color_hint: status.color_hint,
            label: status.tier.label(lang),
        },
        clouds: units::describe_clouds(&obs.clouds, lang),
        altimeter: obs.altim,
    }
}

fn forecast(taf: &ForecastReport, now: DateTime<Utc>, lang: Language) -> ForecastDisplay {
    ForecastDisplay {
        issued: time::describe(taf.issue_time.as_ref(), now, lang),
        valid_from: time::describe(taf.valid_time_from.as_ref(), now, lang).utc,
        valid_to: time::describe(taf.valid_time_to.as_ref(), now, lang).utc,
        periods: taf
            .forecast
            .iter()
            .map(|period| forecast_period(period, now, lang))
            .collect(),
    }
}

fn forecast_period(period: &ForecastPeriod, now: DateTime<Utc>, lang: Language) -> PeriodDisplay {
    PeriodDisplay {
        change: period.change_indicator.clone(),
        from: time::describe(period.time_from.as_ref(), now, lang).utc,
        to: time::describe(period.time_to.as_ref(), now, lang).utc,
        visibility: units::format_visibility_value(period.visib.as_ref(), lang),
        weather: period.wx_string.clone(),
    }
}
