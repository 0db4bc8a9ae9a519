//! Observation and issue time resolution
//!
//! Upstream times arrive as epoch numbers with no stated unit, numeric-looking
//! strings, or date strings with or without a zone. [`resolve`] turns any of
//! them into a [`ResolvedTime`] once; display code only ever sees the result.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locale::Language;

/// Epoch values below this are seconds, everything else milliseconds.
pub const EPOCH_SECONDS_THRESHOLD: f64 = 10_000_000_000.0;

/// Shown instead of a time when nothing could be resolved.
pub const TIME_PLACEHOLDER: &str = "--";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A time value exactly as the data service delivered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Number(f64),
    Text(String),
}

impl RawTime {
    fn as_trimmed_string(&self) -> String {
        match self {
            RawTime::Number(value) => value.to_string(),
            RawTime::Text(text) => text.trim().to_string(),
        }
    }
}

/// Outcome of resolving a [`RawTime`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTime {
    Instant(DateTime<Utc>),
    /// Not parseable; carries the trimmed original for display
    Unparsed(String),
    Missing,
}

impl ResolvedTime {
    #[must_use]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            ResolvedTime::Instant(instant) => Some(*instant),
            _ => None,
        }
    }
}

/// Display form of a resolved time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedTime {
    /// `DD.MM HH:MM UTC`, the original text when unparseable, or `--`
    pub utc: String,
    /// Human-relative age, empty when not applicable
    pub relative: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instant: Option<DateTime<Utc>>,
}

/// Resolve a loosely typed time into an absolute instant
#[must_use]
pub fn resolve(raw: Option<&RawTime>) -> ResolvedTime {
    let Some(raw) = raw else {
        return ResolvedTime::Missing;
    };
    let text = raw.as_trimmed_string();
    if text.is_empty() {
        return ResolvedTime::Missing;
    }

    let parsed = match raw {
        RawTime::Number(value) => from_epoch(*value),
        RawTime::Text(_) if is_numeric(&text) => text.parse::<f64>().ok().and_then(from_epoch),
        RawTime::Text(_) => parse_date_string(&text),
    };

    match parsed {
        Some(instant) => ResolvedTime::Instant(instant),
        None => ResolvedTime::Unparsed(text),
    }
}

fn is_numeric(text: &str) -> bool {
    !text.contains(':') && !text.contains('-') && text.parse::<f64>().is_ok_and(f64::is_finite)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value < EPOCH_SECONDS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };
    DateTime::from_timestamp_millis(millis.trunc() as i64)
}

fn parse_date_string(text: &str) -> Option<DateTime<Utc>> {
    let mut normalized = text.replacen(' ', "T", 1);
    if !has_zone_designator(&normalized) {
        normalized.push('Z');
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(instant.with_timezone(&Utc));
    }
    // Offsets without a colon, e.g. +0500
    if let Ok(instant) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(instant.with_timezone(&Utc));
    }
    let naive = normalized.strip_suffix('Z')?;
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Only the time part can carry a zone; dashes in the date do not count.
fn has_zone_designator(text: &str) -> bool {
    if text.ends_with('Z') || text.ends_with('z') {
        return true;
    }
    match text.find('T') {
        Some(separator) => text[separator..].contains(['+', '-']),
        None => false,
    }
}

/// Format as `DD.MM HH:MM UTC`
#[must_use]
pub fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%d.%m %H:%M UTC").to_string()
}

/// Human-relative age of `instant` as seen at `now`
#[must_use]
pub fn relative_label(instant: DateTime<Utc>, now: DateTime<Utc>, lang: Language) -> String {
    let diff_minutes = (now - instant).num_milliseconds().div_euclid(60_000);

    if diff_minutes < 0 {
        if diff_minutes > -60 {
            lang.just_now().to_string()
        } else {
            String::new()
        }
    } else if diff_minutes < 60 {
        lang.minutes_ago(diff_minutes)
    } else if diff_minutes < 1440 {
        lang.hours_ago(diff_minutes / 60)
    } else {
        lang.days_ago(diff_minutes / 1440)
    }
}

/// Resolve and format a raw time for display
#[must_use]
pub fn describe(raw: Option<&RawTime>, now: DateTime<Utc>, lang: Language) -> ObservedTime {
    match resolve(raw) {
        ResolvedTime::Instant(instant) => ObservedTime {
            utc: format_utc(instant),
            relative: relative_label(instant, now, lang),
            instant: Some(instant),
        },
        ResolvedTime::Unparsed(text) => ObservedTime {
            utc: text,
            relative: String::new(),
            instant: None,
        },
        ResolvedTime::Missing => ObservedTime {
            utc: TIME_PLACEHOLDER.to_string(),
            relative: String::new(),
            instant: None,
        },
    }
}

/// Stable textual identity of a time, used for cache keys
///
/// Resolvable values become epoch milliseconds so that the same instant in
/// seconds, milliseconds or string form yields the same identity.
#[must_use]
pub fn identity(raw: Option<&RawTime>) -> Option<String> {
    match resolve(raw) {
        ResolvedTime::Instant(instant) => Some(instant.timestamp_millis().to_string()),
        ResolvedTime::Unparsed(text) => Some(text),
        ResolvedTime::Missing => None,
    }
}
