//! Local-time overlay for the observation clock.
//!
//! The analysis collaborator reports the observation's local time as
//! `DD.MM HH:MM`. When it could not work the time out it leaves an `XX`
//! marker in the string; such values never replace the UTC clock.

use serde::{Deserialize, Serialize};

use crate::locale::Language;
use crate::time::ObservedTime;

/// Substring marking a local time the producer could not determine.
pub const UNRESOLVED_MARKER: &str = "XX";

const TIME_PLACEHOLDER: &str = "--:--";
const DATE_PLACEHOLDER: &str = "--.--";

/// Parsed `DD.MM HH:MM` local time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTime {
    /// `"{day} {month name}"`, or the original string when malformed
    pub date: String,
    /// `HH:MM`, empty when malformed
    pub time: String,
}

/// What the clock widget shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockDisplay {
    pub time: String,
    pub date: String,
    /// Relative age for UTC clocks, the "local time" label otherwise
    pub sub_label: String,
    pub is_local: bool,
    /// The UTC display string, kept as a secondary label
    pub utc_label: String,
}

/// Whether a producer-supplied local time may be shown at all
#[must_use]
pub fn is_usable(local_time: &str) -> bool {
    !local_time.trim().is_empty() && !local_time.contains(UNRESOLVED_MARKER)
}

/// Parse `DD.MM HH:MM` into a localized date and the raw time part
#[must_use]
pub fn parse_local_time(value: &str, lang: Language) -> LocalTime {
    let parts: Vec<&str> = value.split(' ').collect();
    let [date_part, time_part] = parts.as_slice() else {
        return LocalTime {
            date: value.to_string(),
            time: String::new(),
        };
    };

    let mut date_fields = date_part.split('.');
    let day = date_fields.next().unwrap_or_default();
    let month = date_fields.next().unwrap_or_default();

    let day = day
        .parse::<u32>()
        .map_or_else(|_| day.to_string(), |d| d.to_string());
    let month_name = month
        .parse::<u32>()
        .ok()
        .and_then(|m| lang.month_name(m))
        .map_or_else(|| month.to_string(), str::to_string);

    LocalTime {
        date: format!("{day} {month_name}"),
        time: (*time_part).to_string(),
    }
}

/// Build the clock display, preferring a usable local time over UTC
#[must_use]
pub fn overlay(utc: &ObservedTime, local_time: Option<&str>, lang: Language) -> ClockDisplay {
    match local_time.filter(|value| is_usable(value)) {
        Some(value) => {
            let parsed = parse_local_time(value, lang);
            ClockDisplay {
                time: parsed.time,
                date: parsed.date,
                sub_label: lang.local_time().to_string(),
                is_local: true,
                utc_label: utc.utc.clone(),
            }
        }
        None => utc_clock(utc),
    }
}

fn utc_clock(utc: &ObservedTime) -> ClockDisplay {
    let mut tokens = utc.utc.split(' ');
    let date = tokens
        .next()
        .filter(|token| !token.is_empty())
        .unwrap_or(DATE_PLACEHOLDER);
    let time = tokens.next().unwrap_or(TIME_PLACEHOLDER);

    ClockDisplay {
        time: time.to_string(),
        date: date.to_string(),
        sub_label: utc.relative.clone(),
        is_local: false,
        utc_label: utc.utc.clone(),
    }
}
