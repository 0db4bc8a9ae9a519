//! Unit conversion and display formatting for observation fields

use serde::{Deserialize, Serialize};

use crate::locale::Language;
use crate::models::{CloudCover, CloudLayer, VisibilityValue, WindDirection};

const KNOTS_TO_MS: f64 = 0.514_444;
const FEET_TO_METERS: f64 = 0.3048;
const METERS_PER_STATUTE_MILE: f64 = 1609.0;

/// `10SM` is the reporting ceiling for statute-mile stations
const TEN_STATUTE_MILES_METERS: f64 = 16_000.0;
/// `9999` means 10 km or more
const TEN_KM_CODE: f64 = 9999.0;

pub const VALUE_PLACEHOLDER: &str = "--";

/// Visibility quality tier, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Unknown,
    Poor,
    Marginal,
    Good,
    Excellent,
}

impl Tier {
    /// Tier for a distance in meters; boundaries are inclusive lower bounds.
    /// `9999` (the METAR "10 km or more" code) stays `Good`: the top tier
    /// starts at exactly 10000.
    #[must_use]
    pub fn from_meters(meters: f64) -> Self {
        if meters.is_nan() {
            Tier::Unknown
        } else if meters >= 10_000.0 {
            Tier::Excellent
        } else if meters >= 5_000.0 {
            Tier::Good
        } else if meters >= 2_000.0 {
            Tier::Marginal
        } else {
            Tier::Poor
        }
    }

    #[must_use]
    pub fn color_hint(self) -> &'static str {
        match self {
            Tier::Excellent => "emerald",
            Tier::Good => "green",
            Tier::Marginal => "yellow",
            Tier::Poor => "red",
            Tier::Unknown => "gray",
        }
    }

    #[must_use]
    pub fn label(self, lang: Language) -> &'static str {
        match (self, lang) {
            (Tier::Excellent, Language::En) => "Excellent",
            (Tier::Good, Language::En) => "Good",
            (Tier::Marginal, Language::En) => "Marginal",
            (Tier::Poor, Language::En) => "Poor",
            (Tier::Unknown, Language::En) => VALUE_PLACEHOLDER,
            (Tier::Excellent, Language::Ru) => "Отличная",
            (Tier::Good, Language::Ru) => "Хорошая",
            (Tier::Marginal, Language::Ru) => "Удовлетворит.",
            (Tier::Poor, Language::Ru) => "Плохая",
            (Tier::Unknown, Language::Ru) => VALUE_PLACEHOLDER,
        }
    }
}

/// Classified visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisibilityStatus {
    pub tier: Tier,
    pub color_hint: &'static str,
}

impl From<Tier> for VisibilityStatus {
    fn from(tier: Tier) -> Self {
        Self {
            tier,
            color_hint: tier.color_hint(),
        }
    }
}

/// Knots to meters per second, one decimal. Absence stays absence.
#[must_use]
pub fn knots_to_meters_per_second(knots: Option<f64>) -> Option<String> {
    knots.map(|knots| format!("{:.1}", knots * KNOTS_TO_MS))
}

#[must_use]
pub fn feet_to_meters(feet: Option<f64>) -> Option<i64> {
    feet.map(|feet| (feet * FEET_TO_METERS).round() as i64)
}

/// Visibility in meters, if the value can be interpreted at all
#[must_use]
pub fn visibility_meters(value: &VisibilityValue) -> Option<f64> {
    match value {
        VisibilityValue::Meters(meters) => meters.is_finite().then_some(*meters),
        VisibilityValue::Text(text) => {
            let text = text.trim();
            if text == "10SM" {
                Some(TEN_STATUTE_MILES_METERS)
            } else if let Some(miles) = text.strip_suffix("SM") {
                parse_statute_miles(miles).map(|miles| miles * METERS_PER_STATUTE_MILE)
            } else {
                leading_integer(text).map(|meters| meters as f64)
            }
        }
    }
}

/// Accepts `6`, `1.5`, `1/2`, `1 1/2`, and `P`/`M` (more/less than) prefixes
fn parse_statute_miles(text: &str) -> Option<f64> {
    let text = text.trim().trim_start_matches(['P', 'M']);
    let mut total = 0.0;
    let mut any = false;
    for part in text.split_whitespace() {
        let value = match part.split_once('/') {
            Some((numerator, denominator)) => {
                let numerator: f64 = numerator.parse().ok()?;
                let denominator: f64 = denominator.parse().ok()?;
                if denominator == 0.0 {
                    return None;
                }
                numerator / denominator
            }
            None => part.parse::<f64>().ok()?,
        };
        total += value;
        any = true;
    }
    any.then_some(total)
}

fn leading_integer(text: &str) -> Option<i64> {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Classify a visibility value into a quality tier
#[must_use]
pub fn classify_visibility(value: Option<&VisibilityValue>) -> VisibilityStatus {
    value
        .and_then(visibility_meters)
        .map_or(Tier::Unknown, Tier::from_meters)
        .into()
}

/// Render a visibility value for display
#[must_use]
pub fn format_visibility_value(value: Option<&VisibilityValue>, lang: Language) -> String {
    match value {
        None => VALUE_PLACEHOLDER.to_string(),
        Some(VisibilityValue::Meters(meters)) if *meters == TEN_KM_CODE => {
            lang.ten_km_or_more().to_string()
        }
        Some(VisibilityValue::Meters(meters)) => format!("{meters} {}", lang.meters_suffix()),
        Some(VisibilityValue::Text(text)) if text.trim() == "9999" => {
            lang.ten_km_or_more().to_string()
        }
        Some(VisibilityValue::Text(text)) => match text.strip_suffix("SM") {
            Some(miles) => format!("{miles} {}", lang.miles_suffix()),
            None => text.clone(),
        },
    }
}

#[must_use]
pub fn format_wind_direction(direction: Option<&WindDirection>, lang: Language) -> String {
    match direction {
        None => lang.not_available().to_string(),
        Some(WindDirection::Variable) => lang.variable_wind().to_string(),
        Some(WindDirection::Degrees(degrees)) => format!("{degrees}°"),
    }
}

#[must_use]
pub fn cloud_cover_name(cover: &CloudCover, lang: Language) -> String {
    let name = match (cover, lang) {
        (CloudCover::Other(code), _) => return code.clone(),
        (CloudCover::Few, Language::En) => "Few",
        (CloudCover::Scattered, Language::En) => "Scattered",
        (CloudCover::Broken, Language::En) => "Broken",
        (CloudCover::Overcast, Language::En) => "Overcast",
        (CloudCover::VerticalVisibility, Language::En) => "Vertical visibility",
        (CloudCover::NoSignificantCloud, Language::En) => "No significant cloud",
        (CloudCover::Cavok, Language::En) => "Ceiling and visibility OK",
        (CloudCover::Clear, Language::En) => "Clear",
        (CloudCover::Few, Language::Ru) => "Малооблачно",
        (CloudCover::Scattered, Language::Ru) => "Разбросанная",
        (CloudCover::Broken, Language::Ru) => "Значительная",
        (CloudCover::Overcast, Language::Ru) => "Сплошная",
        (CloudCover::VerticalVisibility, Language::Ru) => "Верт. видимость",
        (CloudCover::NoSignificantCloud, Language::Ru) => "Без сущ. облаков",
        (CloudCover::Cavok, Language::Ru) => "Ясно и видимо",
        (CloudCover::Clear, Language::Ru) => "Ясно",
    };
    name.to_string()
}

/// One line describing all cloud layers, e.g. `Broken at 610m (CB), Overcast at 1219m`
#[must_use]
pub fn describe_clouds(layers: &[CloudLayer], lang: Language) -> String {
    if layers.is_empty() {
        return lang.clear_sky().to_string();
    }

    layers
        .iter()
        .map(|layer| {
            let name = cloud_cover_name(&layer.cover, lang);
            let kind = layer
                .cloud_type
                .as_deref()
                .map(|kind| format!(" ({kind})"))
                .unwrap_or_default();
            match feet_to_meters(layer.base).filter(|meters| *meters != 0) {
                Some(meters) => format!(
                    "{name} {} {meters}{}{kind}",
                    lang.cloud_base_at(),
                    lang.meters_suffix()
                ),
                None => format!("{name}{kind}"),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Station name without "International Airport", "Intl" or "Air Base" noise
#[must_use]
pub fn clean_station_name(name: &str) -> String {
    let mut cleaned = name.to_string();

    if let Some(start) = find_ignore_case(&cleaned, "airport") {
        let mut from = start;
        // Swallow one preceding whitespace and an optional "International"
        if let Some(ws) = cleaned[..from].chars().next_back().filter(|c| c.is_whitespace()) {
            from -= ws.len_utf8();
        }
        const INTERNATIONAL: &str = "international";
        if from >= INTERNATIONAL.len()
            && cleaned.is_char_boundary(from - INTERNATIONAL.len())
            && cleaned[from - INTERNATIONAL.len()..from].eq_ignore_ascii_case(INTERNATIONAL)
        {
            from -= INTERNATIONAL.len();
        }
        cleaned.replace_range(from..start + "airport".len(), "");
    }
    for noise in ["intl", "air base"] {
        if let Some(start) = find_ignore_case(&cleaned, noise) {
            cleaned.replace_range(start..start + noise.len(), "");
        }
    }
    cleaned.trim().to_string()
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .char_indices()
        .map(|(index, _)| index)
        .find(|&index| {
            haystack
                .get(index..index + needle.len())
                .is_some_and(|window| window.eq_ignore_ascii_case(needle))
        })
}
