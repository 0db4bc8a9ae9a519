//! Display-language tables.

use serde::{Deserialize, Serialize};

/// Language used for every human-readable label the service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// Genitive case, as used after a day number.
const MONTHS_RU: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

impl Language {
    /// Full month name for a 1-indexed month number.
    #[must_use]
    pub fn month_name(self, month: u32) -> Option<&'static str> {
        let table = match self {
            Language::En => &MONTHS_EN,
            Language::Ru => &MONTHS_RU,
        };
        let index = usize::try_from(month).ok()?.checked_sub(1)?;
        table.get(index).copied()
    }

    pub fn just_now(self) -> &'static str {
        match self {
            Language::En => "just now",
            Language::Ru => "Только что",
        }
    }

    pub fn minutes_ago(self, minutes: i64) -> String {
        match self {
            Language::En => format!("{minutes} min ago"),
            Language::Ru => format!("{minutes} мин назад"),
        }
    }

    pub fn hours_ago(self, hours: i64) -> String {
        match self {
            Language::En => format!("{hours} h ago"),
            Language::Ru => format!("{hours} ч назад"),
        }
    }

    pub fn days_ago(self, days: i64) -> String {
        match self {
            Language::En => format!("{days} d ago"),
            Language::Ru => format!("{days} дн назад"),
        }
    }

    pub fn local_time(self) -> &'static str {
        match self {
            Language::En => "Local time",
            Language::Ru => "Местное время",
        }
    }

    pub fn not_available(self) -> &'static str {
        match self {
            Language::En => "n/a",
            Language::Ru => "н/д",
        }
    }

    pub fn variable_wind(self) -> &'static str {
        match self {
            Language::En => "Variable",
            Language::Ru => "Переменный",
        }
    }

    pub fn clear_sky(self) -> &'static str {
        match self {
            Language::En => "Clear sky",
            Language::Ru => "Небо чистое",
        }
    }

    /// Preposition placed between a cloud cover and its base height.
    pub fn cloud_base_at(self) -> &'static str {
        match self {
            Language::En => "at",
            Language::Ru => "на",
        }
    }

    pub fn meters_suffix(self) -> &'static str {
        match self {
            Language::En => "m",
            Language::Ru => "м",
        }
    }

    pub fn miles_suffix(self) -> &'static str {
        match self {
            Language::En => "mi",
            Language::Ru => "миль",
        }
    }

    pub fn ten_km_or_more(self) -> &'static str {
        match self {
            Language::En => "≥10 km",
            Language::Ru => "≥10 км",
        }
    }

    /// Fallback observation text handed to the analysis collaborator.
    pub fn no_data(self) -> &'static str {
        match self {
            Language::En => "No data",
            Language::Ru => "Данные отсутствуют",
        }
    }
}
