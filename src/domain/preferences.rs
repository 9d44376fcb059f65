//! Per-request presentation preferences: locale, colour theme and cookie consent.
//!
//! Preferences are resolved once from the incoming request and handed to the
//! services that need them. Nothing here reads or writes ambient global state.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

const IT_MONTHS: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

const IT_MONTHS_SHORT: [&str; 12] = [
    "gen", "feb", "mar", "apr", "mag", "giu", "lug", "ago", "set", "ott", "nov", "dic",
];

const EN_MONTHS: [&str; 12] = [
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

const EN_MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    It,
    En,
}

/// How much of a timestamp to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// Day, full month name and year.
    Long,
    /// Day, abbreviated month and wall-clock time.
    Short,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::It => "it",
            Locale::En => "en",
        }
    }

    /// The other supported locale.
    pub fn toggled(self) -> Self {
        match self {
            Locale::It => Locale::En,
            Locale::En => Locale::It,
        }
    }

    /// Pick the best supported locale from an `Accept-Language` header value.
    ///
    /// Entries are ranked by their `q` weight (ties keep header order) and
    /// matched on the primary language subtag. Entries with `q=0` are refused.
    pub fn negotiate(accept_language: &str) -> Option<Self> {
        let mut ranked: Vec<(f32, &str)> = accept_language
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() {
                    return None;
                }
                let quality = parts
                    .find_map(|param| param.trim().strip_prefix("q="))
                    .map(|value| value.trim().parse::<f32>().unwrap_or(0.0))
                    .unwrap_or(1.0);
                (quality > 0.0).then_some((quality, tag))
            })
            .collect();

        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        ranked.into_iter().find_map(|(_, tag)| {
            let primary = tag.split('-').next().unwrap_or(tag);
            primary.parse::<Locale>().ok()
        })
    }

    /// Rewrite `path` so that its leading locale segment is `self`.
    ///
    /// Paths without a locale segment get one prepended.
    pub fn localized_path(self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        let (first, rest) = match trimmed.split_once('/') {
            Some((first, rest)) => (first, Some(rest)),
            None => (trimmed, None),
        };

        let remainder = if first.parse::<Locale>().is_ok() {
            rest
        } else if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        };

        match remainder {
            Some(rest) if !rest.is_empty() => format!("/{}/{rest}", self.as_str()),
            _ => format!("/{}", self.as_str()),
        }
    }

    pub fn format_date(self, value: OffsetDateTime, style: DateStyle) -> String {
        let month = usize::from(u8::from(value.month())) - 1;
        let day = value.day();
        match (self, style) {
            (Locale::It, DateStyle::Long) => {
                format!("{day} {} {}", IT_MONTHS[month], value.year())
            }
            (Locale::It, DateStyle::Short) => format!(
                "{day} {}, {:02}:{:02}",
                IT_MONTHS_SHORT[month],
                value.hour(),
                value.minute()
            ),
            (Locale::En, DateStyle::Long) => {
                format!("{} {day}, {}", EN_MONTHS[month], value.year())
            }
            (Locale::En, DateStyle::Short) => {
                let (hour, meridiem) = match value.hour() {
                    0 => (12, "AM"),
                    hour @ 1..=11 => (hour, "AM"),
                    12 => (12, "PM"),
                    hour => (hour - 12, "PM"),
                };
                format!(
                    "{} {day}, {hour:02}:{:02} {meridiem}",
                    EN_MONTHS_SHORT[month],
                    value.minute()
                )
            }
        }
    }
}

impl FromStr for Locale {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "it" => Ok(Locale::It),
            "en" => Ok(Locale::En),
            _ => Err(DomainError::unsupported("locale", value)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Stored theme choice; `System` defers to the platform setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    pub fn resolve(self, system: Theme) -> Theme {
        match self {
            ThemePreference::Light => Theme::Light,
            ThemePreference::Dark => Theme::Dark,
            ThemePreference::System => system,
        }
    }

    /// Explicit preference opposite to what is currently shown.
    pub fn toggle(self, system: Theme) -> ThemePreference {
        match self.resolve(system) {
            Theme::Dark => ThemePreference::Light,
            Theme::Light => ThemePreference::Dark,
        }
    }
}

impl FromStr for ThemePreference {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "system" => Ok(ThemePreference::System),
            _ => Err(DomainError::unsupported("theme", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieConsent {
    Accepted,
    Declined,
}

impl FromStr for CookieConsent {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accepted" => Ok(CookieConsent::Accepted),
            "declined" => Ok(CookieConsent::Declined),
            _ => Err(DomainError::unsupported("cookie consent", value)),
        }
    }
}

/// Raw preference values as found on a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceSources<'a> {
    pub locale_cookie: Option<&'a str>,
    pub theme_cookie: Option<&'a str>,
    pub consent_cookie: Option<&'a str>,
    pub accept_language: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Preferences {
    pub locale: Locale,
    pub theme: ThemePreference,
    pub cookie_consent: Option<CookieConsent>,
}

impl Preferences {
    /// Resolve preferences; unrecognised values fall back instead of failing.
    pub fn resolve(sources: PreferenceSources<'_>, default_locale: Locale) -> Self {
        let locale = sources
            .locale_cookie
            .and_then(|value| value.parse().ok())
            .or_else(|| sources.accept_language.and_then(Locale::negotiate))
            .unwrap_or(default_locale);
        let theme = sources
            .theme_cookie
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let cookie_consent = sources.consent_cookie.and_then(|value| value.parse().ok());

        Self {
            locale,
            theme,
            cookie_consent,
        }
    }

    /// The consent banner stays up until the visitor made a choice.
    pub fn cookie_banner_visible(&self) -> bool {
        self.cookie_consent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn negotiate_prefers_highest_quality_supported_tag() {
        assert_eq!(
            Locale::negotiate("fr-FR,fr;q=0.9,en-US;q=0.8,it;q=0.7"),
            Some(Locale::En)
        );
        assert_eq!(Locale::negotiate("de, it;q=0.5"), Some(Locale::It));
        assert_eq!(Locale::negotiate("en;q=0.2, it;q=0.9"), Some(Locale::It));
    }

    #[test]
    fn negotiate_skips_refused_and_unknown_tags() {
        assert_eq!(Locale::negotiate("en;q=0, de"), None);
        assert_eq!(Locale::negotiate(""), None);
    }

    #[test]
    fn localized_path_swaps_leading_segment() {
        assert_eq!(Locale::En.localized_path("/it/profile"), "/en/profile");
        assert_eq!(Locale::It.localized_path("/en"), "/it");
        assert_eq!(Locale::En.localized_path("/blog"), "/en/blog");
        assert_eq!(Locale::En.localized_path("/"), "/en");
        assert_eq!(
            Locale::It.localized_path("/en/post/italy"),
            "/it/post/italy"
        );
    }

    #[test]
    fn toggled_swaps_between_supported_locales() {
        assert_eq!(Locale::It.toggled(), Locale::En);
        assert_eq!(Locale::En.toggled(), Locale::It);
    }

    #[test]
    fn format_long_date_per_locale() {
        let value = datetime!(2026-10-18 14:05 UTC);
        assert_eq!(
            Locale::It.format_date(value, DateStyle::Long),
            "18 ottobre 2026"
        );
        assert_eq!(
            Locale::En.format_date(value, DateStyle::Long),
            "October 18, 2026"
        );
    }

    #[test]
    fn format_short_date_per_locale() {
        let afternoon = datetime!(2026-10-18 14:05 UTC);
        assert_eq!(
            Locale::It.format_date(afternoon, DateStyle::Short),
            "18 ott, 14:05"
        );
        assert_eq!(
            Locale::En.format_date(afternoon, DateStyle::Short),
            "Oct 18, 02:05 PM"
        );

        let midnight = datetime!(2026-01-02 00:30 UTC);
        assert_eq!(
            Locale::En.format_date(midnight, DateStyle::Short),
            "Jan 2, 12:30 AM"
        );
    }

    #[test]
    fn theme_toggle_flips_effective_theme() {
        assert_eq!(
            ThemePreference::System.toggle(Theme::Dark),
            ThemePreference::Light
        );
        assert_eq!(
            ThemePreference::System.toggle(Theme::Light),
            ThemePreference::Dark
        );
        assert_eq!(
            ThemePreference::Dark.toggle(Theme::Dark),
            ThemePreference::Light
        );
        assert_eq!(ThemePreference::Light.resolve(Theme::Dark), Theme::Light);
    }

    #[test]
    fn resolve_prefers_cookie_then_header_then_default() {
        let sources = PreferenceSources {
            locale_cookie: Some("en"),
            accept_language: Some("it"),
            ..Default::default()
        };
        assert_eq!(Preferences::resolve(sources, Locale::It).locale, Locale::En);

        let sources = PreferenceSources {
            locale_cookie: Some("klingon"),
            accept_language: Some("en-GB"),
            ..Default::default()
        };
        assert_eq!(Preferences::resolve(sources, Locale::It).locale, Locale::En);

        let prefs = Preferences::resolve(PreferenceSources::default(), Locale::It);
        assert_eq!(prefs.locale, Locale::It);
        assert_eq!(prefs.theme, ThemePreference::System);
        assert!(prefs.cookie_banner_visible());
    }

    #[test]
    fn consent_cookie_hides_banner() {
        let sources = PreferenceSources {
            consent_cookie: Some("declined"),
            theme_cookie: Some("dark"),
            ..Default::default()
        };
        let prefs = Preferences::resolve(sources, Locale::It);
        assert_eq!(prefs.cookie_consent, Some(CookieConsent::Declined));
        assert_eq!(prefs.theme, ThemePreference::Dark);
        assert!(!prefs.cookie_banner_visible());
    }
}
