//! Theme values and persistence keys

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key the current builds of the site store the preference under
pub const CURRENT_STORAGE_KEY: &str = "lh4h:theme";

/// Key older builds wrote; still read as a fallback and kept in sync
pub const LEGACY_STORAGE_KEY: &str = "lh4h_theme";

/// A light/dark preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Dark, Theme::Light];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Parse a stored or requested value, `None` for anything outside the
    /// allowed set. Matching is exact: no trimming, no case folding.
    pub fn parse(value: &str) -> Option<Theme> {
        value.parse().ok()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized theme: {0:?}")]
pub struct ParseThemeError(pub String);

impl FromStr for Theme {
    type Err = ParseThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(ParseThemeError(other.to_string())),
        }
    }
}

/// Persistence keys handed to the controller at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeKeys {
    pub current: String,
    pub legacy: String,
}

impl ThemeKeys {
    pub fn new(current: impl Into<String>, legacy: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            legacy: legacy.into(),
        }
    }
}

impl Default for ThemeKeys {
    fn default() -> Self {
        Self::new(CURRENT_STORAGE_KEY, LEGACY_STORAGE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_exact_values_only() {
        assert_eq!(Theme::parse("dark"), Some(Theme::Dark));
        assert_eq!(Theme::parse("light"), Some(Theme::Light));
        assert_eq!(Theme::parse("Dark"), None);
        assert_eq!(Theme::parse(" light"), None);
        assert_eq!(Theme::parse(""), None);
        assert_eq!(Theme::parse("sepia"), None);
    }

    #[test]
    fn test_parse_error_names_value() {
        let err = "auto".parse::<Theme>().unwrap_err();
        assert!(format!("{}", err).contains("auto"));
    }

    #[test]
    fn test_display_matches_storage_form() {
        for theme in Theme::ALL {
            assert_eq!(theme.to_string(), theme.as_str());
            assert_eq!(Theme::parse(&theme.to_string()), Some(theme));
        }
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Theme::Light).unwrap(), "\"light\"");
        let theme: Theme = serde_json::from_str("\"dark\"").unwrap();
        assert_eq!(theme, Theme::Dark);
    }

    #[test]
    fn test_default_keys() {
        let keys = ThemeKeys::default();
        assert_eq!(keys.current, CURRENT_STORAGE_KEY);
        assert_eq!(keys.legacy, LEGACY_STORAGE_KEY);
        assert_ne!(keys.current, keys.legacy);
    }
}
