// File: ./src/config.rs
// Handles configuration loading and defaults.
use crate::context::AppContext;
use crate::model::display::{DEFAULT_TIMEZONE, DEFAULT_WEEKDAYS, TimeFormatter};
use crate::model::item::FilterWindow;
use anyhow::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound for `past_days` and `future_days`, about a thousand years.
pub const MAX_WINDOW_DAYS: u32 = 365_250;

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_past_days() -> u32 {
    90
}
fn default_future_days() -> u32 {
    400
}
fn default_weekdays() -> Vec<String> {
    DEFAULT_WEEKDAYS.iter().map(|s| s.to_string()).collect()
}
fn default_max_occurrences() -> u16 {
    1000
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Timestamps in this zone get no ` [tzid]` hint.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_past_days")]
    pub past_days: u32,
    #[serde(default = "default_future_days")]
    pub future_days: u32,
    /// Weekday abbreviations, Sunday first.
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<String>,
    /// Upper bound on occurrences expanded per recurring event.
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            past_days: default_past_days(),
            future_days: default_future_days(),
            weekdays: default_weekdays(),
            max_occurrences: default_max_occurrences(),
        }
    }
}

impl Config {
    /// Load the configuration from the platform config directory.
    /// A missing file yields the defaults.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.config_path()?;
        match Self::load_from(&path) {
            Ok(config) => Ok(config),
            Err(e) if Self::is_missing_config_error(&e) => {
                log::debug!("No config at '{}', using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Load the configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        Self::from_toml(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.weekdays.len() != 7 {
            anyhow::bail!(
                "weekdays must list 7 abbreviations, Sunday first (got {})",
                self.weekdays.len()
            );
        }
        if self.max_occurrences == 0 {
            anyhow::bail!("max_occurrences must be positive");
        }
        for (key, days) in [("past_days", self.past_days), ("future_days", self.future_days)] {
            if days > MAX_WINDOW_DAYS {
                anyhow::bail!("{} must be at most {} (got {})", key, MAX_WINDOW_DAYS, days);
            }
        }
        Ok(())
    }

    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }
        err.chain().any(|cause| {
            cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
        })
    }

    pub fn window(&self, today: NaiveDate) -> Result<FilterWindow> {
        FilterWindow::around(today, self.past_days, self.future_days).ok_or_else(|| {
            anyhow::anyhow!(
                "Filter window of {} past and {} future days around {} is out of range",
                self.past_days,
                self.future_days,
                today
            )
        })
    }

    pub fn formatter(&self) -> Result<TimeFormatter> {
        let weekdays: [String; 7] = self.weekdays.clone().try_into().map_err(|w: Vec<String>| {
            anyhow::anyhow!("weekdays must list 7 abbreviations (got {})", w.len())
        })?;
        Ok(TimeFormatter::new(weekdays, &self.default_timezone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_timezone, "Europe/Berlin");
        assert_eq!(config.past_days, 90);
        assert_eq!(config.future_days, 400);
        assert_eq!(config.weekdays[0], "Su");
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            "default_timezone = \"UTC\"\nweekdays = [\"So\", \"Mo\", \"Di\", \"Mi\", \"Do\", \"Fr\", \"Sa\"]\n",
        )
        .unwrap();
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.future_days, 400);
        let f = config.formatter().unwrap();
        assert_eq!(f.default_tz(), "UTC");
    }

    #[test]
    fn test_invalid_weekdays_rejected() {
        assert!(Config::from_toml("weekdays = [\"Mo\"]").is_err());
        assert!(Config::from_toml("max_occurrences = 0").is_err());
        assert!(Config::from_toml("past_days = \"many\"").is_err());
        assert!(Config::from_toml("future_days = 4000000000").is_err());
        assert!(Config::from_toml("past_days = 365251").is_err());
        assert!(Config::from_toml("past_days = 365250").is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let ctx = TestContext::new();
        let config = Config::load(&ctx).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_context() {
        let ctx = TestContext::new();
        ctx.write_config("past_days = 7\n").unwrap();
        let config = Config::load(&ctx).unwrap();
        assert_eq!(config.past_days, 7);

        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(
            config.window(today).unwrap().start,
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
        );
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = Config::load_from(Path::new("/nonexistent/ical2org.toml")).unwrap_err();
        assert!(Config::is_missing_config_error(&err));
    }
}
