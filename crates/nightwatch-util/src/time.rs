//! Time utilities for nightwatch
//!
//! Provides the service clock (always UTC), wall-clock parsing for quiet
//! windows, and civil-time resolution for arbitrary IANA zones.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `NIGHTWATCH_MOCK_TIME` environment variable can be set
//! to override the service clock. This is useful for exercising quiet windows
//! from a real phone without waiting for the evening.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` in UTC (e.g., `2025-12-25 21:30:00`)
//!
//! Example:
//! ```bash
//! NIGHTWATCH_MOCK_TIME="2025-12-25 21:30:00" cargo run -p nightwatchd
//! ```

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "NIGHTWATCH_MOCK_TIME";

/// Minutes in a civil day
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Utc::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        let mock_dt = Utc.from_utc_datetime(&naive_dt);
                        let offset = mock_dt.signed_duration_since(Utc::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current service time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// A time of day as configured by a parent ("22:00")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `HH:MM`
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err("Expected HH:MM format".into());
        }

        let hour: u8 = parts[0]
            .parse()
            .map_err(|_| "Invalid hour".to_string())?;
        let minute: u8 = parts[1]
            .parse()
            .map_err(|_| "Invalid minute".to_string())?;

        if hour >= 24 {
            return Err("Hour must be 0-23".into());
        }
        if minute >= 60 {
            return Err("Minute must be 0-59".into());
        }

        Ok(Self { hour, minute })
    }

    pub fn from_minutes(minutes: u16) -> Self {
        let minutes = minutes % MINUTES_PER_DAY;
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    /// Returns minutes since midnight
    pub fn minutes_from_midnight(&self) -> u16 {
        (self.hour as u16) * 60 + self.minute as u16
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

/// An instant resolved into a device's civil time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub tz: Tz,
    pub weekday: Weekday,
    /// Minutes since local midnight
    pub minutes: u16,
}

impl CivilTime {
    pub fn wall_clock(&self) -> WallClock {
        WallClock::from_minutes(self.minutes)
    }
}

/// Resolve a stored zone name, never failing.
///
/// Falls back to `fallback` when the name is missing or unknown to the
/// bundled timezone database.
pub fn resolve_timezone(name: Option<&str>, fallback: Tz) -> Tz {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => fallback,
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(timezone = %name, fallback = %fallback, "Unknown timezone, using fallback");
                fallback
            }
        },
    }
}

/// Convert `now` into weekday and minutes-since-midnight in `tz`
pub fn civil_time(now: DateTime<Utc>, tz: Tz) -> CivilTime {
    let local = now.with_timezone(&tz);
    CivilTime {
        tz,
        weekday: local.weekday(),
        minutes: (local.hour() * 60 + local.minute()) as u16,
    }
}

/// Format an instant as local `HH:MM` in `tz`
pub fn format_local_clock(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// Weekday abbreviation used as the key of per-weekday schedules
pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// Parse a weekday key; accepts abbreviations and full names, any case
pub fn parse_weekday_key(key: &str) -> Option<Weekday> {
    match key.to_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Paris;

    #[test]
    fn test_wall_clock_ordering() {
        let morning = WallClock::new(8, 0).unwrap();
        let noon = WallClock::new(12, 0).unwrap();
        let evening = WallClock::new(18, 30).unwrap();

        assert!(morning < noon);
        assert!(noon < evening);
        assert!(morning < evening);
    }

    #[test]
    fn test_wall_clock_parse() {
        assert_eq!(WallClock::parse("14:30").unwrap(), WallClock::new(14, 30).unwrap());
        assert_eq!(WallClock::parse("00:00").unwrap().minutes_from_midnight(), 0);
        assert_eq!(WallClock::parse("23:59").unwrap().minutes_from_midnight(), 1439);

        assert!(WallClock::parse("24:00").is_err());
        assert!(WallClock::parse("12:60").is_err());
        assert!(WallClock::parse("invalid").is_err());
        assert!(WallClock::parse("12:00:00").is_err());
        assert!(WallClock::parse("").is_err());
    }

    #[test]
    fn test_wall_clock_display() {
        assert_eq!(WallClock::new(7, 5).unwrap().to_string(), "07:05");
        assert_eq!(WallClock::from_minutes(22 * 60).to_string(), "22:00");
    }

    #[test]
    fn test_civil_time_in_paris() {
        // 2025-06-02 is a Monday; Paris is UTC+2 in summer
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 21, 30, 0).unwrap();
        let civil = civil_time(now, Paris);
        assert_eq!(civil.weekday, Weekday::Mon);
        assert_eq!(civil.minutes, 23 * 60 + 30);
    }

    #[test]
    fn test_civil_time_crosses_date_line() {
        // Sunday 23:30 UTC is already Monday in Paris
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 23, 30, 0).unwrap();
        let civil = civil_time(now, Paris);
        assert_eq!(civil.weekday, Weekday::Mon);
        assert_eq!(civil.minutes, 90);
    }

    #[test]
    fn test_resolve_timezone_falls_back() {
        assert_eq!(resolve_timezone(Some("Europe/Paris"), Tz::UTC), Paris);
        assert_eq!(resolve_timezone(Some("Mars/Olympus_Mons"), Tz::UTC), Tz::UTC);
        assert_eq!(resolve_timezone(Some("  "), Paris), Paris);
        assert_eq!(resolve_timezone(None, Paris), Paris);
    }

    #[test]
    fn test_weekday_keys() {
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(parse_weekday_key(weekday_key(day)), Some(day));
        }
        assert_eq!(parse_weekday_key("Saturday"), Some(Weekday::Sat));
        assert_eq!(parse_weekday_key("someday"), None);
    }

    #[test]
    fn test_format_local_clock() {
        let instant = Utc.with_ymd_and_hms(2025, 12, 25, 21, 0, 0).unwrap();
        assert_eq!(format_local_clock(instant, Paris), "22:00");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_parse_mock_time_format() {
        let valid_formats = [
            "2025-12-25 14:30:00",
            "2025-01-01 00:00:00",
            "2025-12-31 23:59:59",
        ];

        for format_str in &valid_formats {
            let result = NaiveDateTime::parse_from_str(format_str, "%Y-%m-%d %H:%M:%S");
            assert!(result.is_ok(), "Expected '{}' to parse successfully", format_str);
        }

        for format_str in &["2025-12-25", "14:30:00", "2025-12-25T14:30:00", ""] {
            let result = NaiveDateTime::parse_from_str(format_str, "%Y-%m-%d %H:%M:%S");
            assert!(result.is_err(), "Expected '{}' to fail parsing", format_str);
        }
    }
}
