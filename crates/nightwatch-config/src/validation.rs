//! Configuration and schedule validation

use crate::schema::{RawConfig, RawNotifyConfig};
use chrono_tz::Tz;
use nightwatch_api::{QuietWindow, Schedule};
use nightwatch_util::{WallClock, parse_weekday_key, weekday_key};
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;

/// Bounds for the expected check-in interval, in minutes
pub const GAP_MINUTES_RANGE: std::ops::RangeInclusive<i64> = 1..=1440;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{field}: invalid time '{value}': {message}")]
    InvalidTimeFormat {
        field: String,
        value: String,
        message: String,
    },

    #[error("{field}: unknown weekday '{value}'")]
    InvalidWeekday { field: String, value: String },

    #[error("{field}: unknown timezone '{value}'")]
    InvalidTimezone { field: String, value: String },

    #[error("{field}: {value} is outside {min}..={max}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ValidationError {
    /// Dotted path of the offending field
    pub fn field(&self) -> &str {
        match self {
            ValidationError::InvalidTimeFormat { field, .. }
            | ValidationError::InvalidWeekday { field, .. }
            | ValidationError::InvalidTimezone { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Invalid { field, .. } => field,
        }
    }
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let service = &config.service;

    if let Some(listen) = &service.listen
        && listen.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Invalid {
            field: "service.listen".into(),
            message: format!("'{}' is not a socket address", listen),
        });
    }

    if let Some(tz) = &service.default_timezone
        && let Err(e) = parse_timezone("service.default_timezone", tz)
    {
        errors.push(e);
    }

    if service.signature_skew_seconds == Some(0) {
        errors.push(ValidationError::Invalid {
            field: "service.signature_skew_seconds".into(),
            message: "must be greater than zero".into(),
        });
    }

    if let Some(gap) = service.default_gap_minutes
        && let Err(e) = check_gap_minutes("service.default_gap_minutes", gap as i64)
    {
        errors.push(e);
    }

    if let Some(token) = &service.admin_token
        && token.trim().len() < 16
    {
        errors.push(ValidationError::Invalid {
            field: "service.admin_token".into(),
            message: "must be at least 16 characters".into(),
        });
    }

    if let Some(notify) = &service.notify {
        errors.extend(validate_notify(notify));
    }

    errors
}

fn validate_notify(notify: &RawNotifyConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !(notify.webhook_url.starts_with("http://") || notify.webhook_url.starts_with("https://")) {
        errors.push(ValidationError::Invalid {
            field: "service.notify.webhook_url".into(),
            message: "must be an http(s) URL".into(),
        });
    }

    if notify.timeout_seconds == Some(0) {
        errors.push(ValidationError::Invalid {
            field: "service.notify.timeout_seconds".into(),
            message: "must be greater than zero".into(),
        });
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, String> {
    WallClock::parse(s)
}

/// Parse an IANA zone name
pub fn parse_timezone(field: &str, value: &str) -> Result<Tz, ValidationError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimezone {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Check the expected check-in interval
pub fn check_gap_minutes(field: &str, minutes: i64) -> Result<u32, ValidationError> {
    if GAP_MINUTES_RANGE.contains(&minutes) {
        Ok(minutes as u32)
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: minutes,
            min: *GAP_MINUTES_RANGE.start(),
            max: *GAP_MINUTES_RANGE.end(),
        })
    }
}

/// Validate a schedule submitted by a parent.
///
/// Stored schedules are never re-validated; evaluation treats malformed
/// stored windows as inert.
pub fn validate_schedule(schedule: &Schedule) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match schedule {
        Schedule::PerWeekday { days } => {
            let mut seen: HashMap<&'static str, &str> = HashMap::new();
            for (key, window) in days {
                let field = format!("schedule.days.{}", key);
                let Some(day) = parse_weekday_key(key) else {
                    errors.push(ValidationError::InvalidWeekday {
                        field,
                        value: key.clone(),
                    });
                    continue;
                };
                if let Some(first) = seen.insert(weekday_key(day), key) {
                    errors.push(ValidationError::Invalid {
                        field,
                        message: format!("same weekday as '{}'", first),
                    });
                    continue;
                }
                if let Some(window) = window {
                    errors.extend(validate_window(window, &field));
                }
            }
        }
        Schedule::Legacy(window) => {
            errors.extend(validate_window(window, "schedule"));
        }
        Schedule::Unscheduled => {}
    }

    errors
}

fn validate_window(window: &QuietWindow, prefix: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = parse_time(&window.start) {
        errors.push(ValidationError::InvalidTimeFormat {
            field: format!("{}.start", prefix),
            value: window.start.clone(),
            message: e,
        });
    }

    if let Err(e) = parse_time(&window.end) {
        errors.push(ValidationError::InvalidTimeFormat {
            field: format!("{}.end", prefix),
            value: window.end.clone(),
            message: e,
        });
    }

    errors
}

/// Normalize weekday keys of a validated schedule to their abbreviations
pub fn normalize_schedule(schedule: Schedule) -> Schedule {
    match schedule {
        Schedule::PerWeekday { days } => Schedule::PerWeekday {
            days: days
                .into_iter()
                .filter_map(|(key, window)| {
                    parse_weekday_key(&key).map(|day| (weekday_key(day).to_string(), window))
                })
                .collect(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawServiceConfig;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("14:30").unwrap(), WallClock::new(14, 30).unwrap());
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("invalid").is_err());
    }

    #[test]
    fn test_weekly_schedule_errors_name_fields() {
        let mut days = BTreeMap::new();
        days.insert("mon".to_string(), Some(QuietWindow::new("22:00", "07:00")));
        days.insert("tue".to_string(), Some(QuietWindow::new("25:00", "07:00")));
        days.insert("xyz".to_string(), None);
        let errors = validate_schedule(&Schedule::PerWeekday { days });

        let fields: Vec<&str> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(fields, vec!["schedule.days.tue.start", "schedule.days.xyz"]);
    }

    #[test]
    fn test_weekday_given_twice_is_rejected() {
        let mut days = BTreeMap::new();
        days.insert("Monday".to_string(), Some(QuietWindow::new("21:00", "07:00")));
        days.insert("mon".to_string(), Some(QuietWindow::new("22:00", "07:00")));
        days.insert("tue".to_string(), Some(QuietWindow::new("22:00", "07:00")));
        let errors = validate_schedule(&Schedule::PerWeekday { days });

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field(), "schedule.days.mon");
        assert!(errors[0].to_string().contains("'Monday'"));
    }

    #[test]
    fn test_start_equal_end_is_valid_input() {
        let schedule = Schedule::Legacy(QuietWindow::new("21:00", "21:00"));
        assert!(validate_schedule(&schedule).is_empty());
    }

    #[test]
    fn test_normalize_schedule_keys() {
        let mut days = BTreeMap::new();
        days.insert("Monday".to_string(), Some(QuietWindow::new("22:00", "07:00")));
        let normalized = normalize_schedule(Schedule::PerWeekday { days });

        match normalized {
            Schedule::PerWeekday { days } => {
                assert!(days.contains_key("mon"));
                assert!(!days.contains_key("Monday"));
            }
            other => panic!("unexpected schedule {:?}", other),
        }
    }

    #[test]
    fn test_gap_minutes_bounds() {
        assert_eq!(check_gap_minutes("gap", 30).unwrap(), 30);
        assert!(check_gap_minutes("gap", 0).is_err());
        assert!(check_gap_minutes("gap", 1441).is_err());
    }

    #[test]
    fn test_invalid_service_config() {
        let config = RawConfig {
            config_version: 1,
            service: RawServiceConfig {
                listen: Some("nowhere".into()),
                default_timezone: Some("Atlantis/Capital".into()),
                signature_skew_seconds: Some(0),
                admin_token: Some("short".into()),
                notify: Some(RawNotifyConfig {
                    webhook_url: "ftp://relay".into(),
                    timeout_seconds: None,
                }),
                ..Default::default()
            },
        };

        let errors = validate_config(&config);
        let fields: Vec<&str> = errors.iter().map(|e| e.field()).collect();
        assert_eq!(
            fields,
            vec![
                "service.listen",
                "service.default_timezone",
                "service.signature_skew_seconds",
                "service.admin_token",
                "service.notify.webhook_url",
            ]
        );
    }
}
