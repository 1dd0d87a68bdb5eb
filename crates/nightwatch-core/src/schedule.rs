//! Quiet-hours resolution against a device's civil time

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use nightwatch_api::{QuietWindow, Schedule, ScheduleStatus, WindowView};
use nightwatch_util::{CivilTime, WallClock, civil_time, resolve_timezone};
use tracing::debug;

/// Today's window as configured, in the device zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: String,
    pub end: String,
    pub tz: Tz,
}

impl ActiveWindow {
    /// Parsed bounds, or `None` when the window is disabled (`start == end`)
    /// or either side does not parse
    pub fn bounds(&self) -> Option<(WallClock, WallClock)> {
        let start = WallClock::parse(self.start.trim()).ok()?;
        let end = WallClock::parse(self.end.trim()).ok()?;
        (start != end).then_some((start, end))
    }

    pub fn view(&self) -> WindowView {
        WindowView {
            start: self.start.clone(),
            end: self.end.clone(),
            tz: self.tz.to_string(),
        }
    }
}

/// The following civil day's schedule, for naming changes past midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextDay {
    Window(WallClock, WallClock),
    /// Configured but disabled or unparsable: no quiet hours that day
    Inert,
    /// No entry: the toggles alone govern that day
    Unscheduled,
}

impl NextDay {
    /// Whether that day's window is already in effect at its midnight
    pub fn covers_midnight(&self) -> bool {
        match self {
            NextDay::Window(start, end) => window_contains(*start, *end, WallClock::from_minutes(0)),
            NextDay::Inert => false,
            NextDay::Unscheduled => true,
        }
    }
}

/// Schedule decision for one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleVerdict {
    pub has_schedule: bool,
    pub in_window: bool,
    pub active_window: Option<ActiveWindow>,
    /// Civil time the verdict was computed for
    pub civil: CivilTime,
    pub tomorrow: NextDay,
}

impl ScheduleVerdict {
    pub fn status(&self) -> ScheduleStatus {
        ScheduleStatus {
            has_schedule: self.has_schedule,
            in_window: self.in_window,
            active_window: self.active_window.as_ref().map(ActiveWindow::view),
        }
    }
}

/// Whether `now` falls in `[start, end)`, wrapping past midnight when
/// `start > end`. Equal bounds mean disabled.
pub fn window_contains(start: WallClock, end: WallClock, now: WallClock) -> bool {
    if start == end {
        false
    } else if start < end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Resolve the schedule for `now`.
///
/// Never fails: an unknown zone falls back to `fallback_tz`, and a window
/// that does not parse is reported as scheduled but not in effect.
pub fn resolve_schedule(
    schedule: &Schedule,
    timezone: Option<&str>,
    fallback_tz: Tz,
    now: DateTime<Utc>,
) -> ScheduleVerdict {
    let tz = resolve_timezone(timezone, fallback_tz);
    let civil = civil_time(now, tz);
    let tomorrow = next_day(schedule, civil.weekday.succ());

    let Some(window) = configured_window(schedule, civil.weekday) else {
        return ScheduleVerdict {
            has_schedule: false,
            in_window: false,
            active_window: None,
            civil,
            tomorrow,
        };
    };

    let active = ActiveWindow {
        start: window.start.clone(),
        end: window.end.clone(),
        tz,
    };
    let in_window = match active.bounds() {
        Some((start, end)) => window_contains(start, end, civil.wall_clock()),
        None => {
            debug!(start = %active.start, end = %active.end, "Quiet window inert");
            false
        }
    };

    ScheduleVerdict {
        has_schedule: true,
        in_window,
        active_window: Some(active),
        civil,
        tomorrow,
    }
}

fn configured_window(schedule: &Schedule, weekday: Weekday) -> Option<&QuietWindow> {
    schedule
        .window_for(weekday)
        .filter(|w| !w.start.trim().is_empty() && !w.end.trim().is_empty())
}

fn next_day(schedule: &Schedule, weekday: Weekday) -> NextDay {
    let Some(window) = configured_window(schedule, weekday) else {
        return NextDay::Unscheduled;
    };
    match (
        WallClock::parse(window.start.trim()),
        WallClock::parse(window.end.trim()),
    ) {
        (Ok(start), Ok(end)) if start != end => NextDay::Window(start, end),
        _ => NextDay::Inert,
    }
}
