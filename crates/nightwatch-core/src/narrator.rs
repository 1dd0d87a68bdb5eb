//! Status line shown verbatim by clients

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use nightwatch_store::ExtraTimeRecord;
use nightwatch_util::format_local_clock;

use crate::{Evaluation, NextDay, ScheduleVerdict};

/// Render one sentence describing the current state.
///
/// Priority: active extra time, then a pending request, then the plain
/// enforcement state with the next scheduled change. Changes that fall
/// after midnight are named from the following day's window.
pub fn narrate(
    verdict: &ScheduleVerdict,
    evaluation: &Evaluation,
    active_extra_time: Option<&ExtraTimeRecord>,
    pending_extra_time: Option<&ExtraTimeRecord>,
) -> String {
    let tz = verdict.civil.tz;
    let now = verdict.civil.wall_clock();
    let tomorrow = verdict.tomorrow;

    if let Some(ends_at) = active_extra_time.and_then(|e| e.ends_at) {
        let when = local_clock_with_day(ends_at, tz, verdict);
        return if evaluation.scheduled_enforce {
            format!("Extra time active. Protection resumes at {}.", when)
        } else {
            format!("Extra time active until {}.", when)
        };
    }

    if pending_extra_time.is_some() {
        return format!(
            "{} Extra time request pending approval.",
            protection_state(evaluation.enforce)
        );
    }

    let bounds = verdict.active_window.as_ref().and_then(|w| w.bounds());

    if evaluation.enforce {
        return match bounds {
            Some((_, end)) if end > now => format!("Protection is on until {}.", end),
            Some(_) => on_past_midnight(tomorrow),
            None if tomorrow == NextDay::Unscheduled => "Protection is always on.".to_string(),
            None => on_past_midnight(tomorrow),
        };
    }

    if !evaluation.actions.wants_enforcement() {
        return "No restrictions configured.".to_string();
    }

    match bounds {
        Some((start, _)) if start > now => format!("Protection is off. Resumes at {}.", start),
        Some(_) => off_past_midnight(tomorrow),
        None if verdict.has_schedule => "Protection is off. No quiet hours today.".to_string(),
        None => "Protection is off.".to_string(),
    }
}

fn protection_state(enforce: bool) -> &'static str {
    if enforce {
        "Protection is on."
    } else {
        "Protection is off."
    }
}

/// Protection that holds until midnight, continued by tomorrow's schedule
fn on_past_midnight(tomorrow: NextDay) -> String {
    match tomorrow {
        NextDay::Unscheduled => "Protection is on through tomorrow.".to_string(),
        NextDay::Window(_, end) if tomorrow.covers_midnight() => {
            format!("Protection is on until {} tomorrow.", end)
        }
        _ => "Protection is on until midnight.".to_string(),
    }
}

/// Today's window is over; the next start comes from tomorrow's schedule
fn off_past_midnight(tomorrow: NextDay) -> String {
    match tomorrow {
        NextDay::Inert => "Protection is off. No quiet hours tomorrow.".to_string(),
        NextDay::Window(start, _) if !tomorrow.covers_midnight() => {
            format!("Protection is off. Resumes at {} tomorrow.", start)
        }
        _ => "Protection is off. Resumes at midnight.".to_string(),
    }
}

fn local_clock_with_day(instant: DateTime<Utc>, tz: Tz, verdict: &ScheduleVerdict) -> String {
    let clock = format_local_clock(instant, tz);
    if instant.with_timezone(&tz).weekday() != verdict.civil.weekday {
        format!("{} tomorrow", clock)
    } else {
        clock
    }
}
