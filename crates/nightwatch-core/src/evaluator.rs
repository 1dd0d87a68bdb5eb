//! Enforcement decision

use nightwatch_api::ActionSet;
use nightwatch_store::ExtraTimeRecord;

use crate::ScheduleVerdict;

/// What the device should be doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub enforce: bool,
    pub is_quiet_hours: bool,
    pub actions: ActionSet,
    /// What `enforce` would be without extra time
    pub scheduled_enforce: bool,
}

/// Combine toggles, schedule verdict and active extra time.
///
/// No schedule for today counts as always in window, so the toggles alone
/// decide. Active extra time always suspends enforcement.
pub fn evaluate(
    actions: &ActionSet,
    verdict: &ScheduleVerdict,
    active_extra_time: Option<&ExtraTimeRecord>,
) -> Evaluation {
    let in_window = !verdict.has_schedule || verdict.in_window;
    let scheduled_enforce = actions.wants_enforcement() && in_window;

    Evaluation {
        enforce: scheduled_enforce && active_extra_time.is_none(),
        is_quiet_hours: verdict.has_schedule && verdict.in_window,
        actions: *actions,
        scheduled_enforce,
    }
}
