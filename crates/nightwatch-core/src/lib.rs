//! Device policy evaluation and authentication engine for nightwatch
//!
//! This crate decides what a child device should be doing right now:
//! - Device authentication (bearer secret, signed-timestamp fallback)
//! - Quiet-hours resolution in the device's civil time
//! - Extra-time ledger (pending -> approved/denied, override collapse)
//! - Enforcement decision and the status line clients display
//! - Check-in gap detection for the parent dashboard

mod auth;
mod engine;
mod evaluator;
mod heartbeat;
mod ledger;
mod narrator;
mod schedule;

pub use auth::*;
pub use engine::*;
pub use evaluator::*;
pub use heartbeat::*;
pub use ledger::*;
pub use narrator::*;
pub use schedule::*;
