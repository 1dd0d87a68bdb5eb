//! Shared utilities for nightwatch
//!
//! This crate provides:
//! - ID types (DeviceId, ParentId, ExtraTimeId)
//! - Time utilities (service clock, wall-clock parsing, civil time per IANA zone)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
