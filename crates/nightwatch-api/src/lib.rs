//! Wire types for the nightwatch HTTP API
//!
//! This crate defines the stable API between the service and its clients
//! (the automation on the child phone, and parent tooling):
//! - Shared types (actions, schedules, extra-time rows)
//! - Request bodies
//! - Response bodies and error codes
//! - Versioning

mod requests;
mod responses;
mod types;

pub use requests::*;
pub use responses::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
