//! upwatch-core: shared types for the upwatch uptime monitor.
//!
//! Holds the service definition model, probe outcomes and health states,
//! request validation, and the `upwatch.toml` config format. Every other
//! crate in the workspace depends on these types.

pub mod config;
pub mod duration;
pub mod types;
pub mod validate;

pub use config::UpwatchConfig;
pub use duration::{DurationValue, parse_duration};
pub use types::*;
pub use validate::{DEFAULT_FAILURE_THRESHOLD, NewService, ValidationError};
