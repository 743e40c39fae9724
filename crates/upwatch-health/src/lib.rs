//! upwatch-health: deciding what a probe outcome means.
//!
//! # Architecture
//!
//! ```text
//! HealthMachine (one per service)
//!   ├── Counters (consecutive failures / successes)
//!   ├── evaluate() → Evaluation { next, record_event }
//!   └── StateChange when the state moves
//! ```
//!
//! # Escalation
//!
//! The first failure moves a service to `Warning`. It becomes `Failing`
//! once consecutive failures reach the service's `failure_threshold`
//! (default 3). A threshold of 1 skips `Warning`. A successful probe slower
//! than `warning_threshold` is a warning; any other success restores
//! `Healthy` immediately.

pub mod evaluator;
pub mod machine;

pub use evaluator::{Counters, Evaluation, Thresholds, evaluate};
pub use machine::HealthMachine;
