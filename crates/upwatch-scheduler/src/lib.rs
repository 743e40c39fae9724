//! upwatch-scheduler: when to probe, and what to do with the result.
//!
//! # Architecture
//!
//! ```text
//! Monitor
//!   ├── Persistence (service definitions)
//!   └── Scheduler
//!       ├── TimerQueue (min-heap of deadlines) ← dispatcher task
//!       ├── Worker pool (mpsc job channel) → Prober
//!       ├── Per-service slot
//!       │   ├── HealthMachine (state + counters)
//!       │   └── timer token, epoch, in-flight flag
//!       └── HistoryRecorder → Persistence (outcomes, state changes)
//! ```
//!
//! A service is probed every `interval` while healthy, warning or unknown,
//! and every `failure_interval` while failing.

pub mod error;
pub mod monitor;
pub mod queue;
pub mod recorder;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{MonitorError, MonitorResult};
pub use monitor::Monitor;
pub use recorder::HistoryRecorder;
pub use scheduler::Scheduler;
