//! Threshold rules: map the latest probe outcome onto a health state.

use std::time::Duration;

use upwatch_core::{HealthState, ProbeOutcome, ServiceSpec};

/// Per-service limits the evaluator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// A successful probe slower than this is a warning.
    pub warning_threshold: Duration,
    /// Consecutive failures before the service is failing.
    pub failure_threshold: u32,
}

impl From<&ServiceSpec> for Thresholds {
    fn from(spec: &ServiceSpec) -> Self {
        Self {
            warning_threshold: spec.warning_threshold(),
            failure_threshold: spec.failure_threshold,
        }
    }
}

/// Consecutive result counts. At most one of the two is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

impl Counters {
    /// Fold one probe result into the counters.
    pub fn record(&mut self, success: bool) {
        if success {
            self.consecutive_failures = 0;
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }
}

/// Decision for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub next: HealthState,
    /// True when `next` differs from the current state.
    pub record_event: bool,
}

/// Decide the next state. `counters` must already include `outcome`.
pub fn evaluate(
    current: HealthState,
    counters: &Counters,
    outcome: &ProbeOutcome,
    thresholds: &Thresholds,
) -> Evaluation {
    let next = if outcome.success {
        if outcome.latency() > thresholds.warning_threshold {
            HealthState::Warning
        } else {
            HealthState::Healthy
        }
    } else if counters.consecutive_failures >= thresholds.failure_threshold
        || current == HealthState::Failing
    {
        HealthState::Failing
    } else {
        HealthState::Warning
    };

    Evaluation {
        next,
        record_event: next != current,
    }
}
