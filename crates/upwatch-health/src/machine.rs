//! Per-service health state machine.
//!
//! Owns the current state, consecutive counters and probe timestamps for
//! one service. The scheduler feeds it outcomes in issue order.

use std::time::Duration;

use tracing::{debug, info, warn};

use upwatch_core::{HealthState, ProbeOutcome, ServiceSpec, StateChange};

use crate::evaluator::{Counters, Thresholds, evaluate};

#[derive(Debug, Clone)]
pub struct HealthMachine {
    state: HealthState,
    counters: Counters,
    thresholds: Thresholds,
    /// Unix millis of the last applied outcome.
    last_probe_at: Option<u64>,
    last_latency: Option<Duration>,
    probes_total: u64,
}

impl HealthMachine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            state: HealthState::Unknown,
            counters: Counters::default(),
            thresholds,
            last_probe_at: None,
            last_latency: None,
            probes_total: 0,
        }
    }

    pub fn for_spec(spec: &ServiceSpec) -> Self {
        Self::new(Thresholds::from(spec))
    }

    /// Apply one outcome. Returns the transition when the state changed.
    pub fn on_probe_result(&mut self, outcome: &ProbeOutcome) -> Option<StateChange> {
        self.counters.record(outcome.success);
        self.probes_total += 1;
        self.last_probe_at = Some(outcome.timestamp);
        self.last_latency = Some(outcome.latency());

        let eval = evaluate(self.state, &self.counters, outcome, &self.thresholds);
        if !eval.record_event {
            return None;
        }

        let from = self.state;
        self.state = eval.next;
        match eval.next {
            HealthState::Failing => warn!(
                service_id = %outcome.service_id,
                failures = self.counters.consecutive_failures,
                threshold = self.thresholds.failure_threshold,
                "service marked failing"
            ),
            HealthState::Healthy if from != HealthState::Unknown => info!(
                service_id = %outcome.service_id,
                %from,
                "service recovered"
            ),
            _ => debug!(
                service_id = %outcome.service_id,
                %from,
                to = %eval.next,
                "health state changed"
            ),
        }

        Some(StateChange {
            service_id: outcome.service_id.clone(),
            timestamp: outcome.timestamp,
            from,
            to: eval.next,
            reason: self.reason(outcome),
        })
    }

    fn reason(&self, outcome: &ProbeOutcome) -> Option<String> {
        if let Some(error) = &outcome.error {
            return Some(error.to_string());
        }
        let latency = outcome.latency();
        if latency > self.thresholds.warning_threshold {
            Some(format!(
                "latency {}ms above warning threshold {}ms",
                latency.as_millis(),
                self.thresholds.warning_threshold.as_millis()
            ))
        } else {
            None
        }
    }

    /// Back to `Unknown` with zeroed counters and no probe history.
    pub fn reset(&mut self) {
        *self = Self::new(self.thresholds);
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.counters.consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.counters.consecutive_successes
    }

    pub fn last_probe_at(&self) -> Option<u64> {
        self.last_probe_at
    }

    pub fn last_latency(&self) -> Option<Duration> {
        self.last_latency
    }

    pub fn probes_total(&self) -> u64 {
        self.probes_total
    }

    /// Delay until the next probe, given the current state.
    pub fn next_delay(&self, interval: Duration, failure_interval: Duration) -> Duration {
        match self.state {
            HealthState::Failing => failure_interval,
            HealthState::Unknown | HealthState::Healthy | HealthState::Warning => interval,
        }
    }
}
