//! Test doubles: a scripted prober and a store whose writes can fail.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

use upwatch_core::{
    ErrorDetail, ProbeKind, ProbeOutcome, ServiceDefinition, ServiceSpec, StateChange, Target,
};
use upwatch_probe::{BoxFuture, Prober};
use upwatch_state::{Persistence, StateError, StateResult, StateStore};

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Up(Duration),
    Down,
}

/// Prober that replays a per-service script. Unscripted probes succeed.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Instant)>>,
    gate: Option<Semaphore>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every probe waits for a permit from [`release`](Self::release).
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn script(&self, service_id: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(service_id.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn delay(&self, service_id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(service_id.to_string(), delay);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Start instants of every probe issued for `service_id`.
    pub fn calls_for(&self, service_id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == service_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub async fn wait_for_calls(&self, service_id: &str, n: usize) {
        for _ in 0..10_000 {
            if self.calls_for(service_id).len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("{service_id} never reached {n} probes");
    }
}

impl Prober for ScriptedProber {
    fn probe<'a>(&'a self, definition: &'a ServiceDefinition) -> BoxFuture<'a, ProbeOutcome> {
        Box::pin(async move {
            let id = definition.id.as_str();
            self.calls
                .lock()
                .unwrap()
                .push((id.to_string(), Instant::now()));

            let delay = self.delays.lock().unwrap().get(id).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            let step = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(id)
                .and_then(|steps| steps.pop_front());
            match step.unwrap_or(Step::Up(Duration::from_millis(5))) {
                Step::Up(latency) => ProbeOutcome::success(id, latency),
                Step::Down => ProbeOutcome::failure(
                    id,
                    Duration::from_millis(5),
                    ErrorDetail::ConnectionRefused,
                ),
            }
        })
    }
}

/// In-memory store whose writes fail while `fail_writes` is set.
pub struct FlakyStore {
    inner: StateStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: StateStore::open_in_memory().unwrap(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StateResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StateError::Write("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Persistence for FlakyStore {
    fn create_service(&self, spec: &ServiceSpec) -> StateResult<ServiceDefinition> {
        self.check()?;
        self.inner.create_service(spec)
    }

    fn get_service(&self, id: &str) -> StateResult<Option<ServiceDefinition>> {
        self.inner.get_service(id)
    }

    fn list_services(&self) -> StateResult<Vec<ServiceDefinition>> {
        self.inner.list_services()
    }

    fn delete_service(&self, id: &str) -> StateResult<bool> {
        self.check()?;
        self.inner.delete_service(id)
    }

    fn append_outcome(&self, outcome: &ProbeOutcome) -> StateResult<()> {
        self.check()?;
        self.inner.append_outcome(outcome)
    }

    fn list_outcomes(&self, id: &str, limit: usize) -> StateResult<Vec<ProbeOutcome>> {
        self.inner.list_outcomes(id, limit)
    }

    fn clear_outcomes(&self, id: &str) -> StateResult<u32> {
        self.check()?;
        self.inner.clear_outcomes(id)
    }

    fn append_state_change(&self, change: &StateChange) -> StateResult<()> {
        self.check()?;
        self.inner.append_state_change(change)
    }

    fn list_state_changes(&self, id: &str, limit: usize) -> StateResult<Vec<StateChange>> {
        self.inner.list_state_changes(id, limit)
    }

    fn clear_history(&self, id: &str) -> StateResult<()> {
        self.check()?;
        self.inner.clear_history(id)
    }

    fn flush_all(&self) -> StateResult<()> {
        self.check()?;
        self.inner.flush_all()
    }
}

/// A TCP service definition with the given cadence, in seconds.
pub fn definition(id: &str, interval_secs: u64, failure_interval_secs: u64) -> ServiceDefinition {
    ServiceDefinition {
        id: id.to_string(),
        spec: ServiceSpec {
            name: id.to_string(),
            kind: ProbeKind::Tcp,
            target: Target::Host {
                host: "127.0.0.1".to_string(),
                port: Some(9),
            },
            timeout_ms: 5_000,
            interval_ms: interval_secs * 1_000,
            failure_interval_ms: failure_interval_secs * 1_000,
            warning_threshold_ms: 30_000,
            failure_threshold: 3,
        },
        created_at: 0,
    }
}
