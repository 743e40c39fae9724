//! Scheduler: one logical timer per service, driven by a shared heap.
//!
//! A single dispatcher task sleeps until the earliest deadline, pops every
//! due entry, and hands probe jobs to a fixed pool of workers. Per service:
//!
//! - at most one probe is in flight; a due entry is skipped while one runs
//! - the next probe is armed only after the previous outcome is applied
//! - heap entries carry the slot's timer token; superseded entries are
//!   discarded when they come due
//! - outcomes carry the slot's epoch; reset and delete bump it, so late
//!   outcomes from before the bump are dropped

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use upwatch_core::validate::MAX_DURATION;
use upwatch_core::{ServiceDefinition, ServiceId, ServiceSnapshot, unix_millis};
use upwatch_health::HealthMachine;
use upwatch_probe::Prober;

use crate::error::{MonitorError, MonitorResult};
use crate::queue::{TimerEntry, TimerQueue};
use crate::recorder::HistoryRecorder;

/// Mutable per-service state, guarded by the slot's mutex.
struct ServiceRuntime {
    machine: HealthMachine,
    /// Unix millis of the next armed probe.
    next_probe_at: Option<u64>,
}

struct ServiceSlot {
    definition: ServiceDefinition,
    /// Token of the only heap entry allowed to fire.
    timer_token: AtomicU64,
    /// Bumped by reset and delete.
    epoch: AtomicU64,
    in_flight: AtomicBool,
    /// Set once the service is deleted; the slot is never re-armed.
    retired: AtomicBool,
    runtime: Mutex<ServiceRuntime>,
}

impl ServiceSlot {
    fn new(definition: ServiceDefinition) -> Self {
        let machine = HealthMachine::for_spec(&definition.spec);
        Self {
            definition,
            timer_token: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            runtime: Mutex::new(ServiceRuntime {
                machine,
                next_probe_at: Some(unix_millis()),
            }),
        }
    }

    async fn snapshot(&self) -> ServiceSnapshot {
        let runtime = self.runtime.lock().await;
        let machine = &runtime.machine;
        ServiceSnapshot {
            definition: self.definition.clone(),
            state: machine.state(),
            consecutive_failures: machine.consecutive_failures(),
            consecutive_successes: machine.consecutive_successes(),
            probes_total: machine.probes_total(),
            last_probe_at: machine.last_probe_at(),
            last_latency_us: machine.last_latency().map(|d| d.as_micros() as u64),
            next_probe_at: runtime.next_probe_at,
        }
    }
}

/// A probe handed to a worker, stamped with the epoch it was issued under.
struct Job {
    slot: Arc<ServiceSlot>,
    epoch: u64,
}

/// State shared by the dispatcher, the workers and the public handle.
struct Inner {
    /// Active services: service_id → slot.
    slots: RwLock<HashMap<ServiceId, Arc<ServiceSlot>>>,
    queue: TimerQueue,
    prober: Arc<dyn Prober>,
    recorder: HistoryRecorder,
    /// Source of timer tokens; never reused.
    tokens: AtomicU64,
}

impl Inner {
    async fn slot(&self, id: &str) -> Option<Arc<ServiceSlot>> {
        self.slots.read().await.get(id).cloned()
    }

    /// Replace the slot's timer with one firing after `delay`.
    async fn arm(&self, slot: &ServiceSlot, delay: Duration) {
        let token = self.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        slot.timer_token.store(token, Ordering::SeqCst);
        let now = Instant::now();
        let at = now
            .checked_add(delay)
            .or_else(|| now.checked_add(MAX_DURATION))
            .unwrap_or(now);
        self.queue
            .push(TimerEntry {
                at,
                service_id: slot.definition.id.clone(),
                token,
            })
            .await;
    }

    async fn dispatch(&self, entry: TimerEntry, jobs: &mpsc::UnboundedSender<Job>) {
        let Some(slot) = self.slot(&entry.service_id).await else {
            debug!(service_id = %entry.service_id, "dropping timer for removed service");
            return;
        };
        if slot.timer_token.load(Ordering::SeqCst) != entry.token {
            return;
        }
        if slot.in_flight.swap(true, Ordering::SeqCst) {
            debug!(service_id = %entry.service_id, "probe still in flight, skipping");
            return;
        }

        let epoch = slot.epoch.load(Ordering::SeqCst);
        if let Err(mpsc::error::SendError(job)) = jobs.send(Job { slot, epoch }) {
            job.slot.in_flight.store(false, Ordering::SeqCst);
            warn!(service_id = %entry.service_id, "probe workers gone, dropping job");
        }
    }

    async fn run(&self, job: Job) {
        let Job { slot, epoch } = job;
        let definition = &slot.definition;
        let spec = &definition.spec;

        let outcome = self.prober.probe(definition).await;
        debug!(
            service_id = %definition.id,
            success = outcome.success,
            latency_ms = outcome.latency().as_millis() as u64,
            "probe completed"
        );

        let delay = {
            let mut runtime = slot.runtime.lock().await;
            if slot.epoch.load(Ordering::SeqCst) == epoch {
                let change = runtime.machine.on_probe_result(&outcome);
                self.recorder.record(outcome, change).await;
            } else {
                debug!(service_id = %definition.id, "discarding outcome from a previous epoch");
            }
            // Definitions persisted before the duration cap may still exceed it.
            let delay = runtime
                .machine
                .next_delay(spec.interval(), spec.failure_interval())
                .min(MAX_DURATION);
            runtime.next_probe_at = Some(unix_millis().saturating_add(delay.as_millis() as u64));
            delay
        };

        slot.in_flight.store(false, Ordering::SeqCst);
        if !slot.retired.load(Ordering::SeqCst) {
            self.arm(&slot, delay).await;
        }
    }
}

/// Handle to the running dispatcher and worker pool.
pub struct Scheduler {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawn the dispatcher and `workers` probe workers.
    pub fn start(prober: Arc<dyn Prober>, recorder: HistoryRecorder, workers: usize) -> Self {
        let inner = Arc::new(Inner {
            slots: RwLock::new(HashMap::new()),
            queue: TimerQueue::new(),
            prober,
            recorder,
            tokens: AtomicU64::new(0),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = workers.max(1);
        let mut tasks = Vec::with_capacity(workers + 1);
        tasks.push(tokio::spawn(dispatch_loop(inner.clone(), job_tx, shutdown_rx)));
        for worker_id in 0..workers {
            tasks.push(tokio::spawn(worker_loop(
                worker_id,
                inner.clone(),
                job_rx.clone(),
            )));
        }
        info!(workers, "scheduler started");

        Self {
            inner,
            shutdown_tx,
            tasks: Mutex::new(tasks),
        }
    }

    /// Start probing a service immediately.
    ///
    /// Returns the snapshot taken before the first probe is armed. A service
    /// that is already registered keeps its existing timer.
    pub async fn register(&self, definition: ServiceDefinition) -> ServiceSnapshot {
        let mut slots = self.inner.slots.write().await;
        if let Some(existing) = slots.get(&definition.id).cloned() {
            drop(slots);
            debug!(service_id = %definition.id, "service already scheduled");
            return existing.snapshot().await;
        }

        let slot = Arc::new(ServiceSlot::new(definition));
        let snapshot = slot.snapshot().await;
        slots.insert(slot.definition.id.clone(), slot.clone());
        drop(slots);

        self.inner.arm(&slot, Duration::ZERO).await;
        info!(
            service_id = %slot.definition.id,
            name = %slot.definition.spec.name,
            kind = %slot.definition.spec.kind,
            target = %slot.definition.spec.target,
            "service scheduled"
        );
        snapshot
    }

    /// Stop probing a service. Returns false if it was not registered.
    pub async fn unregister(&self, id: &str) -> bool {
        let Some(slot) = self.inner.slots.write().await.remove(id) else {
            return false;
        };
        slot.retired.store(true, Ordering::SeqCst);
        let _runtime = slot.runtime.lock().await;
        slot.epoch.fetch_add(1, Ordering::SeqCst);
        info!(service_id = %id, "service unscheduled");
        true
    }

    /// Clear history and return the service to `Unknown`.
    ///
    /// The timer keeps running. An outcome already in flight is discarded.
    pub async fn reset(&self, id: &str) -> MonitorResult<()> {
        let slot = self
            .inner
            .slot(id)
            .await
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;

        let mut runtime = slot.runtime.lock().await;
        self.inner.recorder.reset(id).await?;
        slot.epoch.fetch_add(1, Ordering::SeqCst);
        runtime.machine.reset();
        info!(service_id = %id, "service history reset");
        Ok(())
    }

    /// Fire a probe now. Skipped if one is already in flight.
    pub async fn trigger(&self, id: &str) -> MonitorResult<()> {
        let slot = self
            .inner
            .slot(id)
            .await
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;

        slot.runtime.lock().await.next_probe_at = Some(unix_millis());
        self.inner.arm(&slot, Duration::ZERO).await;
        debug!(service_id = %id, "probe triggered");
        Ok(())
    }

    pub async fn snapshot(&self, id: &str) -> Option<ServiceSnapshot> {
        let slot = self.inner.slot(id).await?;
        Some(slot.snapshot().await)
    }

    /// Snapshots of every service, oldest first.
    pub async fn snapshots(&self) -> Vec<ServiceSnapshot> {
        let slots: Vec<_> = self.inner.slots.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(slots.len());
        for slot in slots {
            snapshots.push(slot.snapshot().await);
        }
        snapshots.sort_by(|a, b| {
            a.definition
                .created_at
                .cmp(&b.definition.created_at)
                .then_with(|| a.definition.id.cmp(&b.definition.id))
        });
        snapshots
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.slots.read().await.contains_key(id)
    }

    /// Stop the dispatcher and wait for workers to finish their probes.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
    }
}

async fn dispatch_loop(
    inner: Arc<Inner>,
    jobs: mpsc::UnboundedSender<Job>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        for entry in inner.queue.pop_due(Instant::now()).await {
            inner.dispatch(entry, &jobs).await;
        }

        let deadline = inner.queue.next_deadline().await;
        tokio::select! {
            _ = sleep_until(deadline) => {}
            _ = inner.queue.changed() => {}
            _ = shutdown.changed() => {
                info!("scheduler dispatcher shutting down");
                break;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn worker_loop(
    worker_id: usize,
    inner: Arc<Inner>,
    jobs: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
) {
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else { break };
        inner.run(job).await;
    }
    debug!(worker_id, "probe worker stopped");
}
