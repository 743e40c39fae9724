//! Monitor: the core API used by the REST layer and the daemon.
//!
//! Validates requests, persists definitions, and keeps the scheduler in
//! step with storage. Snapshots come from the in-memory registry; history
//! comes from storage.

use std::sync::Arc;

use tracing::{info, warn};

use upwatch_core::config::SchedulerConfig;
use upwatch_core::{NewService, ProbeOutcome, ServiceSnapshot, StateChange};
use upwatch_probe::Prober;
use upwatch_state::Persistence;

use crate::error::{MonitorError, MonitorResult};
use crate::recorder::HistoryRecorder;
use crate::scheduler::Scheduler;

pub struct Monitor {
    store: Arc<dyn Persistence>,
    recorder: HistoryRecorder,
    scheduler: Scheduler,
    default_failure_threshold: u32,
}

impl Monitor {
    /// Start the scheduler. Must be called from within a tokio runtime.
    pub fn new(
        store: Arc<dyn Persistence>,
        prober: Arc<dyn Prober>,
        config: &SchedulerConfig,
    ) -> Self {
        let recorder = HistoryRecorder::new(store.clone());
        let scheduler = Scheduler::start(prober, recorder.clone(), config.workers);
        Self {
            store,
            recorder,
            scheduler,
            default_failure_threshold: config.default_failure_threshold,
        }
    }

    /// Validate, persist, and start probing a new service.
    pub async fn add_service(&self, request: NewService) -> MonitorResult<ServiceSnapshot> {
        let spec = request.validate(self.default_failure_threshold)?;
        let definition = self.store.create_service(&spec)?;
        info!(service_id = %definition.id, name = %spec.name, "service created");
        Ok(self.scheduler.register(definition).await)
    }

    /// Stop probing a service and purge its definition and history.
    pub async fn delete_service(&self, id: &str) -> MonitorResult<()> {
        if !self.scheduler.unregister(id).await {
            return Err(MonitorError::NotFound(id.to_string()));
        }
        if !self.store.delete_service(id)? {
            warn!(service_id = %id, "scheduled service was missing from the store");
        }
        info!(service_id = %id, "service deleted");
        Ok(())
    }

    /// Clear a service's history and return it to `Unknown`.
    pub async fn reset_service(&self, id: &str) -> MonitorResult<()> {
        self.scheduler.reset(id).await
    }

    pub async fn get_service(&self, id: &str) -> MonitorResult<ServiceSnapshot> {
        self.scheduler
            .snapshot(id)
            .await
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))
    }

    pub async fn list_services(&self) -> Vec<ServiceSnapshot> {
        self.scheduler.snapshots().await
    }

    /// Most recent outcomes, newest first.
    pub async fn list_outcomes(&self, id: &str, limit: usize) -> MonitorResult<Vec<ProbeOutcome>> {
        self.ensure_exists(id).await?;
        Ok(self.recorder.outcomes(id, limit)?)
    }

    /// Most recent state changes, newest first.
    pub async fn list_state_changes(
        &self,
        id: &str,
        limit: usize,
    ) -> MonitorResult<Vec<StateChange>> {
        self.ensure_exists(id).await?;
        Ok(self.recorder.state_changes(id, limit)?)
    }

    /// Probe a service now instead of waiting for its timer.
    pub async fn trigger_check(&self, id: &str) -> MonitorResult<()> {
        self.scheduler.trigger(id).await
    }

    /// Re-arm every service found in storage. Returns how many were loaded.
    pub async fn restore(&self) -> MonitorResult<usize> {
        let definitions = self.store.list_services()?;
        let count = definitions.len();
        for definition in definitions {
            self.scheduler.register(definition).await;
        }
        info!(count, "restored services from storage");
        Ok(count)
    }

    /// Add each service whose name is not already monitored.
    ///
    /// Returns the snapshots of the services that were added.
    pub async fn seed(&self, services: &[NewService]) -> MonitorResult<Vec<ServiceSnapshot>> {
        let mut added = Vec::new();
        for request in services {
            let existing = self.scheduler.snapshots().await;
            let name = request.name.as_deref().map(str::trim);
            if existing
                .iter()
                .any(|s| Some(s.definition.spec.name.as_str()) == name)
            {
                continue;
            }
            added.push(self.add_service(request.clone()).await?);
        }
        if !added.is_empty() {
            info!(count = added.len(), "seeded services from config");
        }
        Ok(added)
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("monitor stopped");
    }

    async fn ensure_exists(&self, id: &str) -> MonitorResult<()> {
        if self.scheduler.contains(id).await {
            Ok(())
        } else {
            Err(MonitorError::NotFound(id.to_string()))
        }
    }
}
