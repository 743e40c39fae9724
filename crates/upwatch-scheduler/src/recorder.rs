//! Writes probe outcomes and state changes to persistence.
//!
//! History writes never fail a probe cycle: errors are logged and the
//! in-memory state stays authoritative for scheduling.

use std::sync::Arc;

use tracing::{debug, warn};

use upwatch_core::{ProbeOutcome, StateChange};
use upwatch_state::{Persistence, StateError, StateResult};

#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn Persistence>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Append an outcome and, if present, the transition it caused.
    ///
    /// The redb commit runs on the blocking pool; the returned future
    /// completes once it is durable (or has failed and been logged).
    pub async fn record(&self, outcome: ProbeOutcome, change: Option<StateChange>) {
        let store = self.store.clone();
        let service_id = outcome.service_id.clone();
        let write = tokio::task::spawn_blocking(move || {
            write_history(store.as_ref(), &outcome, change.as_ref());
        });
        if let Err(e) = write.await {
            warn!(service_id = %service_id, error = %e, "history writer task failed");
        }
    }

    /// Drop all outcomes and state changes of a service.
    pub async fn reset(&self, service_id: &str) -> StateResult<()> {
        let store = self.store.clone();
        let id = service_id.to_string();
        tokio::task::spawn_blocking(move || store.clear_history(&id))
            .await
            .map_err(|e| StateError::Write(format!("history reset task failed: {e}")))?
    }

    pub fn outcomes(&self, service_id: &str, limit: usize) -> StateResult<Vec<ProbeOutcome>> {
        self.store.list_outcomes(service_id, limit)
    }

    pub fn state_changes(&self, service_id: &str, limit: usize) -> StateResult<Vec<StateChange>> {
        self.store.list_state_changes(service_id, limit)
    }
}

fn write_history(store: &dyn Persistence, outcome: &ProbeOutcome, change: Option<&StateChange>) {
    if let Err(e) = store.append_outcome(outcome) {
        warn!(service_id = %outcome.service_id, error = %e, "failed to record probe outcome");
    }
    if let Some(change) = change {
        match store.append_state_change(change) {
            Ok(()) => debug!(
                service_id = %change.service_id,
                from = %change.from,
                to = %change.to,
                "state change recorded"
            ),
            Err(e) => warn!(
                service_id = %change.service_id,
                error = %e,
                "failed to record state change"
            ),
        }
    }
}
