//! The storage boundary used by the monitoring core.
//!
//! The scheduler and history recorder only ever talk to a
//! `dyn Persistence`, so the redb-backed [`StateStore`](crate::StateStore)
//! can be swapped for another backend without touching them.

use upwatch_core::{ProbeOutcome, ServiceDefinition, ServiceSpec, StateChange};

use crate::error::StateResult;

pub trait Persistence: Send + Sync {
    /// Persist a new service and assign its id.
    fn create_service(&self, spec: &ServiceSpec) -> StateResult<ServiceDefinition>;

    fn get_service(&self, id: &str) -> StateResult<Option<ServiceDefinition>>;

    fn list_services(&self) -> StateResult<Vec<ServiceDefinition>>;

    /// Remove a service and all of its history. Returns false if unknown.
    fn delete_service(&self, id: &str) -> StateResult<bool>;

    fn append_outcome(&self, outcome: &ProbeOutcome) -> StateResult<()>;

    /// Most recent outcomes for a service, newest first.
    fn list_outcomes(&self, id: &str, limit: usize) -> StateResult<Vec<ProbeOutcome>>;

    /// Delete every outcome of a service. Returns the number removed.
    fn clear_outcomes(&self, id: &str) -> StateResult<u32>;

    fn append_state_change(&self, change: &StateChange) -> StateResult<()>;

    /// Most recent state changes for a service, newest first.
    fn list_state_changes(&self, id: &str, limit: usize) -> StateResult<Vec<StateChange>>;

    /// Delete outcomes and state changes of a service in one transaction.
    fn clear_history(&self, id: &str) -> StateResult<()>;

    /// Drop every service and all history.
    fn flush_all(&self) -> StateResult<()>;
}
