//! StateStore: redb-backed persistence for upwatch.
//!
//! Stores service definitions, probe outcomes, and state changes. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use upwatch_core::{ProbeOutcome, ServiceDefinition, ServiceSpec, StateChange, unix_millis};

use crate::error::{StateError, StateResult};
use crate::persistence::Persistence;
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type HistoryTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICES).map_err(map_err!(Table))?;
        txn.open_table(OUTCOMES).map_err(map_err!(Table))?;
        txn.open_table(STATE_CHANGES).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn append_record<T: Serialize>(
        &self,
        table_def: HistoryTable,
        service_id: &str,
        record: &T,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let seq = next_seq(&txn, HISTORY_SEQ)?;
            let key = history_key(service_id, seq);
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn list_records<T: DeserializeOwned>(
        &self,
        table_def: HistoryTable,
        service_id: &str,
        limit: usize,
    ) -> StateResult<Vec<T>> {
        let (start, end) = history_range(service_id);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Read))?
            .rev()
            .take(limit)
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }
}

impl Persistence for StateStore {
    fn create_service(&self, spec: &ServiceSpec) -> StateResult<ServiceDefinition> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let definition = {
            let seq = next_seq(&txn, SERVICE_SEQ)?;
            let definition = ServiceDefinition {
                id: format!("svc-{seq}"),
                spec: spec.clone(),
                created_at: unix_millis(),
            };
            let value = serde_json::to_vec(&definition).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            table
                .insert(definition.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            definition
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(service_id = %definition.id, name = %definition.spec.name, "service stored");
        Ok(definition)
    }

    fn get_service(&self, id: &str) -> StateResult<Option<ServiceDefinition>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let definition: ServiceDefinition =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(definition))
            }
            None => Ok(None),
        }
    }

    fn list_services(&self) -> StateResult<Vec<ServiceDefinition>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let definition: ServiceDefinition =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(definition);
        }
        results.sort_by_key(|d| d.created_at);
        Ok(results)
    }

    fn delete_service(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        let purged;
        {
            let mut services = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            existed = services.remove(id).map_err(map_err!(Write))?.is_some();
            let mut outcomes = txn.open_table(OUTCOMES).map_err(map_err!(Table))?;
            let mut changes = txn.open_table(STATE_CHANGES).map_err(map_err!(Table))?;
            purged = remove_history(&mut outcomes, id)? + remove_history(&mut changes, id)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(service_id = %id, existed, purged, "service deleted");
        Ok(existed)
    }

    fn append_outcome(&self, outcome: &ProbeOutcome) -> StateResult<()> {
        self.append_record(OUTCOMES, &outcome.service_id, outcome)
    }

    fn list_outcomes(&self, id: &str, limit: usize) -> StateResult<Vec<ProbeOutcome>> {
        self.list_records(OUTCOMES, id, limit)
    }

    fn clear_outcomes(&self, id: &str) -> StateResult<u32> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(OUTCOMES).map_err(map_err!(Table))?;
            removed = remove_history(&mut table, id)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(removed)
    }

    fn append_state_change(&self, change: &StateChange) -> StateResult<()> {
        self.append_record(STATE_CHANGES, &change.service_id, change)
    }

    fn list_state_changes(&self, id: &str, limit: usize) -> StateResult<Vec<StateChange>> {
        self.list_records(STATE_CHANGES, id, limit)
    }

    fn clear_history(&self, id: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut outcomes = txn.open_table(OUTCOMES).map_err(map_err!(Table))?;
            let mut changes = txn.open_table(STATE_CHANGES).map_err(map_err!(Table))?;
            removed = remove_history(&mut outcomes, id)? + remove_history(&mut changes, id)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(service_id = %id, removed, "history cleared");
        Ok(())
    }

    fn flush_all(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // The META counters survive so ids are never reused.
        for table_def in [SERVICES, OUTCOMES, STATE_CHANGES] {
            txn.delete_table(table_def).map_err(map_err!(Table))?;
            txn.open_table(table_def).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!("state store flushed");
        Ok(())
    }
}

/// Bump and return a counter from the META table.
fn next_seq(txn: &WriteTransaction, key: &str) -> StateResult<u64> {
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    let next = meta
        .get(key)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0)
        + 1;
    meta.insert(key, next).map_err(map_err!(Write))?;
    Ok(next)
}

/// Remove every history record of one service from an open table.
fn remove_history(
    table: &mut Table<&'static str, &'static [u8]>,
    service_id: &str,
) -> StateResult<u32> {
    let (start, end) = history_range(service_id);
    // Collect keys first; the range iterator borrows the table.
    let keys: Vec<String> = table
        .range(start.as_str()..end.as_str())
        .map_err(map_err!(Read))?
        .map(|entry| entry.map(|(key, _)| key.value().to_string()))
        .collect::<Result<_, _>>()
        .map_err(map_err!(Read))?;
    for key in &keys {
        table.remove(key.as_str()).map_err(map_err!(Write))?;
    }
    Ok(keys.len() as u32)
}
