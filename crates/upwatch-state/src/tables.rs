//! redb table definitions for the upwatch state store.
//!
//! History tables are keyed `{service_id}:{seq:020}` where `seq` comes from
//! a store-wide counter, so a range scan over one service's prefix yields
//! its records in insertion order.

use redb::TableDefinition;

/// Service definitions keyed by service id.
pub const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Probe outcomes keyed by `{service_id}:{seq}`.
pub const OUTCOMES: TableDefinition<&str, &[u8]> = TableDefinition::new("outcomes");

/// Health state transitions keyed by `{service_id}:{seq}`.
pub const STATE_CHANGES: TableDefinition<&str, &[u8]> = TableDefinition::new("state_changes");

/// Monotonic counters (id and history sequences).
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const SERVICE_SEQ: &str = "service_seq";
pub const HISTORY_SEQ: &str = "history_seq";

/// Key for one history record.
pub fn history_key(service_id: &str, seq: u64) -> String {
    format!("{service_id}:{seq:020}")
}

/// Half-open key range covering every history record of a service.
pub fn history_range(service_id: &str) -> (String, String) {
    // ';' sorts immediately after ':'.
    (format!("{service_id}:"), format!("{service_id};"))
}
