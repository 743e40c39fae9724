//! upwatch-state: embedded persistence for upwatch.
//!
//! Backed by [redb](https://docs.rs/redb). Holds service definitions and
//! their append-only history (probe outcomes and health state changes).
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! History keys (`{service_id}:{seq}`) enable prefix range scans per
//! service, which is how history is listed, reset, and purged.
//!
//! The monitoring core depends only on the [`Persistence`] trait; the
//! [`StateStore`] is its redb implementation. `StateStore` is `Clone` +
//! `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod persistence;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use persistence::Persistence;
pub use store::StateStore;
