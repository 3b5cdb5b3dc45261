//! Durable, atomically-written snapshots of per-session aggregator state.
//! One JSON file per session, grouped under a project-hash directory, so a
//! restart can restore incremental reading and aggregation without
//! replaying every event a session has ever produced.

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{SnapshotStore, StoredSnapshot, STORE_SCHEMA_VERSION};
