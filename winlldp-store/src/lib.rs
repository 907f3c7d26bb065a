//! Durable neighbor table for winlldp
//!
//! Neighbor records keyed by (interface, chassis id, port id), persisted as
//! one JSON document with atomic-rename commits and a cross-process
//! advisory lock for writers.

pub mod record;
pub mod store;

pub use record::{format_id, parse_id, IdKind, NeighborKey, NeighborRecord};
pub use store::{NeighborStore, NeighborTable, UpsertOutcome};
