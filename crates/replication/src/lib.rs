//! Replica placement and partition leader failover.
//!
//! - [`resolve_leader`] runs once per topic per tick: it keeps a live
//!   leader, fails over to the first live replica when a controller is
//!   present, or marks the topic offline.
//! - [`select_replicas`] reselects a topic's replica set when its
//!   replication factor changes. Randomness is supplied by the caller so
//!   runs can be made deterministic.

mod failover;
mod placement;

pub use failover::{resolve_leader, FailoverOutcome, OfflineReason};
pub use placement::select_replicas;
