//! Cluster controller election and metadata operation log.
//!
//! Exactly one broker (or none) holds the controller role. The controller
//! authorizes partition leader failover and, in SELF-MANAGED mode, every
//! metadata change. Each controller change is recorded in a bounded log,
//! tagged by the metadata mode in effect.

mod log;
mod state;

pub use log::{MetadataLog, DEFAULT_LOG_CAPACITY};
pub use state::{ControllerChange, ControllerState};
