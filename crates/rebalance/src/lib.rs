//! Consumer-group partition assignment.
//!
//! Whenever topology changes (node added/removed, connection added/removed,
//! partition count changed) the rebalancer resets consumer assignments and
//! deals each topic's partitions round-robin across its subscribed
//! consumers, in connection order. Rebalanced consumers are flagged until
//! the settle timer clears them; while any flag is set the whole cluster is
//! paused, modelling a stop-the-world group rebalance.

mod assignment;
mod rebalancer;

pub use assignment::assign_round_robin;
pub use rebalancer::{settle, PartitionRebalancer, RebalanceOutcome, RebalanceScope, Touched};
