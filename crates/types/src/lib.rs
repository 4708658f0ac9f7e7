//! Core types for the broker cluster simulation.
//!
//! Everything here is plain data: nodes and connections held by the entity
//! store, broker liveness, the metadata log, and the snapshots published to
//! rendering and advisory collaborators. Behaviour lives in the component
//! crates that consume these types.

mod cluster;
mod identifiers;
mod node;
mod snapshot;

pub use cluster::{BrokerLiveness, MetadataMode, MetadataOp, MetadataOpKind, SessionStatus};
pub use identifiers::{BrokerId, NodeId, PartitionIndex};
pub use node::{
    Connection, Consumer, Node, NodeKind, NodeRole, Position, Producer, Topic,
    DEFAULT_CONSUMER_GROUP, DEFAULT_CONSUMER_RATE, DEFAULT_PRODUCER_RATE,
};
pub use snapshot::{AdvisorySnapshot, ClusterSnapshot};

/// Broker ids of the reference three-broker cluster.
pub const DEFAULT_BROKERS: [BrokerId; 3] = [BrokerId(101), BrokerId(102), BrokerId(103)];

/// Largest replication factor a topic may be configured with.
pub const MAX_REPLICATION_FACTOR: u8 = 3;
