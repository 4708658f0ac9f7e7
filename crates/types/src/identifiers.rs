//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a simulated node (producer, topic or consumer).
///
/// Assigned by the entity store from a monotonically increasing counter and
/// never reused within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Get the next node id.
    pub fn next(self) -> Self {
        NodeId(self.0 + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Broker identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BrokerId(pub u32);

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Broker({})", self.0)
    }
}

/// Index of a partition within a topic.
pub type PartitionIndex = u32;
