//! Simulated nodes and the connections between them.

use crate::{BrokerId, NodeId, PartitionIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default production rate for a new producer.
pub const DEFAULT_PRODUCER_RATE: f64 = 5.0;

/// Default processing rate for a new consumer.
pub const DEFAULT_CONSUMER_RATE: f64 = 5.0;

/// Default consumer group for a new consumer.
pub const DEFAULT_CONSUMER_GROUP: &str = "group-1";

/// The variant of a node, without its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Producer,
    Topic,
    Consumer,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Producer => write!(f, "producer"),
            NodeKind::Topic => write!(f, "topic"),
            NodeKind::Consumer => write!(f, "consumer"),
        }
    }
}

/// Canvas position. Owned by the rendering layer and carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Emits messages into every topic it is connected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    /// Messages per tick unit. Never negative.
    pub rate: f64,
}

impl Default for Producer {
    fn default() -> Self {
        Self {
            rate: DEFAULT_PRODUCER_RATE,
        }
    }
}

/// A partitioned, replicated log with a backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Number of partitions, at least 1.
    pub partitions: u32,

    /// Configured replication factor (1..=3).
    pub replication_factor: u8,

    /// Brokers holding a copy of this topic, in preference order.
    ///
    /// Always `replication_factor` pairwise-distinct brokers.
    pub replicas: Vec<BrokerId>,

    /// Broker currently serving this topic. When set, a member of `replicas`.
    pub active_leader: Option<BrokerId>,

    /// Backlog of unprocessed messages. Never negative.
    pub lag: f64,

    /// Whether the topic had no reachable leader on the last tick.
    pub offline: bool,
}

impl Topic {
    /// Create a single-partition, single-replica topic led by `leader`.
    pub fn led_by(leader: BrokerId) -> Self {
        Self {
            partitions: 1,
            replication_factor: 1,
            replicas: vec![leader],
            active_leader: Some(leader),
            lag: 0.0,
            offline: false,
        }
    }

    /// Check that the leader is one of the replicas (or unset).
    pub fn leader_is_replica(&self) -> bool {
        self.active_leader
            .map(|leader| self.replicas.contains(&leader))
            .unwrap_or(true)
    }
}

/// Processes messages from the partitions assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    /// Consumer group name.
    pub group: String,

    /// Messages per tick unit this consumer can drain. Never negative.
    pub rate: f64,

    /// Partition indices assigned across every topic this consumer reads.
    pub assigned: Vec<PartitionIndex>,

    /// Set while a group rebalance is settling.
    pub rebalancing: bool,
}

impl Consumer {
    /// A consumer with no assigned partitions does no work.
    pub fn is_idle(&self) -> bool {
        self.assigned.is_empty()
    }
}

impl Default for Consumer {
    fn default() -> Self {
        Self {
            group: DEFAULT_CONSUMER_GROUP.to_string(),
            rate: DEFAULT_CONSUMER_RATE,
            assigned: Vec::new(),
            rebalancing: false,
        }
    }
}

/// Type-specific fields of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeRole {
    Producer(Producer),
    Topic(Topic),
    Consumer(Consumer),
}

/// A simulated participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    pub role: NodeRole,
}

impl Node {
    pub fn new(id: NodeId, position: Position, role: NodeRole) -> Self {
        Self { id, position, role }
    }

    pub fn kind(&self) -> NodeKind {
        match self.role {
            NodeRole::Producer(_) => NodeKind::Producer,
            NodeRole::Topic(_) => NodeKind::Topic,
            NodeRole::Consumer(_) => NodeKind::Consumer,
        }
    }

    pub fn as_producer(&self) -> Option<&Producer> {
        match &self.role {
            NodeRole::Producer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_producer_mut(&mut self) -> Option<&mut Producer> {
        match &mut self.role {
            NodeRole::Producer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_topic(&self) -> Option<&Topic> {
        match &self.role {
            NodeRole::Topic(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_topic_mut(&mut self) -> Option<&mut Topic> {
        match &mut self.role {
            NodeRole::Topic(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_consumer(&self) -> Option<&Consumer> {
        match &self.role {
            NodeRole::Consumer(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_consumer_mut(&mut self) -> Option<&mut Consumer> {
        match &mut self.role {
            NodeRole::Consumer(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this node is mid-rebalance. Only consumers ever are.
    pub fn is_rebalancing(&self) -> bool {
        self.as_consumer().map(|c| c.rebalancing).unwrap_or(false)
    }
}

/// A directed edge: producer → topic ("produces into") or
/// topic → consumer ("subscribes from").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
}

impl Connection {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self { source, target }
    }

    /// Check if this connection touches the given node at either end.
    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }

    /// Whether an edge between these node kinds is meaningful.
    pub fn is_valid_link(source: NodeKind, target: NodeKind) -> bool {
        matches!(
            (source, target),
            (NodeKind::Producer, NodeKind::Topic) | (NodeKind::Topic, NodeKind::Consumer)
        )
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
