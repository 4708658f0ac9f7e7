//! Read-only views of the cluster for rendering and advisory collaborators.

use crate::{
    BrokerId, BrokerLiveness, Connection, MetadataMode, MetadataOp, Node, NodeKind, SessionStatus,
};
use serde::{Deserialize, Serialize};

/// Full state of one simulation session, published after every mutation and tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub brokers: BrokerLiveness,
    pub controller: Option<BrokerId>,
    pub mode: MetadataMode,
    pub primary_service_online: bool,
    pub metadata_log: Vec<MetadataOp>,
    pub messages_processed: f64,
    pub global_lag: f64,
    pub status: SessionStatus,
    /// Ticks applied since the last reset or retry.
    pub ticks: u64,
}

impl ClusterSnapshot {
    /// Count nodes of a given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }

    /// Look up a node by id.
    pub fn node(&self, id: crate::NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Project down to what the advisory collaborator is allowed to see.
    pub fn advisory(&self) -> AdvisorySnapshot {
        AdvisorySnapshot::from(self)
    }
}

/// Summary handed to the advisory text service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorySnapshot {
    pub status: SessionStatus,
    pub global_lag: f64,
    pub messages_processed: f64,
    pub producers: usize,
    pub topics: usize,
    pub consumers: usize,
    pub connections: usize,
    pub offline_topics: usize,
    pub idle_consumers: usize,
    pub controller: Option<BrokerId>,
    pub mode: MetadataMode,
}

impl From<&ClusterSnapshot> for AdvisorySnapshot {
    fn from(snapshot: &ClusterSnapshot) -> Self {
        let offline_topics = snapshot
            .nodes
            .iter()
            .filter_map(Node::as_topic)
            .filter(|t| t.offline)
            .count();
        let idle_consumers = snapshot
            .nodes
            .iter()
            .filter_map(Node::as_consumer)
            .filter(|c| c.is_idle())
            .count();

        Self {
            status: snapshot.status,
            global_lag: snapshot.global_lag,
            messages_processed: snapshot.messages_processed,
            producers: snapshot.count(NodeKind::Producer),
            topics: snapshot.count(NodeKind::Topic),
            consumers: snapshot.count(NodeKind::Consumer),
            connections: snapshot.connections.len(),
            offline_topics,
            idle_consumers,
            controller: snapshot.controller,
            mode: snapshot.mode,
        }
    }
}
