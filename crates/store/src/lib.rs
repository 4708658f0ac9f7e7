//! Entity store for the cluster simulation.
//!
//! Holds the authoritative collection of nodes, the directed connections
//! between them, and the liveness flag of every broker in the fixed pool.
//! The store performs no business logic: it guarantees referential
//! integrity (connection endpoints always exist, removing a node removes
//! every connection touching it) and stable iteration order for the
//! components that read it.

use brokersim_core::CommandError;
use brokersim_types::{
    BrokerId, BrokerLiveness, Connection, Consumer, Node, NodeId, NodeKind, NodeRole, Position,
    Producer, Topic,
};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Nodes, connections and broker liveness for one session.
#[derive(Debug, Clone)]
pub struct EntityStore {
    /// Nodes in insertion order.
    nodes: IndexMap<NodeId, Node>,

    /// Connections in insertion order.
    connections: IndexSet<Connection>,

    /// Liveness of the fixed broker pool.
    brokers: BrokerLiveness,

    /// Id handed to the next inserted node.
    next_id: NodeId,
}

impl EntityStore {
    /// Create an empty store with every broker online.
    pub fn new(brokers: impl IntoIterator<Item = BrokerId>) -> Self {
        Self {
            nodes: IndexMap::new(),
            connections: IndexSet::new(),
            brokers: BrokerLiveness::all_live(brokers),
            next_id: NodeId(1),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nodes
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a node, returning its freshly assigned id.
    pub fn insert_node(&mut self, position: Position, role: NodeRole) -> NodeId {
        let id = self.next_id;
        self.next_id = id.next();
        let node = Node::new(id, position, role);
        debug!(node = %id, kind = %node.kind(), "Inserted node");
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and every connection touching it.
    ///
    /// Returns the removed node and the connections that were cascaded away.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(Node, Vec<Connection>), CommandError> {
        let node = self
            .nodes
            .shift_remove(&id)
            .ok_or(CommandError::UnknownNode(id))?;

        let removed: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| c.touches(id))
            .copied()
            .collect();
        self.connections.retain(|c| !c.touches(id));

        debug!(
            node = %id,
            kind = %node.kind(),
            cascaded_connections = removed.len(),
            "Removed node"
        );
        Ok((node, removed))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All nodes in insertion order, mutably.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn producer(&self, id: NodeId) -> Option<&Producer> {
        self.node(id).and_then(Node::as_producer)
    }

    pub fn topic(&self, id: NodeId) -> Option<&Topic> {
        self.node(id).and_then(Node::as_topic)
    }

    pub fn topic_mut(&mut self, id: NodeId) -> Option<&mut Topic> {
        self.node_mut(id).and_then(Node::as_topic_mut)
    }

    /// Borrow a topic mutably alongside broker liveness.
    pub fn topic_with_brokers(&mut self, id: NodeId) -> Option<(&mut Topic, &BrokerLiveness)> {
        let brokers = &self.brokers;
        self.nodes
            .get_mut(&id)
            .and_then(Node::as_topic_mut)
            .map(|topic| (topic, brokers))
    }

    pub fn consumer(&self, id: NodeId) -> Option<&Consumer> {
        self.node(id).and_then(Node::as_consumer)
    }

    pub fn consumer_mut(&mut self, id: NodeId) -> Option<&mut Consumer> {
        self.node_mut(id).and_then(Node::as_consumer_mut)
    }

    /// Ids of every topic in insertion order.
    pub fn topic_ids(&self) -> Vec<NodeId> {
        self.ids_of(NodeKind::Topic)
    }

    /// Ids of every consumer in insertion order.
    pub fn consumer_ids(&self) -> Vec<NodeId> {
        self.ids_of(NodeKind::Consumer)
    }

    fn ids_of(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.kind() == kind)
            .map(|n| n.id)
            .collect()
    }

    /// Whether any node is mid-rebalance.
    pub fn any_rebalancing(&self) -> bool {
        self.nodes.values().any(Node::is_rebalancing)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Connections
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a connection after checking both endpoints.
    ///
    /// Only producer → topic and topic → consumer links are accepted.
    pub fn insert_connection(&mut self, connection: Connection) -> Result<(), CommandError> {
        let source = self.kind_of(connection.source)?;
        let target = self.kind_of(connection.target)?;

        if !Connection::is_valid_link(source, target) {
            return Err(CommandError::illegal(format!(
                "cannot link {source} to {target}"
            )));
        }

        if !self.connections.insert(connection) {
            return Err(CommandError::DuplicateConnection(connection));
        }

        debug!(%connection, "Inserted connection");
        Ok(())
    }

    /// Remove a single connection.
    pub fn remove_connection(&mut self, connection: Connection) -> Result<(), CommandError> {
        if !self.connections.shift_remove(&connection) {
            return Err(CommandError::illegal(format!(
                "no connection {connection}"
            )));
        }
        debug!(%connection, "Removed connection");
        Ok(())
    }

    fn kind_of(&self, id: NodeId) -> Result<NodeKind, CommandError> {
        self.node(id)
            .map(Node::kind)
            .ok_or(CommandError::UnknownNode(id))
    }

    /// All connections in insertion order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Consumers subscribed to a topic, in connection order.
    pub fn consumers_of(&self, topic: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| c.source == topic)
            .map(|c| c.target)
            .filter(|id| self.consumer(*id).is_some())
            .collect()
    }

    /// Producers writing into a topic, in connection order.
    pub fn producers_of(&self, topic: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| c.target == topic)
            .map(|c| c.source)
            .filter(|id| self.producer(*id).is_some())
            .collect()
    }

    /// Topics a consumer subscribes to, in connection order.
    pub fn topics_of(&self, consumer: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|c| c.target == consumer)
            .map(|c| c.source)
            .filter(|id| self.topic(*id).is_some())
            .collect()
    }

    /// Whether a consumer subscribes to at least one topic.
    pub fn is_subscribed(&self, consumer: NodeId) -> bool {
        self.connections
            .iter()
            .any(|c| c.target == consumer && self.topic(c.source).is_some())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Brokers
    // ═══════════════════════════════════════════════════════════════════════

    pub fn brokers(&self) -> &BrokerLiveness {
        &self.brokers
    }

    pub fn brokers_mut(&mut self) -> &mut BrokerLiveness {
        &mut self.brokers
    }

    /// Remove every node and connection. Broker liveness is untouched.
    ///
    /// Node ids keep counting up so stale ids held by callers never alias
    /// new nodes.
    pub fn clear_topology(&mut self) {
        debug!(
            nodes = self.nodes.len(),
            connections = self.connections.len(),
            "Clearing topology"
        );
        self.nodes.clear();
        self.connections.clear();
    }
}
