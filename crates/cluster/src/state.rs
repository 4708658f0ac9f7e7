//! Combined cluster state machine.

use crate::session::{Session, StatusChange};
use crate::{ClusterConfig, FlowModel};
use brokersim_controller::ControllerState;
use brokersim_core::{Action, Command, CommandError, Event, NodeUpdate, StateMachine, TimerId};
use brokersim_rebalance::{settle, PartitionRebalancer, Touched};
use brokersim_replication::select_replicas;
use brokersim_store::EntityStore;
use brokersim_types::{
    BrokerId, ClusterSnapshot, Connection, Consumer, MetadataMode, MetadataOpKind, NodeId,
    NodeKind, NodeRole, Position, Producer, SessionStatus, Topic,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters collected since the last reset or retry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterStats {
    /// Tick events handled while running.
    pub ticks: u64,
    /// Ticks skipped because a rebalance was settling.
    pub paused_ticks: u64,
    /// Sum over ticks of topics that were offline.
    pub offline_topic_ticks: u64,
    /// Partition leader failovers.
    pub failovers: u64,
    /// Controller changes, including changes to no controller.
    pub controller_changes: u64,
    /// Rebalance passes that flagged at least one consumer.
    pub rebalances: u64,
    /// Commands rejected.
    pub commands_rejected: u64,
}

/// The cluster simulation engine.
///
/// Owns the entity store, the metadata layer, the session status and the
/// flow counters. Every mutation (commands, ticks, settle timer expiry)
/// goes through [`StateMachine::handle`] or [`ClusterStateMachine::execute`],
/// so there is a single serialized path over one authoritative state.
pub struct ClusterStateMachine {
    config: ClusterConfig,

    store: EntityStore,

    /// Mode, primary service, controller and metadata log.
    metadata: ControllerState,

    rebalancer: PartitionRebalancer,

    pub(crate) flow: FlowModel,

    pub(crate) session: Session,

    /// Replica selection randomness, seeded for reproducible runs.
    rng: ChaCha8Rng,

    pub(crate) messages_processed: f64,

    pub(crate) global_lag: f64,

    pub(crate) stats: ClusterStats,

    now: Duration,
}

impl ClusterStateMachine {
    /// Create an idle, empty cluster and run the initial controller election.
    pub fn new(config: ClusterConfig) -> Self {
        let store = EntityStore::new(config.brokers.iter().copied());
        let mut metadata = ControllerState::new(config.initial_mode, config.metadata_log_capacity);
        metadata.elect(store.brokers(), Duration::ZERO);

        info!(
            brokers = ?config.brokers,
            mode = %config.initial_mode,
            controller = ?metadata.controller(),
            "Cluster created"
        );

        Self {
            rebalancer: PartitionRebalancer::new(config.rebalance_scope),
            flow: FlowModel::new(config.lag_scale, config.throughput_multiplier),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            session: Session::default(),
            messages_processed: 0.0,
            global_lag: 0.0,
            stats: ClusterStats::default(),
            now: Duration::ZERO,
            store,
            metadata,
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Read surface
    // ═══════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn mode(&self) -> MetadataMode {
        self.metadata.mode()
    }

    pub fn controller(&self) -> Option<BrokerId> {
        self.metadata.controller()
    }

    pub fn global_lag(&self) -> f64 {
        self.global_lag
    }

    pub fn messages_processed(&self) -> f64 {
        self.messages_processed
    }

    pub fn stats(&self) -> &ClusterStats {
        &self.stats
    }

    /// Full read-only view of the session.
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self.store.nodes().cloned().collect(),
            connections: self.store.connections().copied().collect(),
            brokers: self.store.brokers().clone(),
            controller: self.metadata.controller(),
            mode: self.metadata.mode(),
            primary_service_online: self.metadata.primary_service_online(),
            metadata_log: self.metadata.log().to_vec(),
            messages_processed: self.messages_processed,
            global_lag: self.global_lag,
            status: self.session.status(),
            ticks: self.stats.ticks,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Command surface
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply a command synchronously.
    ///
    /// On rejection the cluster is left exactly as it was.
    pub fn execute(&mut self, command: Command) -> Result<Vec<Action>, CommandError> {
        let name = command.type_name();
        let result = self
            .session
            .admit(&command)
            .and_then(|()| self.apply(command));

        if let Err(error) = &result {
            self.stats.commands_rejected += 1;
            warn!(command = name, %error, "Command rejected");
        }
        result
    }

    fn apply(&mut self, command: Command) -> Result<Vec<Action>, CommandError> {
        match command {
            Command::AddNode { kind, position } => self.add_node(kind, position),
            Command::DeleteNode { id } => self.delete_node(id),
            Command::AddConnection { source, target } => {
                self.add_connection(Connection::new(source, target))
            }
            Command::RemoveConnection { source, target } => {
                self.remove_connection(Connection::new(source, target))
            }
            Command::UpdateNode { id, update } => self.update_node(id, update),
            Command::ToggleBroker { broker } => self.toggle_broker(broker),
            Command::TogglePrimaryService => {
                let (online, change) = self
                    .metadata
                    .toggle_primary_service(self.store.brokers(), self.now);
                info!(online, "Primary metadata service toggled");
                if change.is_some() {
                    self.stats.controller_changes += 1;
                }
                Ok(vec![])
            }
            Command::SetMode { mode } => {
                if self
                    .metadata
                    .set_mode(mode, self.store.brokers(), self.now)
                    .is_some()
                {
                    self.stats.controller_changes += 1;
                }
                Ok(vec![])
            }
            Command::ToggleRunning => self.toggle_running(),
            Command::Reset => Ok(self.reset()),
            Command::Retry => self.retry(),
        }
    }

    fn add_node(&mut self, kind: NodeKind, position: Position) -> Result<Vec<Action>, CommandError> {
        let role = match kind {
            NodeKind::Producer => NodeRole::Producer(Producer::default()),
            NodeKind::Consumer => NodeRole::Consumer(Consumer::default()),
            NodeKind::Topic => {
                self.require_metadata()?;
                let leader = self.initial_leader().ok_or(CommandError::MetadataUnavailable {
                    mode: self.metadata.mode(),
                })?;
                NodeRole::Topic(Topic::led_by(leader))
            }
        };

        let id = self.store.insert_node(position, role);
        info!(node = %id, %kind, "Node added");

        let touched = match kind {
            NodeKind::Topic => {
                self.metadata
                    .record(self.now, MetadataOpKind::CreateTopic { topic: id });
                Touched::topic(id)
            }
            NodeKind::Consumer => Touched::consumer(id),
            NodeKind::Producer => Touched::default(),
        };
        Ok(self.rebalance(&touched))
    }

    /// Leader for a new topic: the controller, else the lowest live broker,
    /// else the lowest broker.
    fn initial_leader(&self) -> Option<BrokerId> {
        let brokers = self.store.brokers();
        self.metadata
            .controller()
            .or_else(|| brokers.live().next())
            .or_else(|| brokers.ids().next())
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Vec<Action>, CommandError> {
        let (node, removed) = self.store.remove_node(id)?;
        info!(node = %id, kind = %node.kind(), "Node deleted");

        let touched = match node.kind() {
            NodeKind::Topic => Touched {
                topics: Vec::new(),
                consumers: removed
                    .iter()
                    .filter(|c| c.source == id)
                    .map(|c| c.target)
                    .collect(),
            },
            NodeKind::Consumer => Touched {
                topics: removed.iter().map(|c| c.source).collect(),
                consumers: Vec::new(),
            },
            NodeKind::Producer => Touched::default(),
        };
        Ok(self.rebalance(&touched))
    }

    fn add_connection(&mut self, connection: Connection) -> Result<Vec<Action>, CommandError> {
        match self.store.insert_connection(connection) {
            Ok(()) => {}
            Err(CommandError::DuplicateConnection(existing)) => {
                debug!(connection = %existing, "Duplicate connection ignored");
                return Ok(vec![]);
            }
            Err(error) => return Err(error),
        }
        info!(%connection, "Connection added");
        let touched = self.touched_by(connection);
        Ok(self.rebalance(&touched))
    }

    fn remove_connection(&mut self, connection: Connection) -> Result<Vec<Action>, CommandError> {
        self.store.remove_connection(connection)?;
        info!(%connection, "Connection removed");
        let touched = self.touched_by(connection);
        Ok(self.rebalance(&touched))
    }

    fn touched_by(&self, connection: Connection) -> Touched {
        let mut touched = Touched::default();
        for id in [connection.source, connection.target] {
            match self.store.node(id).map(|n| n.kind()) {
                Some(NodeKind::Topic) => touched.topics.push(id),
                Some(NodeKind::Consumer) => touched.consumers.push(id),
                _ => {}
            }
        }
        touched
    }

    fn update_node(&mut self, id: NodeId, update: NodeUpdate) -> Result<Vec<Action>, CommandError> {
        let node = self.store.node(id).ok_or(CommandError::UnknownNode(id))?;
        let kind = node.kind();
        let topic = node.as_topic().cloned();

        // Validate everything before touching state.
        if let Some(rate) = update.rate {
            if kind == NodeKind::Topic {
                return Err(CommandError::invalid("topics have no rate"));
            }
            if !rate.is_finite() || rate < 0.0 {
                return Err(CommandError::invalid(format!(
                    "rate must be a non-negative number, got {rate}"
                )));
            }
        }
        if let Some(partitions) = update.partitions {
            if topic.is_none() {
                return Err(CommandError::invalid(format!("{kind} has no partitions")));
            }
            if partitions == 0 {
                return Err(CommandError::invalid("a topic needs at least one partition"));
            }
        }
        if let Some(group) = &update.group {
            if kind != NodeKind::Consumer {
                return Err(CommandError::invalid(format!("{kind} has no consumer group")));
            }
            if group.trim().is_empty() {
                return Err(CommandError::invalid("consumer group name is empty"));
            }
        }
        let mut reassign = None;
        if let Some(factor) = update.replication_factor {
            let topic = topic.as_ref().ok_or_else(|| {
                CommandError::invalid(format!("{kind} has no replication factor"))
            })?;
            let max = self.config.max_replication_factor();
            if factor == 0 || factor > max {
                return Err(CommandError::invalid(format!(
                    "replication factor must be between 1 and {max}, got {factor}"
                )));
            }
            if factor != topic.replication_factor {
                self.require_metadata()?;
                reassign = Some((factor, topic.active_leader));
            }
        }

        if let Some(rate) = update.rate {
            if let Some(node) = self.store.node_mut(id) {
                match &mut node.role {
                    NodeRole::Producer(p) => p.rate = rate,
                    NodeRole::Consumer(c) => c.rate = rate,
                    NodeRole::Topic(_) => {}
                }
            }
            debug!(node = %id, rate, "Rate updated");
        }

        if let Some(group) = update.group {
            if let Some(consumer) = self.store.consumer_mut(id) {
                debug!(node = %id, %group, "Consumer group updated");
                consumer.group = group;
            }
        }

        if let Some((factor, leader)) = reassign {
            let replicas =
                select_replicas(&self.config.brokers, leader, factor as usize, &mut self.rng);
            if let Some(topic) = self.store.topic_mut(id) {
                topic.replication_factor = factor;
                topic.replicas = replicas.clone();
            }
            info!(topic = %id, factor, replicas = ?replicas, "Replicas reassigned");
            self.metadata.record(
                self.now,
                MetadataOpKind::ReassignReplicas { topic: id, replicas },
            );
        }

        let mut actions = Vec::new();
        if let (Some(partitions), Some(topic)) = (update.partitions, topic) {
            if partitions != topic.partitions {
                if let Some(t) = self.store.topic_mut(id) {
                    t.partitions = partitions;
                }
                info!(topic = %id, partitions, "Partition count changed");
                actions.extend(self.rebalance(&Touched::topic(id)));
            }
        }
        Ok(actions)
    }

    fn toggle_broker(&mut self, broker: BrokerId) -> Result<Vec<Action>, CommandError> {
        let live = self
            .store
            .brokers_mut()
            .toggle(broker)
            .ok_or(CommandError::UnknownBroker(broker))?;
        info!(%broker, live, "Broker toggled");

        if self.metadata.elect(self.store.brokers(), self.now).is_some() {
            self.stats.controller_changes += 1;
        }
        Ok(vec![])
    }

    fn toggle_running(&mut self) -> Result<Vec<Action>, CommandError> {
        let change = self.session.toggle_running()?;
        let timer = if change.to.is_running() {
            Action::SetTimer {
                id: TimerId::Tick,
                duration: self.config.tick_interval,
            }
        } else {
            Action::CancelTimer { id: TimerId::Tick }
        };
        Ok([timer].into_iter().chain(change.action()).collect())
    }

    /// Clear topology and counters, restore brokers and the metadata service.
    fn reset(&mut self) -> Vec<Action> {
        self.store.clear_topology();
        self.store.brokers_mut().restore_all();
        self.metadata.reset(self.store.brokers(), self.now);
        self.clear_counters();
        let change = self.session.reset();
        info!(mode = %self.metadata.mode(), "Cluster reset");
        Self::cancel_timers(change)
    }

    /// Zero lag and counters, keep topology.
    fn retry(&mut self) -> Result<Vec<Action>, CommandError> {
        let change = self.session.retry()?;
        for node in self.store.nodes_mut() {
            match &mut node.role {
                NodeRole::Topic(t) => {
                    t.lag = 0.0;
                    t.offline = false;
                }
                NodeRole::Consumer(c) => c.rebalancing = false,
                NodeRole::Producer(_) => {}
            }
        }
        self.clear_counters();
        info!("Session retried");
        Ok(Self::cancel_timers(change))
    }

    fn clear_counters(&mut self) {
        self.messages_processed = 0.0;
        self.global_lag = 0.0;
        self.stats = ClusterStats::default();
    }

    fn cancel_timers(change: StatusChange) -> Vec<Action> {
        [
            Action::CancelTimer { id: TimerId::Tick },
            Action::CancelTimer {
                id: TimerId::RebalanceSettle,
            },
        ]
        .into_iter()
        .chain(change.action())
        .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn require_metadata(&self) -> Result<(), CommandError> {
        if self.metadata.is_available() {
            Ok(())
        } else {
            Err(CommandError::MetadataUnavailable {
                mode: self.metadata.mode(),
            })
        }
    }

    /// Run the rebalancer and arm the settle timer if anyone was flagged.
    fn rebalance(&mut self, touched: &Touched) -> Vec<Action> {
        let outcome = self.rebalancer.rebalance(&mut self.store, touched);
        if !outcome.needs_settle() {
            return vec![];
        }
        self.stats.rebalances += 1;
        debug!(
            topics = outcome.topics.len(),
            consumers = outcome.flagged.len(),
            "Consumer group rebalancing"
        );
        vec![Action::SetTimer {
            id: TimerId::RebalanceSettle,
            duration: self.config.rebalance_settle,
        }]
    }

    pub(crate) fn on_rebalance_settled(&mut self) -> Vec<Action> {
        let cleared = settle(self.store_mut());
        if cleared > 0 {
            debug!(consumers = cleared, "Rebalance settled");
        }
        vec![]
    }
}

impl StateMachine for ClusterStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Tick => self.on_tick(),
            Event::RebalanceSettled => self.on_rebalance_settled(),
            Event::Command {
                request_id,
                command,
            } => match self.execute(command) {
                Ok(mut actions) => {
                    actions.push(Action::EmitCommandResult {
                        request_id,
                        result: Ok(()),
                    });
                    actions
                }
                Err(error) => vec![Action::EmitCommandResult {
                    request_id,
                    result: Err(error),
                }],
            },
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
