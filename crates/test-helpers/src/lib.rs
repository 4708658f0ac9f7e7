//! Test helpers for building cluster topologies.
//!
//! Every fixture goes through the public command surface of a
//! [`SimulationRunner`], so tests exercise the same validation and
//! rebalancing a user would trigger.

use brokersim_cluster::ClusterConfig;
use brokersim_core::{Command, NodeUpdate};
use brokersim_simulation::SimulationRunner;
use brokersim_types::{NodeId, NodeKind};

/// A runner over a default-configured cluster.
pub fn runner() -> SimulationRunner {
    SimulationRunner::new(ClusterConfig::default())
}

/// Add a node and return its id.
///
/// # Panics
///
/// Panics if the engine rejects the node.
pub fn add_node(runner: &mut SimulationRunner, kind: NodeKind) -> NodeId {
    let snapshot = runner
        .submit(Command::add(kind))
        .unwrap_or_else(|e| panic!("adding {kind} rejected: {e}"));
    snapshot
        .nodes
        .last()
        .map(|n| n.id)
        .unwrap_or_else(|| panic!("no node after adding {kind}"))
}

/// Connect two nodes.
pub fn connect(runner: &mut SimulationRunner, source: NodeId, target: NodeId) {
    runner
        .submit(Command::connect(source, target))
        .unwrap_or_else(|e| panic!("connecting {source} -> {target} rejected: {e}"));
}

/// Apply a node update.
pub fn update(runner: &mut SimulationRunner, id: NodeId, update: NodeUpdate) {
    runner
        .submit(Command::UpdateNode { id, update })
        .unwrap_or_else(|e| panic!("updating {id} rejected: {e}"));
}

/// Run the clock past the rebalance settle window.
pub fn settle(runner: &mut SimulationRunner) {
    let settle = runner.cluster().config().rebalance_settle;
    runner.run_for(settle);
}

/// Ids of a producer → topic → consumers chain.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub producer: NodeId,
    pub topic: NodeId,
    pub consumers: Vec<NodeId>,
}

/// Shape of a pipeline to build.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub producer_rate: f64,
    pub partitions: u32,
    pub consumer_rates: Vec<f64>,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            producer_rate: 5.0,
            partitions: 1,
            consumer_rates: vec![5.0],
        }
    }
}

impl PipelineSpec {
    pub fn with_producer_rate(mut self, rate: f64) -> Self {
        self.producer_rate = rate;
        self
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_consumers(mut self, rates: impl IntoIterator<Item = f64>) -> Self {
        self.consumer_rates = rates.into_iter().collect();
        self
    }
}

/// Build a pipeline and let its rebalance settle.
///
/// The session is left idle; the clock advances by the settle window.
pub fn build_pipeline(runner: &mut SimulationRunner, spec: &PipelineSpec) -> Pipeline {
    let producer = add_node(runner, NodeKind::Producer);
    let topic = add_node(runner, NodeKind::Topic);
    update(runner, producer, NodeUpdate::rate(spec.producer_rate));
    if spec.partitions != 1 {
        update(runner, topic, NodeUpdate::partitions(spec.partitions));
    }
    connect(runner, producer, topic);

    let consumers = spec
        .consumer_rates
        .iter()
        .map(|&rate| {
            let consumer = add_node(runner, NodeKind::Consumer);
            update(runner, consumer, NodeUpdate::rate(rate));
            connect(runner, topic, consumer);
            consumer
        })
        .collect();

    settle(runner);
    Pipeline {
        producer,
        topic,
        consumers,
    }
}

/// Start the session.
pub fn start(runner: &mut SimulationRunner) {
    runner
        .submit(Command::ToggleRunning)
        .unwrap_or_else(|e| panic!("start rejected: {e}"));
}
