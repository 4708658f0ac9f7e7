//! Scenario files: a config override table and a timeline of commands.
//!
//! ```toml
//! duration_secs = 30
//!
//! [config]
//! seed = 7
//! rebalance_scope = "affected_topics"
//!
//! [[steps]]
//! at_ms = 0
//! command = "add_node"
//! kind = "producer"
//!
//! [[steps]]
//! at_ms = 4000
//! command = "toggle_broker"
//! broker = 101
//! ```
//!
//! Node ids are assigned from 1 in creation order, so later steps can
//! refer to nodes created by earlier ones.

use brokersim_cluster::{ClusterConfig, RebalanceScope};
use brokersim_core::{Command, NodeUpdate};
use brokersim_types::{MetadataMode, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Why a scenario could not be loaded.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// Optional overrides of [`ClusterConfig`] fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub tick_interval_ms: Option<u64>,
    pub rebalance_settle_ms: Option<u64>,
    pub lag_scale: Option<f64>,
    pub throughput_multiplier: Option<f64>,
    pub lag_ceiling: Option<f64>,
    pub metadata_log_capacity: Option<usize>,
    pub rebalance_scope: Option<RebalanceScope>,
    pub mode: Option<MetadataMode>,
    pub seed: Option<u64>,
}

impl ConfigOverrides {
    /// Apply every present override on top of `config`.
    pub fn apply(&self, mut config: ClusterConfig) -> ClusterConfig {
        if let Some(ms) = self.tick_interval_ms {
            config = config.with_tick_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.rebalance_settle_ms {
            config = config.with_rebalance_settle(Duration::from_millis(ms));
        }
        if let Some(k) = self.lag_scale {
            config = config.with_lag_scale(k);
        }
        if let Some(multiplier) = self.throughput_multiplier {
            config = config.with_throughput_multiplier(multiplier);
        }
        if let Some(ceiling) = self.lag_ceiling {
            config = config.with_lag_ceiling(ceiling);
        }
        if let Some(capacity) = self.metadata_log_capacity {
            config = config.with_metadata_log_capacity(capacity);
        }
        if let Some(scope) = self.rebalance_scope {
            config = config.with_rebalance_scope(scope);
        }
        if let Some(mode) = self.mode {
            config = config.with_mode(mode);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.tick_interval_ms == Some(0) {
            return Err(ScenarioError::Invalid("tick_interval_ms must be positive".into()));
        }
        for (name, value) in [
            ("lag_scale", self.lag_scale),
            ("throughput_multiplier", self.throughput_multiplier),
            ("lag_ceiling", self.lag_ceiling),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ScenarioError::Invalid(format!(
                        "{name} must be a positive number, got {value}"
                    )));
                }
            }
        }
        if self.metadata_log_capacity == Some(0) {
            return Err(ScenarioError::Invalid(
                "metadata_log_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A command applied at a fixed offset from the start of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub command: Command,
}

impl ScenarioStep {
    pub fn at(at_ms: u64, command: Command) -> Self {
        Self { at_ms, command }
    }

    pub fn time(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

/// A complete run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Simulated run length.
    pub duration_secs: u64,

    #[serde(default)]
    pub config: ConfigOverrides,

    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Parse and validate a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Read a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// A producer → topic → consumers pipeline, started after the initial
    /// rebalance settles.
    pub fn pipeline(
        duration_secs: u64,
        producer_rate: f64,
        consumer_rate: f64,
        consumers: u32,
        partitions: u32,
    ) -> Self {
        let producer = NodeId(1);
        let topic = NodeId(2);
        let mut steps = vec![
            ScenarioStep::at(0, Command::add(NodeKind::Producer)),
            ScenarioStep::at(0, Command::add(NodeKind::Topic)),
            ScenarioStep::at(
                0,
                Command::UpdateNode {
                    id: producer,
                    update: NodeUpdate::rate(producer_rate),
                },
            ),
            ScenarioStep::at(
                0,
                Command::UpdateNode {
                    id: topic,
                    update: NodeUpdate::partitions(partitions),
                },
            ),
            ScenarioStep::at(0, Command::connect(producer, topic)),
        ];
        for consumer in (3..).map(NodeId).take(consumers as usize) {
            steps.push(ScenarioStep::at(0, Command::add(NodeKind::Consumer)));
            steps.push(ScenarioStep::at(
                0,
                Command::UpdateNode {
                    id: consumer,
                    update: NodeUpdate::rate(consumer_rate),
                },
            ));
            steps.push(ScenarioStep::at(0, Command::connect(topic, consumer)));
        }

        let settle = ClusterConfig::default().rebalance_settle.as_millis() as u64;
        steps.push(ScenarioStep::at(settle, Command::ToggleRunning));

        Self {
            duration_secs,
            config: ConfigOverrides::default(),
            steps,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// The cluster config this scenario runs with.
    pub fn cluster_config(&self) -> ClusterConfig {
        self.config.apply(ClusterConfig::default())
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.duration_secs == 0 {
            return Err(ScenarioError::Invalid("duration_secs must be positive".into()));
        }
        self.config.validate()?;
        if let Some(step) = self.steps.iter().find(|s| s.time() > self.duration()) {
            return Err(ScenarioError::Invalid(format!(
                "step at {}ms is past the end of the run",
                step.at_ms
            )));
        }
        Ok(())
    }
}
