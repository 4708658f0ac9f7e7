//! Configuration for the cluster state machine.

use brokersim_controller::DEFAULT_LOG_CAPACITY;
use brokersim_rebalance::RebalanceScope;
use brokersim_types::{BrokerId, MetadataMode, DEFAULT_BROKERS};
use std::time::Duration;

/// Configuration for one simulation session.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Fixed broker pool.
    pub brokers: Vec<BrokerId>,

    /// Period of the flow tick.
    pub tick_interval: Duration,

    /// How long rebalanced consumers keep the cluster paused.
    pub rebalance_settle: Duration,

    /// Scaling constant `k` applied to inflow and capacity each tick.
    pub lag_scale: f64,

    /// Multiplier from drained backlog to reported processed messages.
    pub throughput_multiplier: f64,

    /// Global lag at which the session terminates.
    pub lag_ceiling: f64,

    /// Number of metadata operations kept in the log.
    pub metadata_log_capacity: usize,

    /// Which consumers a rebalance resets.
    pub rebalance_scope: RebalanceScope,

    /// Metadata mode at startup.
    pub initial_mode: MetadataMode,

    /// Seed for replica selection.
    pub seed: u64,
}

impl ClusterConfig {
    /// Create the reference configuration.
    pub fn new() -> Self {
        Self {
            brokers: DEFAULT_BROKERS.to_vec(),
            tick_interval: Duration::from_millis(500),
            rebalance_settle: Duration::from_millis(1500),
            lag_scale: 0.5,
            throughput_multiplier: 10.0,
            lag_ceiling: 100.0,
            metadata_log_capacity: DEFAULT_LOG_CAPACITY,
            rebalance_scope: RebalanceScope::Global,
            initial_mode: MetadataMode::Primary,
            seed: 12345,
        }
    }

    /// Set the broker pool.
    pub fn with_brokers(mut self, brokers: impl IntoIterator<Item = BrokerId>) -> Self {
        self.brokers = brokers.into_iter().collect();
        self
    }

    /// Set the tick period.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the rebalance settle duration.
    pub fn with_rebalance_settle(mut self, settle: Duration) -> Self {
        self.rebalance_settle = settle;
        self
    }

    /// Set the lag scaling constant.
    pub fn with_lag_scale(mut self, k: f64) -> Self {
        self.lag_scale = k;
        self
    }

    /// Set the throughput multiplier.
    pub fn with_throughput_multiplier(mut self, multiplier: f64) -> Self {
        self.throughput_multiplier = multiplier;
        self
    }

    /// Set the global lag ceiling.
    pub fn with_lag_ceiling(mut self, ceiling: f64) -> Self {
        self.lag_ceiling = ceiling;
        self
    }

    /// Set the metadata log capacity.
    pub fn with_metadata_log_capacity(mut self, capacity: usize) -> Self {
        self.metadata_log_capacity = capacity;
        self
    }

    /// Set the rebalance scope.
    pub fn with_rebalance_scope(mut self, scope: RebalanceScope) -> Self {
        self.rebalance_scope = scope;
        self
    }

    /// Set the initial metadata mode.
    pub fn with_mode(mut self, mode: MetadataMode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Largest replication factor this pool supports.
    pub fn max_replication_factor(&self) -> u8 {
        let pool = u8::try_from(self.brokers.len()).unwrap_or(u8::MAX);
        pool.min(brokersim_types::MAX_REPLICATION_FACTOR)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new()
    }
}
