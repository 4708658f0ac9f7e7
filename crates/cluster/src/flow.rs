//! Per-topic backlog model.

/// Result of advancing one topic by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowStep {
    /// Backlog after the tick. Never negative.
    pub lag: f64,
    /// Backlog drained this tick.
    pub drained: f64,
}

/// Lag/throughput model shared by every topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowModel {
    /// Scaling constant `k` applied to inflow and capacity.
    pub lag_scale: f64,
    /// Multiplier from drained backlog to processed messages.
    pub throughput_multiplier: f64,
}

impl FlowModel {
    pub fn new(lag_scale: f64, throughput_multiplier: f64) -> Self {
        Self {
            lag_scale,
            throughput_multiplier,
        }
    }

    /// Accrue `inflow * k`, then drain at most `capacity * k`.
    pub fn step(&self, lag: f64, inflow: f64, capacity: f64) -> FlowStep {
        let accrued = (lag + inflow * self.lag_scale).max(0.0);
        let drained = accrued.min((capacity * self.lag_scale).max(0.0));
        FlowStep {
            lag: (accrued - drained).max(0.0),
            drained,
        }
    }

    /// Messages reported as processed for a drained amount.
    pub fn processed(&self, drained: f64) -> f64 {
        drained * self.throughput_multiplier
    }
}
