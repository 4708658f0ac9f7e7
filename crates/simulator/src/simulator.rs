//! Drives a scenario through the simulation runner.

use crate::report::{LagRecorder, SimulationReport};
use crate::scenario::Scenario;
use brokersim_simulation::SimulationRunner;
use brokersim_types::ClusterSnapshot;
use hdrhistogram::CreationError;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("failed to create lag histogram: {0}")]
    Histogram(#[from] CreationError),
}

/// Runs a [`Scenario`] and collects per-tick metrics.
pub struct Simulator {
    runner: SimulationRunner,
    duration: Duration,
    lag: LagRecorder,
    ticks: u64,
    terminated_at: Option<Duration>,
}

impl Simulator {
    /// Build the cluster and queue every scenario step.
    pub fn new(scenario: &Scenario) -> Result<Self, SimulatorError> {
        let mut runner = SimulationRunner::new(scenario.cluster_config());
        for step in &scenario.steps {
            runner.schedule(step.time(), step.command.clone());
        }
        info!(
            steps = scenario.steps.len(),
            duration_secs = scenario.duration_secs,
            "Scenario loaded"
        );

        Ok(Self {
            runner,
            duration: scenario.duration(),
            lag: LagRecorder::new()?,
            ticks: 0,
            terminated_at: None,
        })
    }

    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.runner.snapshot()
    }

    /// Run to the end of the scenario.
    pub fn run(&mut self) -> SimulationReport {
        while let Some(next) = self.runner.next_event_time() {
            if next > self.duration {
                break;
            }
            let ticks_before = self.runner.stats().ticks;
            self.runner.step();
            if self.runner.stats().ticks > ticks_before {
                self.on_tick();
            }
        }
        self.runner.run_until(self.duration);

        let report = self.report();
        info!(
            ticks = report.ticks,
            status = %report.final_status,
            lag_p99 = report.lag_p99,
            "Simulation complete"
        );
        report
    }

    fn on_tick(&mut self) {
        let cluster = self.runner.cluster();
        self.ticks += 1;
        self.lag.record(cluster.global_lag());

        if cluster.status().is_terminated() && self.terminated_at.is_none() {
            let at = self.runner.now();
            warn!(
                at_secs = at.as_secs_f64(),
                global_lag = cluster.global_lag(),
                "Session terminated"
            );
            self.terminated_at = Some(at);
        }
    }

    /// Summarize the run so far.
    pub fn report(&self) -> SimulationReport {
        let cluster = self.runner.cluster();
        let stats = cluster.stats();
        SimulationReport {
            duration_secs: self.runner.now().as_secs_f64(),
            ticks: self.ticks,
            final_status: cluster.status(),
            terminated_at_secs: self.terminated_at.map(|at| at.as_secs_f64()),
            messages_processed: cluster.messages_processed(),
            final_global_lag: cluster.global_lag(),
            lag_p50: self.lag.percentile(50.0),
            lag_p99: self.lag.percentile(99.0),
            lag_max: self.lag.max(),
            offline_topic_ticks: stats.offline_topic_ticks,
            paused_ticks: stats.paused_ticks,
            failovers: stats.failovers,
            controller_changes: stats.controller_changes,
            rebalances: stats.rebalances,
            commands_rejected: self.runner.stats().commands_rejected,
        }
    }
}
