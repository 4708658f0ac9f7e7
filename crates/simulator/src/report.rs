//! Run metrics and the end-of-run report.

use brokersim_types::SessionStatus;
use hdrhistogram::{CreationError, Histogram};
use serde::Serialize;
use std::fmt;

/// Global lag is recorded in hundredths to keep two decimals.
const LAG_SCALE: f64 = 100.0;

/// Distribution of per-tick global lag.
pub struct LagRecorder {
    histogram: Histogram<u64>,
}

impl LagRecorder {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            histogram: Histogram::new(3)?,
        })
    }

    pub fn record(&mut self, global_lag: f64) {
        let scaled = (global_lag.max(0.0) * LAG_SCALE).round() as u64;
        self.histogram.saturating_record(scaled);
    }

    pub fn samples(&self) -> u64 {
        self.histogram.len()
    }

    /// Lag at a percentile in `0.0..=100.0`.
    pub fn percentile(&self, percentile: f64) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        self.histogram.value_at_percentile(percentile) as f64 / LAG_SCALE
    }

    pub fn max(&self) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        self.histogram.max() as f64 / LAG_SCALE
    }
}

/// Summary of one simulated run.
///
/// Engine counters (`failovers` and the rest) cover the period since the
/// last reset or retry; `ticks` and the lag percentiles cover the whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub duration_secs: f64,
    pub ticks: u64,
    pub final_status: SessionStatus,
    pub terminated_at_secs: Option<f64>,
    pub messages_processed: f64,
    pub final_global_lag: f64,
    pub lag_p50: f64,
    pub lag_p99: f64,
    pub lag_max: f64,
    pub offline_topic_ticks: u64,
    pub paused_ticks: u64,
    pub failovers: u64,
    pub controller_changes: u64,
    pub rebalances: u64,
    pub commands_rejected: u64,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Report ===")?;
        writeln!(f, "Duration:            {:.1}s", self.duration_secs)?;
        writeln!(f, "Ticks:               {}", self.ticks)?;
        match self.terminated_at_secs {
            Some(at) => writeln!(f, "Final status:        {} (at {at:.1}s)", self.final_status)?,
            None => writeln!(f, "Final status:        {}", self.final_status)?,
        }
        writeln!(f, "Messages processed:  {:.0}", self.messages_processed)?;
        writeln!(f)?;
        writeln!(f, "Global lag:")?;
        writeln!(f, "  Final:  {:.2}", self.final_global_lag)?;
        writeln!(f, "  P50:    {:.2}", self.lag_p50)?;
        writeln!(f, "  P99:    {:.2}", self.lag_p99)?;
        writeln!(f, "  Max:    {:.2}", self.lag_max)?;
        writeln!(f)?;
        writeln!(f, "Offline topic-ticks: {}", self.offline_topic_ticks)?;
        writeln!(f, "Paused ticks:        {}", self.paused_ticks)?;
        writeln!(f, "Failovers:           {}", self.failovers)?;
        writeln!(f, "Controller changes:  {}", self.controller_changes)?;
        writeln!(f, "Rebalances:          {}", self.rebalances)?;
        write!(f, "Rejected commands:   {}", self.commands_rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_percentiles() {
        let mut recorder = LagRecorder::new().unwrap();
        assert_eq!(recorder.percentile(50.0), 0.0);

        for tick in 1..=100 {
            recorder.record(tick as f64 * 1.5);
        }
        assert_eq!(recorder.samples(), 100);
        let max = recorder.max();
        assert!((149.9..=150.1).contains(&max), "max was {max}");
        let p50 = recorder.percentile(50.0);
        assert!((74.9..=75.1).contains(&p50), "p50 was {p50}");
    }

    #[test]
    fn test_negative_lag_clamps() {
        let mut recorder = LagRecorder::new().unwrap();
        recorder.record(-3.0);
        assert_eq!(recorder.max(), 0.0);
    }
}
