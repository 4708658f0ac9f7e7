//! Brokersim Simulator
//!
//! Runs cluster scenarios on the deterministic simulation runner and
//! reports how the cluster held up.
//!
//! - **Scenarios**: TOML files with config overrides and timed commands,
//!   or a generated producer → topic → consumers pipeline
//! - **Metrics**: per-tick global lag in an HDR histogram, plus the
//!   engine's failover, election and rebalance counters
//! - **Advice**: a rule-based [`Advisor`](brokersim_cluster::Advisor)
//!   explaining concepts against the final state
//!
//! # Example
//!
//! ```ignore
//! use brokersim_simulator::{Scenario, Simulator};
//!
//! let scenario = Scenario::pipeline(60, 8.0, 5.0, 1, 1);
//! let mut simulator = Simulator::new(&scenario)?;
//! let report = simulator.run();
//! println!("{report}");
//! ```

pub mod advisor;
pub mod report;
pub mod scenario;
pub mod simulator;

pub use advisor::GlossaryAdvisor;
pub use report::{LagRecorder, SimulationReport};
pub use scenario::{ConfigOverrides, Scenario, ScenarioError, ScenarioStep};
pub use simulator::{Simulator, SimulatorError};
