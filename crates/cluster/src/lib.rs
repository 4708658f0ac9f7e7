//! Combined cluster state machine.
//!
//! This crate composes the entity store, partition rebalancer, failover
//! resolver and controller election into the simulation engine, and adds
//! the session status machine and the periodic flow tick.
//!
//! # Architecture
//!
//! ```text
//! Command ──► ClusterStateMachine::execute ──► EntityStore mutation
//!                                          ├─► PartitionRebalancer ─► SetTimer(RebalanceSettle)
//!                                          └─► ControllerState::elect
//!
//! Tick ─────► failover per topic ─► lag update ─► global lag ─► terminate?
//! RebalanceSettled ─► clear rebalancing flags
//! ```
//!
//! All I/O (timers, result delivery) is performed by the runner via
//! returned [`Action`](brokersim_core::Action)s.

mod advisor;
mod config;
mod flow;
mod session;
mod state;
mod tick;

pub use advisor::Advisor;
pub use brokersim_rebalance::RebalanceScope;
pub use config::ClusterConfig;
pub use flow::{FlowModel, FlowStep};
pub use session::{Session, StatusChange};
pub use state::{ClusterStateMachine, ClusterStats};
