//! Core types for the cluster simulation engine.
//!
//! Defines the vocabulary shared by the engine and its runners:
//!
//! - [`Command`]: user actions against the cluster
//! - [`Event`]: what the state machine reacts to (commands and timers)
//! - [`Action`]: side effects the runner performs on the state machine's behalf
//! - [`StateMachine`]: the synchronous, deterministic engine contract
//! - [`CommandError`]: why a command was rejected

mod command;
mod error;
mod event;
mod request;
mod traits;

pub use command::{Command, NodeUpdate};
pub use error::CommandError;
pub use event::{Action, Event, EventPriority, TimerId};
pub use request::RequestId;
pub use traits::{StateMachine, TimerScheduler};
