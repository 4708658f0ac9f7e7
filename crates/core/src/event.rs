//! Inbound events and outbound actions of the cluster state machine.

use crate::{Command, CommandError, RequestId};
use brokersim_types::SessionStatus;
use std::time::Duration;

/// Timer identification for scheduled events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    /// Periodic flow tick, armed while the session is running.
    Tick,
    /// One-shot timer that clears every rebalancing flag.
    RebalanceSettle,
}

impl TimerId {
    /// The event delivered when this timer fires.
    pub fn event(self) -> Event {
        match self {
            TimerId::Tick => Event::Tick,
            TimerId::RebalanceSettle => Event::RebalanceSettled,
        }
    }
}

/// Ordering class for events scheduled at the same instant.
///
/// User commands take effect before timers so that ticks always observe
/// the latest committed topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPriority {
    Command = 0,
    Timer = 1,
}

/// Everything the cluster state machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The flow tick timer fired.
    Tick,

    /// The rebalance settle timer fired.
    RebalanceSettled,

    /// A user command.
    Command {
        request_id: RequestId,
        command: Command,
    },
}

impl Event {
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::Command { .. } => EventPriority::Command,
            Event::Tick | Event::RebalanceSettled => EventPriority::Timer,
        }
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Tick => "Tick",
            Event::RebalanceSettled => "RebalanceSettled",
            Event::Command { command, .. } => command.type_name(),
        }
    }
}

/// Side effects requested by the state machine, performed by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Arm a timer, replacing any pending one with the same id.
    SetTimer { id: TimerId, duration: Duration },

    /// Disarm a timer.
    CancelTimer { id: TimerId },

    /// Deliver the outcome of a command to whoever submitted it.
    EmitCommandResult {
        request_id: RequestId,
        result: Result<(), CommandError>,
    },

    /// The session moved between idle, running and terminated.
    EmitStatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::EmitCommandResult { .. } => "EmitCommandResult",
            Action::EmitStatusChanged { .. } => "EmitStatusChanged",
        }
    }
}
