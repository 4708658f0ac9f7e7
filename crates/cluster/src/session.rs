//! Session status transitions.

use brokersim_core::{Action, Command, CommandError};
use brokersim_types::SessionStatus;
use tracing::info;

/// A status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

impl StatusChange {
    /// The notification for this change, if anything changed.
    pub fn action(self) -> Option<Action> {
        (self.from != self.to).then_some(Action::EmitStatusChanged {
            from: self.from,
            to: self.to,
        })
    }
}

/// Tracks idle / running / terminated.
///
/// Start and pause toggle between idle and running. A lag ceiling breach
/// moves running to terminated, which absorbs everything except retry and
/// reset.
#[derive(Debug, Clone, Default)]
pub struct Session {
    status: SessionStatus,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Reject commands that are not legal in the current status.
    pub fn admit(&self, command: &Command) -> Result<(), CommandError> {
        if self.status.is_terminated() && !command.allowed_when_terminated() {
            return Err(CommandError::illegal(format!(
                "{} rejected: session terminated",
                command.type_name()
            )));
        }
        Ok(())
    }

    /// Start when idle, pause when running.
    pub fn toggle_running(&mut self) -> Result<StatusChange, CommandError> {
        let to = match self.status {
            SessionStatus::Idle => SessionStatus::Running,
            SessionStatus::Running => SessionStatus::Idle,
            SessionStatus::Terminated => {
                return Err(CommandError::illegal("cannot start a terminated session"))
            }
        };
        Ok(self.transition(to))
    }

    /// Ceiling breach.
    pub fn terminate(&mut self) -> StatusChange {
        self.transition(SessionStatus::Terminated)
    }

    /// Leave a terminated session, keeping topology.
    pub fn retry(&mut self) -> Result<StatusChange, CommandError> {
        if !self.status.is_terminated() {
            return Err(CommandError::illegal(format!(
                "retry requires a terminated session, status is {}",
                self.status
            )));
        }
        Ok(self.transition(SessionStatus::Idle))
    }

    /// Return to idle from any status.
    pub fn reset(&mut self) -> StatusChange {
        self.transition(SessionStatus::Idle)
    }

    fn transition(&mut self, to: SessionStatus) -> StatusChange {
        let from = self.status;
        self.status = to;
        if from != to {
            info!(%from, %to, "Session status changed");
        }
        StatusChange { from, to }
    }
}
