//! Client side of the realtime runner.

use crate::RuntimeError;
use brokersim_core::Command;
use brokersim_types::ClusterSnapshot;
use tokio::sync::{mpsc, oneshot, watch};

/// A command awaiting application, with the channel for its reply.
pub(crate) struct CommandRequest {
    pub(crate) command: Command,
    pub(crate) reply: oneshot::Sender<Result<ClusterSnapshot, RuntimeError>>,
}

/// Cloneable handle to a running [`RealtimeRunner`](crate::RealtimeRunner).
#[derive(Clone)]
pub struct RealtimeHandle {
    commands: mpsc::Sender<CommandRequest>,
    snapshots: watch::Receiver<ClusterSnapshot>,
}

impl RealtimeHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<CommandRequest>,
        snapshots: watch::Receiver<ClusterSnapshot>,
    ) -> Self {
        Self {
            commands,
            snapshots,
        }
    }

    /// Apply a command and wait for the resulting snapshot.
    pub async fn submit(&self, command: Command) -> Result<ClusterSnapshot, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(CommandRequest { command, reply })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        response.await.map_err(|_| RuntimeError::Stopped)?
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> ClusterSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified after every command and timer event.
    pub fn subscribe(&self) -> watch::Receiver<ClusterSnapshot> {
        self.snapshots.clone()
    }
}
