//! External commands accepted by the engine.

use brokersim_types::{BrokerId, MetadataMode, NodeId, NodeKind, Position};
use serde::{Deserialize, Serialize};

/// Partial update of a node's configurable fields.
///
/// Fields left as `None` are untouched. A field that does not apply to the
/// node's variant is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeUpdate {
    /// Producer or consumer rate.
    pub rate: Option<f64>,
    /// Topic partition count.
    pub partitions: Option<u32>,
    /// Topic replication factor.
    pub replication_factor: Option<u8>,
    /// Consumer group name.
    pub group: Option<String>,
}

impl NodeUpdate {
    pub fn rate(rate: f64) -> Self {
        Self {
            rate: Some(rate),
            ..Default::default()
        }
    }

    pub fn partitions(partitions: u32) -> Self {
        Self {
            partitions: Some(partitions),
            ..Default::default()
        }
    }

    pub fn replication_factor(factor: u8) -> Self {
        Self {
            replication_factor: Some(factor),
            ..Default::default()
        }
    }

    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rate.is_none()
            && self.partitions.is_none()
            && self.replication_factor.is_none()
            && self.group.is_none()
    }
}

/// A user-initiated action against the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    AddNode {
        kind: NodeKind,
        #[serde(default)]
        position: Position,
    },
    DeleteNode {
        id: NodeId,
    },
    AddConnection {
        source: NodeId,
        target: NodeId,
    },
    RemoveConnection {
        source: NodeId,
        target: NodeId,
    },
    UpdateNode {
        id: NodeId,
        update: NodeUpdate,
    },
    ToggleBroker {
        broker: BrokerId,
    },
    TogglePrimaryService,
    SetMode {
        mode: MetadataMode,
    },
    /// Start when idle, pause when running.
    ToggleRunning,
    /// Clear topology and return to idle.
    Reset,
    /// Keep topology, zero lag and counters, and return to idle.
    Retry,
}

impl Command {
    /// Shorthand for adding a node at the origin.
    pub fn add(kind: NodeKind) -> Self {
        Command::AddNode {
            kind,
            position: Position::default(),
        }
    }

    /// Shorthand for linking two nodes.
    pub fn connect(source: NodeId, target: NodeId) -> Self {
        Command::AddConnection { source, target }
    }

    /// Get a human-readable name for this command type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::AddNode { .. } => "AddNode",
            Command::DeleteNode { .. } => "DeleteNode",
            Command::AddConnection { .. } => "AddConnection",
            Command::RemoveConnection { .. } => "RemoveConnection",
            Command::UpdateNode { .. } => "UpdateNode",
            Command::ToggleBroker { .. } => "ToggleBroker",
            Command::TogglePrimaryService => "TogglePrimaryService",
            Command::SetMode { .. } => "SetMode",
            Command::ToggleRunning => "ToggleRunning",
            Command::Reset => "Reset",
            Command::Retry => "Retry",
        }
    }

    /// Check if this command is allowed while the session is terminated.
    pub fn allowed_when_terminated(&self) -> bool {
        matches!(self, Command::Reset | Command::Retry)
    }
}
