//! Cluster-level state shared by the election, failover and tick components.

use crate::{BrokerId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// How cluster metadata is managed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataMode {
    /// An external metadata service is consulted for every change.
    #[default]
    Primary,
    /// Brokers manage metadata among themselves through the controller.
    SelfManaged,
}

impl fmt::Display for MetadataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataMode::Primary => write!(f, "PRIMARY"),
            MetadataMode::SelfManaged => write!(f, "SELF_MANAGED"),
        }
    }
}

/// Coarse session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    /// Absorbing until an explicit retry or reset.
    Terminated,
}

impl SessionStatus {
    pub fn is_running(self) -> bool {
        self == SessionStatus::Running
    }

    pub fn is_terminated(self) -> bool {
        self == SessionStatus::Terminated
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Online/offline flag for each broker in the fixed pool.
///
/// Iteration is always in ascending broker id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrokerLiveness(BTreeMap<BrokerId, bool>);

impl BrokerLiveness {
    /// Create a liveness map with every broker online.
    pub fn all_live(brokers: impl IntoIterator<Item = BrokerId>) -> Self {
        Self(brokers.into_iter().map(|id| (id, true)).collect())
    }

    /// Check if a broker is in the pool.
    pub fn contains(&self, id: BrokerId) -> bool {
        self.0.contains_key(&id)
    }

    /// Check if a broker is online. Unknown brokers are never live.
    pub fn is_live(&self, id: BrokerId) -> bool {
        self.0.get(&id).copied().unwrap_or(false)
    }

    /// Flip a broker's flag, returning the new value.
    ///
    /// Returns `None` if the broker is not in the pool.
    pub fn toggle(&mut self, id: BrokerId) -> Option<bool> {
        let live = self.0.get_mut(&id)?;
        *live = !*live;
        Some(*live)
    }

    /// Bring every broker back online.
    pub fn restore_all(&mut self) {
        self.0.values_mut().for_each(|live| *live = true);
    }

    /// All broker ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = BrokerId> + '_ {
        self.0.keys().copied()
    }

    /// Online broker ids in ascending order.
    pub fn live(&self) -> impl Iterator<Item = BrokerId> + '_ {
        self.0
            .iter()
            .filter(|(_, live)| **live)
            .map(|(id, _)| *id)
    }

    /// Number of brokers in the pool.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a metadata log entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataOpKind {
    /// Controller changed while the primary metadata service was in charge.
    Elect,
    /// Controller changed through broker self-management.
    BrokerChange,
    /// A topic was registered.
    CreateTopic { topic: NodeId },
    /// A topic's replica set was reselected.
    ReassignReplicas {
        topic: NodeId,
        replicas: Vec<BrokerId>,
    },
}

/// One entry in the bounded metadata operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataOp {
    /// Simulation time when the operation was recorded.
    pub at: Duration,
    /// Mode in effect at the time.
    pub mode: MetadataMode,
    pub kind: MetadataOpKind,
    /// Controller after the operation.
    pub controller: Option<BrokerId>,
}

impl MetadataOp {
    /// Whether this entry records a controller change.
    pub fn is_controller_change(&self) -> bool {
        matches!(
            self.kind,
            MetadataOpKind::Elect | MetadataOpKind::BrokerChange
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_iterates_in_id_order() {
        let mut liveness = BrokerLiveness::all_live([BrokerId(103), BrokerId(101), BrokerId(102)]);
        assert_eq!(
            liveness.ids().collect::<Vec<_>>(),
            vec![BrokerId(101), BrokerId(102), BrokerId(103)]
        );

        assert_eq!(liveness.toggle(BrokerId(101)), Some(false));
        assert_eq!(
            liveness.live().collect::<Vec<_>>(),
            vec![BrokerId(102), BrokerId(103)]
        );
        assert!(!liveness.is_live(BrokerId(101)));
        assert!(!liveness.is_live(BrokerId(999)));
        assert_eq!(liveness.toggle(BrokerId(999)), None);

        liveness.restore_all();
        assert_eq!(liveness.live().count(), 3);
    }
}
