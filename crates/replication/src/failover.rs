//! Per-tick leader resolution for a topic.

use brokersim_types::{BrokerId, BrokerLiveness, Topic};
use std::fmt;
use tracing::{info, warn};

/// Why a topic could not be served this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    /// The leader is down and no controller can authorize a new one.
    NoController,
    /// Every replica is down.
    NoLiveReplica,
}

impl fmt::Display for OfflineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineReason::NoController => write!(f, "no controller"),
            OfflineReason::NoLiveReplica => write!(f, "no live replica"),
        }
    }
}

/// Result of resolving a topic's leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// The current leader is live.
    Online { leader: BrokerId },

    /// The leader was unreachable and a live replica took over.
    FailedOver {
        from: Option<BrokerId>,
        to: BrokerId,
    },

    /// No leader can serve the topic. The stale leader id is kept.
    Offline { reason: OfflineReason },
}

impl FailoverOutcome {
    pub fn is_online(&self) -> bool {
        !matches!(self, FailoverOutcome::Offline { .. })
    }
}

/// Determine the active leader of a topic for this tick.
///
/// A live leader keeps serving. Otherwise a controller must be present to
/// authorize a replacement, which is the first live broker in stored
/// replica order. Updates `active_leader` and `offline` in place; the
/// previous leader id is left untouched when the topic goes offline.
pub fn resolve_leader(
    topic: &mut Topic,
    brokers: &BrokerLiveness,
    controller: Option<BrokerId>,
) -> FailoverOutcome {
    if let Some(leader) = topic.active_leader {
        if brokers.is_live(leader) {
            topic.offline = false;
            return FailoverOutcome::Online { leader };
        }
    }

    if controller.is_none() {
        if !topic.offline {
            warn!(
                leader = ?topic.active_leader,
                "Leader unreachable and no controller to authorize failover"
            );
        }
        topic.offline = true;
        return FailoverOutcome::Offline {
            reason: OfflineReason::NoController,
        };
    }

    match topic.replicas.iter().copied().find(|b| brokers.is_live(*b)) {
        Some(next) => {
            let from = topic.active_leader;
            info!(from = ?from, to = %next, "Partition leader failed over");
            topic.active_leader = Some(next);
            topic.offline = false;
            FailoverOutcome::FailedOver { from, to: next }
        }
        None => {
            if !topic.offline {
                warn!(replicas = ?topic.replicas, "All replicas down");
            }
            topic.offline = true;
            FailoverOutcome::Offline {
                reason: OfflineReason::NoLiveReplica,
            }
        }
    }
}
