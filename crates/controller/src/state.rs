//! Controller election state.

use crate::MetadataLog;
use brokersim_types::{BrokerId, BrokerLiveness, MetadataMode, MetadataOp, MetadataOpKind};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A change of controller produced by an election pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerChange {
    pub from: Option<BrokerId>,
    pub to: Option<BrokerId>,
}

/// The cluster's metadata layer: mode, primary service, controller and log.
///
/// The election rule is shared by both modes. In PRIMARY mode with the
/// metadata service down the controller is forced to `None`; otherwise a
/// missing or dead controller is replaced by the lowest-id live broker. A
/// live controller is never displaced, so the pass reaches its fixed point
/// immediately.
#[derive(Debug, Clone)]
pub struct ControllerState {
    mode: MetadataMode,
    primary_service_online: bool,
    controller: Option<BrokerId>,
    log: MetadataLog,
}

impl ControllerState {
    /// Create a metadata layer with no controller yet.
    ///
    /// Call [`ControllerState::elect`] once brokers are known.
    pub fn new(mode: MetadataMode, log_capacity: usize) -> Self {
        Self {
            mode,
            primary_service_online: true,
            controller: None,
            log: MetadataLog::new(log_capacity),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn mode(&self) -> MetadataMode {
        self.mode
    }

    pub fn controller(&self) -> Option<BrokerId> {
        self.controller
    }

    pub fn primary_service_online(&self) -> bool {
        self.primary_service_online
    }

    pub fn log(&self) -> &MetadataLog {
        &self.log
    }

    /// Whether the active metadata layer can authorize changes.
    ///
    /// PRIMARY needs the metadata service; SELF-MANAGED needs a controller.
    pub fn is_available(&self) -> bool {
        match self.mode {
            MetadataMode::Primary => self.primary_service_online,
            MetadataMode::SelfManaged => self.controller.is_some(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transitions
    // ═══════════════════════════════════════════════════════════════════════

    /// Run an election pass against current broker liveness.
    ///
    /// Appends one log entry if the controller changed.
    pub fn elect(&mut self, brokers: &BrokerLiveness, now: Duration) -> Option<ControllerChange> {
        let next = self.elected(brokers);
        if next == self.controller {
            return None;
        }

        let change = ControllerChange {
            from: self.controller,
            to: next,
        };
        self.controller = next;

        match next {
            Some(id) => info!(
                mode = %self.mode,
                from = ?change.from,
                controller = %id,
                "Controller elected"
            ),
            None => warn!(mode = %self.mode, from = ?change.from, "No controller"),
        }

        let kind = match self.mode {
            MetadataMode::Primary => MetadataOpKind::Elect,
            MetadataMode::SelfManaged => MetadataOpKind::BrokerChange,
        };
        self.record(now, kind);
        Some(change)
    }

    fn elected(&self, brokers: &BrokerLiveness) -> Option<BrokerId> {
        if self.mode == MetadataMode::Primary && !self.primary_service_online {
            return None;
        }
        match self.controller {
            Some(current) if brokers.is_live(current) => Some(current),
            _ => brokers.live().next(),
        }
    }

    /// Switch metadata mode and re-run the election.
    pub fn set_mode(
        &mut self,
        mode: MetadataMode,
        brokers: &BrokerLiveness,
        now: Duration,
    ) -> Option<ControllerChange> {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "Metadata mode changed");
            self.mode = mode;
        }
        self.elect(brokers, now)
    }

    /// Flip the primary metadata service and re-run the election.
    ///
    /// Returns the new service liveness.
    pub fn toggle_primary_service(
        &mut self,
        brokers: &BrokerLiveness,
        now: Duration,
    ) -> (bool, Option<ControllerChange>) {
        self.primary_service_online = !self.primary_service_online;
        debug!(
            online = self.primary_service_online,
            mode = %self.mode,
            "Primary metadata service toggled"
        );
        let change = self.elect(brokers, now);
        (self.primary_service_online, change)
    }

    /// Append a non-election entry to the log.
    pub fn record(&mut self, now: Duration, kind: MetadataOpKind) {
        self.log.push(MetadataOp {
            at: now,
            mode: self.mode,
            kind,
            controller: self.controller,
        });
    }

    /// Restore the service, forget the controller and log, then re-elect.
    pub fn reset(&mut self, brokers: &BrokerLiveness, now: Duration) {
        self.primary_service_online = true;
        self.controller = None;
        self.log.clear();
        self.elect(brokers, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokersim_types::DEFAULT_BROKERS;
    use tracing_test::traced_test;

    fn brokers() -> BrokerLiveness {
        BrokerLiveness::all_live(DEFAULT_BROKERS)
    }

    fn elected(mode: MetadataMode) -> (ControllerState, BrokerLiveness) {
        let brokers = brokers();
        let mut state = ControllerState::new(mode, 10);
        state.elect(&brokers, Duration::ZERO);
        (state, brokers)
    }

    #[traced_test]
    #[test]
    fn test_lowest_live_broker_wins() {
        let (state, _) = elected(MetadataMode::Primary);
        assert_eq!(state.controller(), Some(BrokerId(101)));
        assert_eq!(state.log().len(), 1);
        assert_eq!(state.log().last().unwrap().kind, MetadataOpKind::Elect);
    }

    #[traced_test]
    #[test]
    fn test_dead_controller_is_replaced() {
        let (mut state, mut brokers) = elected(MetadataMode::SelfManaged);
        brokers.toggle(BrokerId(101));

        let change = state.elect(&brokers, Duration::from_secs(1));
        assert_eq!(
            change,
            Some(ControllerChange {
                from: Some(BrokerId(101)),
                to: Some(BrokerId(102))
            })
        );
        assert_eq!(
            state.log().last().unwrap().kind,
            MetadataOpKind::BrokerChange
        );

        // A recovered lower broker does not displace a live controller.
        brokers.toggle(BrokerId(101));
        assert_eq!(state.elect(&brokers, Duration::from_secs(2)), None);
        assert_eq!(state.controller(), Some(BrokerId(102)));
    }

    #[traced_test]
    #[test]
    fn test_no_live_broker_means_no_controller() {
        let (mut state, mut brokers) = elected(MetadataMode::SelfManaged);
        for id in DEFAULT_BROKERS {
            brokers.toggle(id);
        }
        state.elect(&brokers, Duration::from_secs(1));
        assert_eq!(state.controller(), None);
        assert!(!state.is_available());
    }

    #[traced_test]
    #[test]
    fn test_primary_service_outage_forces_no_controller() {
        let (mut state, brokers) = elected(MetadataMode::Primary);

        let (online, change) = state.toggle_primary_service(&brokers, Duration::from_secs(1));
        assert!(!online);
        assert_eq!(change.map(|c| c.to), Some(None));
        assert!(!state.is_available());

        // Switching to self-managed brings a controller back.
        state.set_mode(MetadataMode::SelfManaged, &brokers, Duration::from_secs(2));
        assert_eq!(state.controller(), Some(BrokerId(101)));
        assert!(state.is_available());
        assert_eq!(
            state.log().last().unwrap().kind,
            MetadataOpKind::BrokerChange
        );
    }

    #[traced_test]
    #[test]
    fn test_service_outage_ignored_in_self_managed_mode() {
        let (mut state, brokers) = elected(MetadataMode::SelfManaged);
        let (online, change) = state.toggle_primary_service(&brokers, Duration::from_secs(1));
        assert!(!online);
        assert_eq!(change, None);
        assert_eq!(state.controller(), Some(BrokerId(101)));
    }

    #[traced_test]
    #[test]
    fn test_reset_restores_service_and_log() {
        let (mut state, brokers) = elected(MetadataMode::Primary);
        state.toggle_primary_service(&brokers, Duration::from_secs(1));

        state.reset(&brokers, Duration::from_secs(2));
        assert!(state.primary_service_online());
        assert_eq!(state.controller(), Some(BrokerId(101)));
        assert_eq!(state.log().len(), 1);
    }
}
