//! The periodic flow tick.

use crate::ClusterStateMachine;
use brokersim_core::{Action, TimerId};
use brokersim_replication::{resolve_leader, FailoverOutcome};
use brokersim_types::NodeId;
use tracing::{trace, warn};

impl ClusterStateMachine {
    /// Advance every topic by one tick.
    ///
    /// Skipped entirely while any consumer is rebalancing. Otherwise each
    /// topic resolves its leader; online topics accrue producer inflow and
    /// drain at most the capacity of their non-idle consumers. Global lag
    /// is the mean over online topics, and reaching the ceiling terminates
    /// the session on the same tick.
    pub(crate) fn on_tick(&mut self) -> Vec<Action> {
        if !self.session.status().is_running() {
            trace!(status = %self.session.status(), "Tick ignored");
            return vec![];
        }
        self.stats.ticks += 1;

        let rearm = Action::SetTimer {
            id: TimerId::Tick,
            duration: self.config().tick_interval,
        };

        if self.store().any_rebalancing() {
            self.stats.paused_ticks += 1;
            trace!("Tick skipped, consumer group rebalancing");
            return vec![rearm];
        }

        let controller = self.controller();
        let mut online_lag = 0.0;
        let mut online_topics = 0usize;

        for topic_id in self.store().topic_ids() {
            let Some((topic, brokers)) = self.store_mut().topic_with_brokers(topic_id) else {
                continue;
            };
            let outcome = resolve_leader(topic, brokers, controller);
            let lag = topic.lag;

            match outcome {
                FailoverOutcome::Offline { .. } => {
                    self.stats.offline_topic_ticks += 1;
                    continue;
                }
                FailoverOutcome::FailedOver { .. } => self.stats.failovers += 1,
                FailoverOutcome::Online { .. } => {}
            }

            let inflow = self.inflow(topic_id);
            let capacity = self.capacity(topic_id);
            let step = self.flow.step(lag, inflow, capacity);

            if let Some(topic) = self.store_mut().topic_mut(topic_id) {
                topic.lag = step.lag;
            }
            self.messages_processed += self.flow.processed(step.drained);

            trace!(
                topic = %topic_id,
                inflow,
                capacity,
                lag = step.lag,
                drained = step.drained,
                "Topic advanced"
            );

            online_lag += step.lag;
            online_topics += 1;
        }

        self.global_lag = if online_topics == 0 {
            0.0
        } else {
            online_lag / online_topics as f64
        };

        let ceiling = self.config().lag_ceiling;
        if self.global_lag >= ceiling {
            warn!(
                global_lag = self.global_lag,
                ceiling, "Lag ceiling reached, terminating session"
            );
            let change = self.session.terminate();
            return change.action().into_iter().collect();
        }

        vec![rearm]
    }

    /// Sum of production rates feeding a topic.
    fn inflow(&self, topic: NodeId) -> f64 {
        let store = self.store();
        store
            .producers_of(topic)
            .into_iter()
            .filter_map(|id| store.producer(id))
            .map(|p| p.rate)
            .sum()
    }

    /// Sum of processing rates of subscribed consumers holding partitions.
    fn capacity(&self, topic: NodeId) -> f64 {
        let store = self.store();
        store
            .consumers_of(topic)
            .into_iter()
            .filter_map(|id| store.consumer(id))
            .filter(|c| !c.is_idle())
            .map(|c| c.rate)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ClusterConfig, ClusterStateMachine};
    use brokersim_core::{Action, Command, Event, NodeUpdate, StateMachine, TimerId};
    use brokersim_types::{BrokerId, NodeId, NodeKind, SessionStatus};
    use proptest::prelude::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    const REARM: Action = Action::SetTimer {
        id: TimerId::Tick,
        duration: Duration::from_millis(500),
    };

    fn add(cluster: &mut ClusterStateMachine, kind: NodeKind) -> NodeId {
        cluster.execute(Command::add(kind)).unwrap();
        cluster.store().nodes().last().unwrap().id
    }

    fn set_rate(cluster: &mut ClusterStateMachine, id: NodeId, rate: f64) {
        cluster
            .execute(Command::UpdateNode {
                id,
                update: NodeUpdate::rate(rate),
            })
            .unwrap();
    }

    /// Producer → topic → consumer, settled and running.
    fn pipeline(producer_rate: f64, consumer_rate: f64) -> (ClusterStateMachine, NodeId) {
        let mut cluster = ClusterStateMachine::new(ClusterConfig::default());
        let producer = add(&mut cluster, NodeKind::Producer);
        let topic = add(&mut cluster, NodeKind::Topic);
        let consumer = add(&mut cluster, NodeKind::Consumer);
        cluster.execute(Command::connect(producer, topic)).unwrap();
        cluster.execute(Command::connect(topic, consumer)).unwrap();
        set_rate(&mut cluster, producer, producer_rate);
        set_rate(&mut cluster, consumer, consumer_rate);
        cluster.handle(Event::RebalanceSettled);
        cluster.execute(Command::ToggleRunning).unwrap();
        (cluster, topic)
    }

    fn toggle(cluster: &mut ClusterStateMachine, broker: u32) {
        cluster
            .execute(Command::ToggleBroker {
                broker: BrokerId(broker),
            })
            .unwrap();
    }

    #[traced_test]
    #[test]
    fn test_single_pipeline_lag() {
        let (mut cluster, topic) = pipeline(8.0, 5.0);

        let actions = cluster.handle(Event::Tick);
        assert_eq!(actions, vec![REARM]);
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 1.5);
        assert_eq!(cluster.global_lag(), 1.5);
        assert_eq!(cluster.messages_processed(), 25.0);

        cluster.handle(Event::Tick);
        assert_eq!(cluster.global_lag(), 3.0);
        assert_eq!(cluster.stats().ticks, 2);
    }

    #[traced_test]
    #[test]
    fn test_drained_topic_stays_at_zero() {
        let (mut cluster, topic) = pipeline(2.0, 5.0);
        for _ in 0..5 {
            cluster.handle(Event::Tick);
        }
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 0.0);
        assert_eq!(cluster.messages_processed(), 50.0);
    }

    #[traced_test]
    #[test]
    fn test_empty_board() {
        let mut cluster = ClusterStateMachine::new(ClusterConfig::default());
        cluster.execute(Command::ToggleRunning).unwrap();

        assert_eq!(cluster.handle(Event::Tick), vec![REARM]);
        assert_eq!(cluster.global_lag(), 0.0);
        assert_eq!(cluster.status(), SessionStatus::Running);
    }

    #[traced_test]
    #[test]
    fn test_tick_ignored_unless_running() {
        let (mut cluster, topic) = pipeline(8.0, 5.0);
        cluster.execute(Command::ToggleRunning).unwrap();

        assert!(cluster.handle(Event::Tick).is_empty());
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 0.0);
        assert_eq!(cluster.stats().ticks, 0);
    }

    #[traced_test]
    #[test]
    fn test_rebalance_pauses_ticks() {
        let (mut cluster, topic) = pipeline(8.0, 5.0);
        let late = add(&mut cluster, NodeKind::Consumer);
        cluster.execute(Command::connect(topic, late)).unwrap();

        assert_eq!(cluster.handle(Event::Tick), vec![REARM]);
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 0.0);
        assert_eq!(cluster.stats().paused_ticks, 1);

        cluster.handle(Event::RebalanceSettled);
        cluster.handle(Event::Tick);
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 1.5);
    }

    #[traced_test]
    #[test]
    fn test_idle_consumers_add_no_capacity() {
        let (mut cluster, topic) = pipeline(8.0, 5.0);
        let idle = add(&mut cluster, NodeKind::Consumer);
        cluster.execute(Command::connect(topic, idle)).unwrap();
        set_rate(&mut cluster, idle, 50.0);
        cluster.handle(Event::RebalanceSettled);

        assert!(cluster.store().consumer(idle).unwrap().is_idle());
        cluster.handle(Event::Tick);
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 1.5);
    }

    #[traced_test]
    #[test]
    fn test_ceiling_terminates_on_same_tick() {
        let mut cluster = ClusterStateMachine::new(ClusterConfig::default());
        let producer = add(&mut cluster, NodeKind::Producer);
        let topic = add(&mut cluster, NodeKind::Topic);
        cluster.execute(Command::connect(producer, topic)).unwrap();
        set_rate(&mut cluster, producer, 200.0);
        cluster.execute(Command::ToggleRunning).unwrap();

        let actions = cluster.handle(Event::Tick);
        assert_eq!(
            actions,
            vec![Action::EmitStatusChanged {
                from: SessionStatus::Running,
                to: SessionStatus::Terminated,
            }]
        );
        assert_eq!(cluster.global_lag(), 100.0);
        assert_eq!(cluster.status(), SessionStatus::Terminated);

        // Terminated sessions ignore further ticks and most commands.
        assert!(cluster.handle(Event::Tick).is_empty());
        assert!(cluster.execute(Command::add(NodeKind::Producer)).is_err());

        cluster.execute(Command::Retry).unwrap();
        assert_eq!(cluster.status(), SessionStatus::Idle);
        assert_eq!(cluster.global_lag(), 0.0);
        assert_eq!(cluster.store().topic(topic).unwrap().lag, 0.0);
        assert_eq!(cluster.store().node_count(), 2);
    }

    #[traced_test]
    #[test]
    fn test_leader_failover_follows_replica_order() {
        let (mut cluster, topic) = pipeline(8.0, 5.0);
        {
            let t = cluster.store_mut().topic_mut(topic).unwrap();
            t.replication_factor = 3;
            t.replicas = vec![BrokerId(101), BrokerId(102), BrokerId(103)];
        }

        toggle(&mut cluster, 101);
        assert_eq!(cluster.controller(), Some(BrokerId(102)));
        cluster.handle(Event::Tick);
        let t = cluster.store().topic(topic).unwrap();
        assert_eq!(t.active_leader, Some(BrokerId(102)));
        assert_eq!(t.lag, 1.5);

        toggle(&mut cluster, 102);
        cluster.handle(Event::Tick);
        assert_eq!(
            cluster.store().topic(topic).unwrap().active_leader,
            Some(BrokerId(103))
        );
        assert_eq!(cluster.stats().failovers, 2);

        toggle(&mut cluster, 103);
        cluster.handle(Event::Tick);
        let t = cluster.store().topic(topic).unwrap();
        assert!(t.offline);
        assert_eq!(t.active_leader, Some(BrokerId(103)));
        assert_eq!(t.lag, 3.0);
        assert_eq!(cluster.global_lag(), 0.0);
    }

    #[traced_test]
    #[test]
    fn test_no_controller_freezes_topic() {
        let (mut cluster, topic) = pipeline(8.0, 5.0);
        cluster.handle(Event::Tick);

        cluster.execute(Command::TogglePrimaryService).unwrap();
        toggle(&mut cluster, 101);
        assert_eq!(cluster.controller(), None);

        cluster.handle(Event::Tick);
        let t = cluster.store().topic(topic).unwrap();
        assert!(t.offline);
        assert_eq!(t.active_leader, Some(BrokerId(101)));
        assert_eq!(t.lag, 1.5);
        assert_eq!(cluster.stats().offline_topic_ticks, 1);

        // Restoring the service lets the controller authorize a new leader,
        // but a single-replica topic has nowhere to go.
        cluster.execute(Command::TogglePrimaryService).unwrap();
        cluster.handle(Event::Tick);
        assert!(cluster.store().topic(topic).unwrap().offline);

        toggle(&mut cluster, 101);
        cluster.handle(Event::Tick);
        let t = cluster.store().topic(topic).unwrap();
        assert!(!t.offline);
        assert_eq!(t.lag, 3.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_lag_never_negative(
            producer_rate in 0.0f64..60.0,
            consumer_rate in 0.0f64..60.0,
            ticks in 1usize..20,
        ) {
            let (mut cluster, topic) = pipeline(producer_rate, consumer_rate);
            for _ in 0..ticks {
                cluster.handle(Event::Tick);
                let lag = cluster.store().topic(topic).unwrap().lag;
                prop_assert!(lag >= 0.0);
                prop_assert!(cluster.global_lag() <= cluster.config().lag_ceiling
                    || cluster.status() == SessionStatus::Terminated);
            }
        }
    }
}
