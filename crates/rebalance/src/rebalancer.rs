//! Partition rebalancer over the entity store.

use crate::assign_round_robin;
use brokersim_store::EntityStore;
use brokersim_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which consumers a rebalance pass resets before reassigning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceScope {
    /// Reset every consumer and reassign every topic.
    #[default]
    Global,

    /// Reset only consumers sharing a topic (transitively) with the change.
    ///
    /// A consumer's assignment spans every topic it reads, so the pass
    /// follows topic ↔ consumer links until closed; consumers of unrelated
    /// topics keep their partitions and are not paused.
    AffectedTopics,
}

/// Nodes touched by a topology change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Touched {
    pub topics: Vec<NodeId>,
    pub consumers: Vec<NodeId>,
}

impl Touched {
    pub fn topic(id: NodeId) -> Self {
        Self {
            topics: vec![id],
            consumers: Vec::new(),
        }
    }

    pub fn consumer(id: NodeId) -> Self {
        Self {
            topics: Vec::new(),
            consumers: vec![id],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.consumers.is_empty()
    }
}

/// What a rebalance pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceOutcome {
    /// Topics whose partitions were reassigned, in store order.
    pub topics: Vec<NodeId>,

    /// Consumers flagged as rebalancing, in first-assignment order.
    pub flagged: Vec<NodeId>,
}

impl RebalanceOutcome {
    /// Whether the settle timer needs arming.
    pub fn needs_settle(&self) -> bool {
        !self.flagged.is_empty()
    }
}

/// Computes deterministic partition → consumer assignments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionRebalancer {
    scope: RebalanceScope,
}

impl PartitionRebalancer {
    pub fn new(scope: RebalanceScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> RebalanceScope {
        self.scope
    }

    /// Reassign partitions after a topology change.
    ///
    /// Every consumer that ends up subscribed to a reassigned topic is
    /// flagged as rebalancing. Re-running with unchanged topology yields
    /// identical assignments.
    pub fn rebalance(&self, store: &mut EntityStore, touched: &Touched) -> RebalanceOutcome {
        let (topics, reset) = match self.scope {
            RebalanceScope::Global => (store.topic_ids(), store.consumer_ids()),
            RebalanceScope::AffectedTopics => Self::closure(store, touched),
        };

        for id in &reset {
            if let Some(consumer) = store.consumer_mut(*id) {
                consumer.assigned.clear();
            }
        }

        let mut flagged = Vec::new();
        let mut seen = BTreeSet::new();

        for topic_id in &topics {
            let Some(partitions) = store.topic(*topic_id).map(|t| t.partitions) else {
                continue;
            };
            let members = store.consumers_of(*topic_id);
            let slots = assign_round_robin(partitions, members.len());

            for (member, slot) in members.iter().zip(slots) {
                if let Some(consumer) = store.consumer_mut(*member) {
                    consumer.assigned.extend(slot);
                    consumer.rebalancing = true;
                }
                if seen.insert(*member) {
                    flagged.push(*member);
                }
            }

            debug!(
                topic = %topic_id,
                partitions,
                consumers = members.len(),
                "Rebalanced topic"
            );
        }

        RebalanceOutcome { topics, flagged }
    }

    /// Close the touched set over topic ↔ consumer links.
    ///
    /// Returns the topics to reassign (store order) and the consumers to
    /// reset, which includes touched consumers that no longer subscribe to
    /// anything so their stale partitions are dropped.
    fn closure(store: &EntityStore, touched: &Touched) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut topics: BTreeSet<NodeId> = BTreeSet::new();
        let mut consumers: BTreeSet<NodeId> = touched.consumers.iter().copied().collect();
        let mut pending_topics: Vec<NodeId> = touched.topics.clone();
        let mut pending_consumers: Vec<NodeId> = touched.consumers.clone();

        while !pending_topics.is_empty() || !pending_consumers.is_empty() {
            while let Some(topic) = pending_topics.pop() {
                if store.topic(topic).is_none() || !topics.insert(topic) {
                    continue;
                }
                for consumer in store.consumers_of(topic) {
                    if consumers.insert(consumer) {
                        pending_consumers.push(consumer);
                    }
                }
            }
            while let Some(consumer) = pending_consumers.pop() {
                for topic in store.topics_of(consumer) {
                    if !topics.contains(&topic) {
                        pending_topics.push(topic);
                    }
                }
            }
        }

        let ordered_topics = store
            .topic_ids()
            .into_iter()
            .filter(|id| topics.contains(id))
            .collect();
        (ordered_topics, consumers.into_iter().collect())
    }
}

/// Clear every rebalancing flag. Returns how many were set.
pub fn settle(store: &mut EntityStore) -> usize {
    let mut cleared = 0;
    for node in store.nodes_mut() {
        if let Some(consumer) = node.as_consumer_mut() {
            if consumer.rebalancing {
                consumer.rebalancing = false;
                cleared += 1;
            }
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokersim_types::{
        BrokerId, Connection, Consumer, NodeRole, PartitionIndex, Position, Topic, DEFAULT_BROKERS,
    };
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn topic(store: &mut EntityStore, partitions: u32) -> NodeId {
        let mut t = Topic::led_by(BrokerId(101));
        t.partitions = partitions;
        store.insert_node(Position::default(), NodeRole::Topic(t))
    }

    fn consumer(store: &mut EntityStore) -> NodeId {
        store.insert_node(Position::default(), NodeRole::Consumer(Consumer::default()))
    }

    fn assigned(store: &EntityStore, id: NodeId) -> Vec<PartitionIndex> {
        store.consumer(id).unwrap().assigned.clone()
    }

    fn subscribe(store: &mut EntityStore, topic: NodeId, consumer: NodeId) {
        store
            .insert_connection(Connection::new(topic, consumer))
            .unwrap();
    }

    #[traced_test]
    #[test]
    fn test_excess_consumers_stay_idle() {
        let mut store = EntityStore::new(DEFAULT_BROKERS);
        let t = topic(&mut store, 2);
        let cs: Vec<NodeId> = (0..3).map(|_| consumer(&mut store)).collect();
        for c in &cs {
            subscribe(&mut store, t, *c);
        }

        let outcome = PartitionRebalancer::default().rebalance(&mut store, &Touched::topic(t));

        assert_eq!(assigned(&store, cs[0]), vec![0]);
        assert_eq!(assigned(&store, cs[1]), vec![1]);
        assert!(assigned(&store, cs[2]).is_empty());
        assert_eq!(outcome.flagged, cs);
        assert!(store.consumer(cs[2]).unwrap().rebalancing);
    }

    #[traced_test]
    #[test]
    fn test_rebalance_is_idempotent() {
        let mut store = EntityStore::new(DEFAULT_BROKERS);
        let t = topic(&mut store, 5);
        let c1 = consumer(&mut store);
        let c2 = consumer(&mut store);
        subscribe(&mut store, t, c1);
        subscribe(&mut store, t, c2);

        let rebalancer = PartitionRebalancer::default();
        rebalancer.rebalance(&mut store, &Touched::topic(t));
        let first = (assigned(&store, c1), assigned(&store, c2));
        rebalancer.rebalance(&mut store, &Touched::topic(t));
        let second = (assigned(&store, c1), assigned(&store, c2));

        assert_eq!(first, (vec![0, 2, 4], vec![1, 3]));
        assert_eq!(first, second);
    }

    #[traced_test]
    #[test]
    fn test_removed_connection_drops_stale_partitions() {
        for scope in [RebalanceScope::Global, RebalanceScope::AffectedTopics] {
            let mut store = EntityStore::new(DEFAULT_BROKERS);
            let t = topic(&mut store, 2);
            let c = consumer(&mut store);
            subscribe(&mut store, t, c);

            let rebalancer = PartitionRebalancer::new(scope);
            rebalancer.rebalance(&mut store, &Touched::topic(t));
            assert_eq!(assigned(&store, c), vec![0, 1]);

            store.remove_connection(Connection::new(t, c)).unwrap();
            let touched = Touched {
                topics: vec![t],
                consumers: vec![c],
            };
            rebalancer.rebalance(&mut store, &touched);
            assert!(assigned(&store, c).is_empty(), "scope {scope:?}");
        }
    }

    #[traced_test]
    #[test]
    fn test_affected_scope_leaves_unrelated_topics_alone() {
        let mut store = EntityStore::new(DEFAULT_BROKERS);
        let orders = topic(&mut store, 1);
        let audit = topic(&mut store, 1);
        let c1 = consumer(&mut store);
        let c2 = consumer(&mut store);
        subscribe(&mut store, orders, c1);
        subscribe(&mut store, audit, c2);

        let rebalancer = PartitionRebalancer::new(RebalanceScope::AffectedTopics);
        rebalancer.rebalance(
            &mut store,
            &Touched {
                topics: vec![orders, audit],
                consumers: vec![],
            },
        );
        settle(&mut store);

        let outcome = rebalancer.rebalance(&mut store, &Touched::topic(orders));
        assert_eq!(outcome.topics, vec![orders]);
        assert_eq!(outcome.flagged, vec![c1]);
        assert!(!store.consumer(c2).unwrap().rebalancing);
        assert_eq!(assigned(&store, c2), vec![0]);
    }

    #[traced_test]
    #[test]
    fn test_affected_scope_follows_shared_consumers() {
        let mut store = EntityStore::new(DEFAULT_BROKERS);
        let a = topic(&mut store, 1);
        let b = topic(&mut store, 2);
        let shared = consumer(&mut store);
        let only_b = consumer(&mut store);
        subscribe(&mut store, a, shared);
        subscribe(&mut store, b, shared);
        subscribe(&mut store, b, only_b);

        let global = PartitionRebalancer::new(RebalanceScope::Global);
        global.rebalance(&mut store, &Touched::default());
        let expected = (assigned(&store, shared), assigned(&store, only_b));

        let affected = PartitionRebalancer::new(RebalanceScope::AffectedTopics);
        let outcome = affected.rebalance(&mut store, &Touched::topic(a));

        assert_eq!(outcome.topics, vec![a, b]);
        assert_eq!((assigned(&store, shared), assigned(&store, only_b)), expected);
        assert_eq!(expected, (vec![0, 0], vec![1]));
    }

    #[traced_test]
    #[test]
    fn test_settle_clears_all_flags() {
        let mut store = EntityStore::new(DEFAULT_BROKERS);
        let t = topic(&mut store, 1);
        let c1 = consumer(&mut store);
        let c2 = consumer(&mut store);
        subscribe(&mut store, t, c1);
        subscribe(&mut store, t, c2);

        PartitionRebalancer::default().rebalance(&mut store, &Touched::topic(t));
        assert!(store.any_rebalancing());
        assert_eq!(settle(&mut store), 2);
        assert!(!store.any_rebalancing());
        assert_eq!(settle(&mut store), 0);
    }

    proptest! {
        #[test]
        fn assignment_covers_partitions_once(partitions in 1u32..24, consumers in 1usize..10) {
            let mut store = EntityStore::new(DEFAULT_BROKERS);
            let t = topic(&mut store, partitions);
            let cs: Vec<NodeId> = (0..consumers).map(|_| consumer(&mut store)).collect();
            for c in &cs {
                subscribe(&mut store, t, *c);
            }

            PartitionRebalancer::default().rebalance(&mut store, &Touched::topic(t));

            let mut all: Vec<PartitionIndex> =
                cs.iter().flat_map(|c| assigned(&store, *c)).collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..partitions).collect::<Vec<_>>());

            let idle = cs.iter().filter(|c| assigned(&store, **c).is_empty()).count();
            prop_assert_eq!(idle, consumers.saturating_sub(partitions as usize));
        }
    }
}
