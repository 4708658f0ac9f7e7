//! Rule-based explanations of simulation concepts.

use brokersim_cluster::Advisor;
use brokersim_types::{AdvisorySnapshot, MetadataMode, SessionStatus};

/// Answers concept queries from a fixed glossary, annotated with the
/// current state of the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlossaryAdvisor;

impl GlossaryAdvisor {
    fn definition(concept: &str) -> Option<&'static str> {
        let concept = concept.trim().to_ascii_lowercase();
        let entry = match concept.as_str() {
            "topic" | "topics" => {
                "A topic is a replicated log split into partitions. Producers append to it \
                 and consumers drain it."
            }
            "partition" | "partitions" => {
                "A partition is the unit of consumer assignment. Each partition is read by \
                 exactly one consumer in the group, so extra consumers sit idle."
            }
            "rebalance" | "rebalancing" | "consumer group" | "group" => {
                "A rebalance redistributes partitions across consumers whenever the topology \
                 changes. While it settles the whole cluster stops processing."
            }
            "replica" | "replicas" | "replication" | "replication factor" => {
                "Replicas are brokers holding a copy of a topic. One of them is the leader; \
                 if it fails, the controller promotes the next live replica."
            }
            "leader" | "failover" => {
                "The leader serves a topic's traffic. Failover needs a live controller to \
                 approve a new leader from the replica set, otherwise the topic goes offline."
            }
            "controller" | "election" => {
                "The controller is the single broker allowed to approve leader changes. The \
                 lowest live broker wins the election."
            }
            "primary" | "primary mode" => {
                "In primary mode an external metadata service backs the controller. If the \
                 service is down there is no controller at all."
            }
            "self-managed" | "self managed" | "self_managed" | "quorum" => {
                "In self-managed mode the brokers elect a controller among themselves, so \
                 metadata stays available as long as one broker is live."
            }
            "lag" | "backlog" => {
                "Lag is the backlog of unprocessed messages. It grows when producers outpace \
                 the consumers holding partitions, and the run ends when the average \
                 reaches the ceiling."
            }
            "offline" => {
                "An offline topic has no usable leader. Its lag is frozen and it is left out \
                 of the global average until it recovers."
            }
            _ => return None,
        };
        Some(entry)
    }

    fn observation(concept: &str, snapshot: &AdvisorySnapshot) -> String {
        let concept = concept.trim().to_ascii_lowercase();
        if concept.contains("lag") || concept.contains("backlog") {
            return match snapshot.status {
                SessionStatus::Terminated => format!(
                    "The session terminated with global lag {:.2}.",
                    snapshot.global_lag
                ),
                _ => format!("Global lag is currently {:.2}.", snapshot.global_lag),
            };
        }
        if concept.contains("partition") || concept.contains("rebalanc") || concept.contains("group")
        {
            return format!(
                "{} of {} consumers hold no partitions.",
                snapshot.idle_consumers, snapshot.consumers
            );
        }
        if concept.contains("offline") || concept.contains("leader") || concept.contains("failover")
        {
            return format!(
                "{} of {} topics are offline.",
                snapshot.offline_topics, snapshot.topics
            );
        }
        match snapshot.controller {
            Some(controller) => format!(
                "Mode is {}; the controller is {controller}.",
                snapshot.mode
            ),
            None if snapshot.mode == MetadataMode::Primary => {
                "Mode is PRIMARY and there is no controller: the metadata service is down \
                 or no broker is live."
                    .to_string()
            }
            None => format!("Mode is {} and no broker is live to act as controller.", snapshot.mode),
        }
    }
}

impl Advisor for GlossaryAdvisor {
    fn advise(&self, snapshot: &AdvisorySnapshot, concept: &str) -> String {
        match Self::definition(concept) {
            Some(definition) => format!("{definition}\n{}", Self::observation(concept, snapshot)),
            None => format!(
                "No entry for \"{}\". Try: topic, partition, rebalance, replica, leader, \
                 controller, primary, self-managed, lag, offline.",
                concept.trim()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokersim_types::BrokerId;

    fn snapshot() -> AdvisorySnapshot {
        AdvisorySnapshot {
            status: SessionStatus::Running,
            global_lag: 12.5,
            messages_processed: 300.0,
            producers: 1,
            topics: 2,
            consumers: 3,
            connections: 5,
            offline_topics: 1,
            idle_consumers: 1,
            controller: Some(BrokerId(102)),
            mode: MetadataMode::SelfManaged,
        }
    }

    #[test]
    fn test_known_concepts() {
        let advisor = GlossaryAdvisor;
        let lag = advisor.advise(&snapshot(), "Lag");
        assert!(lag.contains("backlog"));
        assert!(lag.contains("12.50"));

        let partitions = advisor.advise(&snapshot(), "partitions");
        assert!(partitions.contains("1 of 3 consumers"));

        let controller = advisor.advise(&snapshot(), "controller");
        assert!(controller.contains("Broker(102)"));
    }

    #[test]
    fn test_unknown_concept() {
        let reply = GlossaryAdvisor.advise(&snapshot(), "  zookeeper ");
        assert!(reply.starts_with("No entry for \"zookeeper\""));
    }
}
