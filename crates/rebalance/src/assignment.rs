//! Round-robin partition assignment.

use brokersim_types::PartitionIndex;

/// Deal `partitions` partition indices across `consumers` slots.
///
/// Partition `i` goes to slot `i % consumers`. With more consumers than
/// partitions the trailing slots stay empty; with more partitions than
/// consumers the leading slots receive several. Returns one list per slot.
pub fn assign_round_robin(partitions: u32, consumers: usize) -> Vec<Vec<PartitionIndex>> {
    let mut slots = vec![Vec::new(); consumers];
    if consumers == 0 {
        return slots;
    }
    for partition in 0..partitions {
        slots[partition as usize % consumers].push(partition);
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_more_partitions_than_consumers() {
        assert_eq!(
            assign_round_robin(5, 2),
            vec![vec![0, 2, 4], vec![1, 3]]
        );
    }

    #[test]
    fn test_more_consumers_than_partitions() {
        assert_eq!(
            assign_round_robin(2, 4),
            vec![vec![0], vec![1], vec![], vec![]]
        );
    }

    #[test]
    fn test_no_consumers() {
        assert!(assign_round_robin(3, 0).is_empty());
    }

    proptest! {
        #[test]
        fn every_partition_assigned_exactly_once(partitions in 1u32..64, consumers in 1usize..16) {
            let slots = assign_round_robin(partitions, consumers);
            let all: Vec<PartitionIndex> = slots.iter().flatten().copied().collect();
            let unique: BTreeSet<PartitionIndex> = all.iter().copied().collect();

            prop_assert_eq!(all.len(), partitions as usize);
            prop_assert_eq!(unique, (0..partitions).collect::<BTreeSet<_>>());
        }

        #[test]
        fn surplus_consumers_are_idle(partitions in 1u32..16, consumers in 1usize..32) {
            let slots = assign_round_robin(partitions, consumers);
            let idle = slots.iter().filter(|s| s.is_empty()).count();
            prop_assert_eq!(idle, consumers.saturating_sub(partitions as usize));
        }
    }
}
