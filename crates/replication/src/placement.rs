//! Replica set selection.

use brokersim_types::BrokerId;
use rand::seq::SliceRandom;
use rand::Rng;

/// Pick `factor` distinct brokers from `pool`.
///
/// The preferred broker (normally the current leader) is placed first when
/// it belongs to the pool; the remaining slots are a random selection of
/// the other brokers. `factor` is clamped to the pool size.
pub fn select_replicas<R: Rng + ?Sized>(
    pool: &[BrokerId],
    preferred: Option<BrokerId>,
    factor: usize,
    rng: &mut R,
) -> Vec<BrokerId> {
    let factor = factor.min(pool.len());
    let preferred = preferred.filter(|p| pool.contains(p));

    let mut others: Vec<BrokerId> = pool
        .iter()
        .copied()
        .filter(|b| Some(*b) != preferred)
        .collect();
    others.shuffle(rng);

    preferred
        .into_iter()
        .chain(others)
        .take(factor)
        .collect()
}
