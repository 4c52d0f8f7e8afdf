use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::debug;

use crate::{
    api::NodeInspector,
    pool::ResourcePool,
    ram::Ram,
    sizing::{
        batch_threads,
        TargetSnapshot,
    },
    stage::{
        StageThreadCounts,
        Stages,
    },
};

/// Smallest search interval, so a zero threshold still terminates.
const MIN_THRESHOLD: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchOutcome {
    pub fraction: f64,
    pub threads: StageThreadCounts,
    pub ram: Stages<Ram>,
}

/// Whether the blocks can all be placed at once, each on the smallest host
/// it fits on. The pool is left as it was found.
pub fn fits(
    pool: &mut ResourcePool,
    blocks: &Stages<Ram>,
) -> bool {
    if pool.largest_free_block() < blocks.largest() {
        return false;
    }

    let mut reserved: SmallVec<[(CompactString, Ram); 4]> = SmallVec::new();
    let mut feasible = true;

    for (_, &block) in blocks.iter() {
        if block.is_zero() {
            continue;
        }

        let host = match pool.smallest_fitting(block) {
            Some(h) => CompactString::from(h.get_name()),
            None => {
                feasible = false;
                break;
            },
        };

        if pool.reserve_speculative(&host, block).is_err() {
            feasible = false;
            break;
        }
        reserved.push((host, block));
    }

    for (host, block) in reserved {
        pool.release_amount(&host, block);
    }

    feasible
}

/// Largest fraction of the target's maximum money, to within `threshold`,
/// whose batch fits in the pool.
///
/// Every probed fraction is checked on its own; the result is the largest
/// one found feasible, even if feasibility is not monotonic.
pub fn optimal_fraction(
    game: &impl NodeInspector,
    target: &TargetSnapshot,
    pool: &mut ResourcePool,
    threshold: f64,
) -> Option<SearchOutcome> {
    let threshold = if threshold.is_finite() {
        threshold.max(MIN_THRESHOLD)
    }
    else {
        MIN_THRESHOLD
    };

    let mut lo = 0.;
    let mut hi = 1.;
    let mut best: Option<SearchOutcome> = None;

    while threshold < hi - lo {
        let mid = (lo + hi) / 2.;
        let threads = batch_threads(game, target, mid);
        let ram = threads.ram_blocks();

        if fits(pool, &ram) {
            if best.map_or(true, |b| b.fraction < mid) {
                best = Some(SearchOutcome {
                    fraction: mid,
                    threads,
                    ram,
                });
            }
            lo = mid;
        }
        else {
            hi = mid;
        }
    }

    match &best {
        Some(outcome) => debug!(
            node = %target.name,
            fraction = outcome.fraction,
            threads = %outcome.threads,
            "search converged"
        ),
        None => debug!(node = %target.name, "no feasible fraction"),
    }

    best
}
