use compact_str::CompactString;

use crate::{
    api::NodeInspector,
    stage::{
        StageKind,
        StageThreadCounts,
        Stages,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub struct TargetSnapshot {
    pub name: CompactString,
    pub max_value: f64,
    pub current_value: f64,
    pub min_security: f64,
    pub current_security: f64,
}

impl TargetSnapshot {
    pub fn read(
        game: &impl NodeInspector,
        target: &str,
    ) -> TargetSnapshot {
        TargetSnapshot {
            name: target.into(),
            max_value: game.max_value(target),
            current_value: game.current_value(target),
            min_security: game.min_security(target),
            current_security: game.current_security(target),
        }
    }

    pub fn min_security_thousandths(&self) -> u64 {
        to_thousandths(self.min_security)
    }

    pub fn security_thousandths(&self) -> u64 {
        to_thousandths(self.current_security)
    }

    pub fn excess_security_thousandths(&self) -> u64 {
        self.security_thousandths()
            .saturating_sub(self.min_security_thousandths())
    }

    pub fn is_min_security(&self) -> bool {
        self.excess_security_thousandths() == 0
    }

    pub fn is_max_value(&self) -> bool {
        self.max_value <= self.current_value
    }

    pub fn is_prepared(&self) -> bool {
        self.is_min_security() && self.is_max_value()
    }
}

fn to_thousandths(x: f64) -> u64 {
    if x.is_finite() && 0. < x {
        (x * 1000.).round() as u64
    }
    else {
        0
    }
}

fn to_threads(
    estimate: f64,
    round: fn(f64) -> f64,
) -> u32 {
    if estimate.is_finite() && 0. < estimate {
        round(estimate).min(u32::MAX as f64) as u32
    }
    else {
        0
    }
}

pub fn security_delta_thousandths(
    game: &impl NodeInspector,
    kind: StageKind,
) -> u64 {
    to_thousandths(game.security_delta_per_thread(kind))
}

/// The fewest weaken threads that remove `increase` thousandths of
/// security.
pub fn weaken_threads_for(
    increase: u64,
    weaken_delta: u64,
) -> u32 {
    if weaken_delta == 0 {
        return 0;
    }

    // add one for remainders
    let mut threads = increase / weaken_delta;
    if 0 < increase % weaken_delta {
        threads += 1;
    }

    threads.min(u32::MAX as u64) as u32
}

/// Weaken threads that exactly offset `threads` threads of a stage raising
/// security by `delta` thousandths each.
pub fn offset_threads(
    threads: u32,
    delta: u64,
    weaken_delta: u64,
) -> u32 {
    weaken_threads_for(threads as u64 * delta, weaken_delta)
}

fn regrow_threads(
    game: &impl NodeInspector,
    target: &TargetSnapshot,
    extracted: f64,
) -> u32 {
    if extracted <= 0. {
        return 0;
    }

    let max = target.max_value;
    let remaining = (max - max * extracted.min(1.)).max(1.);

    to_threads(game.threads_to_grow_by(&target.name, max / remaining), f64::ceil)
}

pub fn batch_threads(
    game: &impl NodeInspector,
    target: &TargetSnapshot,
    fraction: f64,
) -> StageThreadCounts {
    let weaken_delta = security_delta_thousandths(game, StageKind::Weaken1);

    let hack = to_threads(
        game.threads_to_extract(&target.name, target.max_value * fraction),
        f64::floor,
    );
    let weaken1 = offset_threads(
        hack,
        security_delta_thousandths(game, StageKind::Hack),
        weaken_delta,
    );

    let extracted = game.extraction_per_thread(&target.name) * hack as f64;
    let grow = regrow_threads(game, target, extracted);
    let weaken2 = offset_threads(
        grow,
        security_delta_thousandths(game, StageKind::Grow),
        weaken_delta,
    );

    Stages {
        hack,
        weaken1,
        grow,
        weaken2,
    }
}

/// Threads bringing the target back to minimum security and full money.
///
/// While security is above `security_tolerance` times the minimum only the
/// weaken is sized, since growing is slow on a hardened target.
pub fn prep_threads(
    game: &impl NodeInspector,
    target: &TargetSnapshot,
    security_tolerance: f64,
) -> StageThreadCounts {
    let weaken_delta = security_delta_thousandths(game, StageKind::Weaken1);
    let weaken1 = weaken_threads_for(target.excess_security_thousandths(), weaken_delta);

    let too_hard = target.min_security * security_tolerance < target.current_security;
    let grow = if too_hard || target.is_max_value() {
        0
    }
    else {
        let multiplier = target.max_value / target.current_value.max(1.);
        to_threads(game.threads_to_grow_by(&target.name, multiplier), f64::ceil)
    };
    let weaken2 = offset_threads(
        grow,
        security_delta_thousandths(game, StageKind::Grow),
        weaken_delta,
    );

    Stages {
        hack: 0,
        weaken1,
        grow,
        weaken2,
    }
}

/// Largest grow count not above `wanted` that fits in `thread_budget`
/// together with its offsetting weaken.
pub fn grow_within_budget(
    game: &impl NodeInspector,
    wanted: u32,
    thread_budget: u64,
) -> u32 {
    let grow_delta = security_delta_thousandths(game, StageKind::Grow);
    let weaken_delta = security_delta_thousandths(game, StageKind::Weaken2);
    let cost = |g: u32| g as u64 + offset_threads(g, grow_delta, weaken_delta) as u64;

    if cost(wanted) <= thread_budget {
        return wanted;
    }

    // cost is monotonic in g
    let (mut lo, mut hi) = (0u32, wanted);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if cost(mid) <= thread_budget {
            lo = mid;
        }
        else {
            hi = mid - 1;
        }
    }

    lo
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        stage::{
            GROW_SECURITY_INCREASE_THOUSANDTHS,
            HACK_SECURITY_INCREASE_THOUSANDTHS,
            WEAKEN_SECURITY_DECREASE_THOUSANDTHS,
        },
        testing::FakeGame,
    };

    #[test]
    fn batch_threads_follow_the_formulas() {
        let game = FakeGame::new().with_target("joesguns", 1_000_000., 5.);
        let target = TargetSnapshot::read(&game, "joesguns");

        // 0.002 of the money per hack thread
        let threads = batch_threads(&game, &target, 0.1);
        assert_eq!(threads.hack, 50);
        assert_eq!(threads.weaken1, 2);
        // 1 / 0.9 growth at 20 threads per doubling unit
        assert_eq!(threads.grow, 3);
        assert_eq!(threads.weaken2, 1);
    }

    #[test]
    fn tiny_fraction_needs_nothing() {
        let game = FakeGame::new().with_target("n00dles", 1_000_000., 5.);
        let target = TargetSnapshot::read(&game, "n00dles");

        assert!(batch_threads(&game, &target, 0.001).is_empty());
    }

    #[test]
    fn prep_weakens_first_on_hardened_target() {
        let game = FakeGame::new().with_target("foodnstuff", 1_000_000., 10.);
        game.set_security("foodnstuff", 15.);
        game.set_money("foodnstuff", 1000.);
        let target = TargetSnapshot::read(&game, "foodnstuff");

        let threads = prep_threads(&game, &target, 1.1);
        assert_eq!(threads.weaken1, 100);
        assert_eq!(threads.grow, 0);
        assert_eq!(threads.weaken2, 0);
    }

    #[test]
    fn prep_grows_when_security_is_close() {
        let game = FakeGame::new().with_target("foodnstuff", 1_000_000., 10.);
        game.set_security("foodnstuff", 10.5);
        game.set_money("foodnstuff", 500_000.);
        let target = TargetSnapshot::read(&game, "foodnstuff");

        let threads = prep_threads(&game, &target, 1.1);
        assert_eq!(threads.hack, 0);
        assert_eq!(threads.weaken1, 10);
        assert_eq!(threads.grow, 20);
        assert_eq!(threads.weaken2, 2);
    }

    #[test]
    fn prepared_target_needs_no_prep() {
        let game = FakeGame::new().with_target("sigma-cosmetics", 2_000_000., 10.);
        let target = TargetSnapshot::read(&game, "sigma-cosmetics");

        assert!(target.is_prepared());
        assert!(prep_threads(&game, &target, 1.1).is_empty());
    }

    #[test]
    fn grow_is_capped_by_budget() {
        let game = FakeGame::new();

        assert_eq!(grow_within_budget(&game, 100, 1000), 100);
        // 25 grows need 2 weakens
        assert_eq!(grow_within_budget(&game, 100, 27), 25);
        assert_eq!(grow_within_budget(&game, 100, 1), 0);
    }

    proptest! {
        #[test]
        fn weaken_offsets_are_exact_and_minimal(threads in 0u32 .. 1_000_000) {
            for delta in [HACK_SECURITY_INCREASE_THOUSANDTHS, GROW_SECURITY_INCREASE_THOUSANDTHS] {
                let weakens = offset_threads(threads, delta, WEAKEN_SECURITY_DECREASE_THOUSANDTHS) as u64;
                let increase = threads as u64 * delta;

                prop_assert!(increase <= weakens * WEAKEN_SECURITY_DECREASE_THOUSANDTHS);
                if 0 < weakens {
                    prop_assert!((weakens - 1) * WEAKEN_SECURITY_DECREASE_THOUSANDTHS < increase);
                }
            }
        }
    }
}
