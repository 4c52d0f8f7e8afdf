use core::fmt;

use crate::ram::Ram;

pub const GROW_TIME_MUL: f64 = 3.2;
pub const WEAKEN_TIME_MUL: f64 = 4.;

pub const WEAKEN_SECURITY_DECREASE_THOUSANDTHS: u64 = 50;
pub const HACK_SECURITY_INCREASE_THOUSANDTHS: u64 = 2;
pub const GROW_SECURITY_INCREASE_THOUSANDTHS: u64 = 4;

pub const HACK_MEMORY_USAGE_HUNDREDTHS: u64 = 170;
pub const EXEC_MEMORY_USAGE_HUNDREDTHS: u64 = 175;

pub const HACK_SCRIPT: &str = "child_hack.js";
pub const GROW_SCRIPT: &str = "child_grow.js";
pub const WEAKEN_SCRIPT: &str = "child_weaken.js";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Hack,
    Weaken1,
    Grow,
    Weaken2,
}

impl StageKind {
    /// Stages in the order they are sized, reserved and placed.
    pub const ALL: [StageKind; 4] = [
        StageKind::Hack,
        StageKind::Weaken1,
        StageKind::Grow,
        StageKind::Weaken2,
    ];

    pub fn script(self) -> &'static str {
        use StageKind::*;

        match self {
            Hack => HACK_SCRIPT,
            Grow => GROW_SCRIPT,
            Weaken1 | Weaken2 => WEAKEN_SCRIPT,
        }
    }

    pub fn ram_per_thread(self) -> Ram {
        STAGE_RAM_COST.get(self)
    }

    /// Security change caused by one thread, in thousandths. Weakens report
    /// the amount they remove.
    pub fn security_delta_thousandths(self) -> u64 {
        use StageKind::*;

        match self {
            Hack => HACK_SECURITY_INCREASE_THOUSANDTHS,
            Grow => GROW_SECURITY_INCREASE_THOUSANDTHS,
            Weaken1 | Weaken2 => WEAKEN_SECURITY_DECREASE_THOUSANDTHS,
        }
    }

    pub fn is_weaken(self) -> bool {
        matches!(self, StageKind::Weaken1 | StageKind::Weaken2)
    }
}

impl fmt::Display for StageKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        use StageKind::*;

        let name = match self {
            Hack => "hack",
            Weaken1 => "weaken1",
            Grow => "grow",
            Weaken2 => "weaken2",
        };

        f.write_str(name)
    }
}

/// A value for each of the four stages.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stages<T> {
    pub hack: T,
    pub weaken1: T,
    pub grow: T,
    pub weaken2: T,
}

impl<T> Stages<T> {
    pub fn get(
        &self,
        kind: StageKind,
    ) -> T
    where
        T: Copy,
    {
        *self.get_ref(kind)
    }

    pub fn get_ref(
        &self,
        kind: StageKind,
    ) -> &T {
        use StageKind::*;

        match kind {
            Hack => &self.hack,
            Weaken1 => &self.weaken1,
            Grow => &self.grow,
            Weaken2 => &self.weaken2,
        }
    }

    pub fn get_mut(
        &mut self,
        kind: StageKind,
    ) -> &mut T {
        use StageKind::*;

        match kind {
            Hack => &mut self.hack,
            Weaken1 => &mut self.weaken1,
            Grow => &mut self.grow,
            Weaken2 => &mut self.weaken2,
        }
    }

    pub fn map<U>(
        self,
        mut f: impl FnMut(StageKind, T) -> U,
    ) -> Stages<U> {
        Stages {
            hack: f(StageKind::Hack, self.hack),
            weaken1: f(StageKind::Weaken1, self.weaken1),
            grow: f(StageKind::Grow, self.grow),
            weaken2: f(StageKind::Weaken2, self.weaken2),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StageKind, &T)> + '_ {
        StageKind::ALL.into_iter().map(move |kind| (kind, self.get_ref(kind)))
    }
}

pub type StageThreadCounts = Stages<u32>;

impl Stages<u32> {
    pub fn ram_blocks(&self) -> Stages<Ram> {
        self.map(|kind, threads| kind.ram_per_thread() * threads)
    }

    pub fn total_threads(&self) -> u64 {
        self.iter().map(|(_, t)| *t as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_threads() == 0
    }
}

impl Stages<Ram> {
    pub fn total(&self) -> Ram {
        self.iter().map(|(_, r)| *r).sum()
    }

    pub fn largest(&self) -> Ram {
        self.iter().map(|(_, r)| *r).max().unwrap_or(Ram::ZERO)
    }
}

impl fmt::Display for Stages<u32> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "H{} W{} G{} W{}",
            self.hack, self.weaken1, self.grow, self.weaken2
        )
    }
}

pub const STAGE_RAM_COST: Stages<Ram> = Stages {
    hack: Ram::from_hundredths(HACK_MEMORY_USAGE_HUNDREDTHS),
    weaken1: Ram::from_hundredths(EXEC_MEMORY_USAGE_HUNDREDTHS),
    grow: Ram::from_hundredths(EXEC_MEMORY_USAGE_HUNDREDTHS),
    weaken2: Ram::from_hundredths(EXEC_MEMORY_USAGE_HUNDREDTHS),
};

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ram_blocks_use_the_cost_table() {
        let threads = Stages {
            hack: 10,
            weaken1: 1,
            grow: 5,
            weaken2: 1,
        };
        let blocks = threads.ram_blocks();

        assert_eq!(blocks.hack, Ram::from_gb(17.));
        assert_eq!(blocks.weaken1, Ram::from_gb(1.75));
        assert_eq!(blocks.grow, Ram::from_gb(8.75));
        assert_eq!(blocks.total(), Ram::from_gb(29.25));
        assert_eq!(blocks.largest(), Ram::from_gb(17.));
    }

    #[test]
    fn iteration_follows_placement_order() {
        let kinds = Stages::<u8>::default()
            .iter()
            .map(|(k, _)| k)
            .collect::<Vec<_>>();

        assert_eq!(kinds, StageKind::ALL);
    }

    #[test]
    fn weakens_share_a_script() {
        assert_eq!(StageKind::Weaken1.script(), StageKind::Weaken2.script());
        assert_ne!(StageKind::Hack.script(), StageKind::Grow.script());
    }
}
