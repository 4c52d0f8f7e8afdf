use core::{
    fmt,
    iter::Sum,
    ops::{
        Add,
        AddAssign,
        Mul,
        Sub,
    },
};

/// An amount of RAM, counted in hundredths of a GB.
///
/// Script costs in the game are multiples of 0.05GB, so hundredths keep every
/// reservation and release exact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ram(u64);

impl Ram {
    pub const ZERO: Ram = Ram(0);

    pub const fn from_hundredths(hundredths: u64) -> Ram {
        Ram(hundredths)
    }

    /// Converts GB as reported by the game. Negative or NaN values become
    /// zero.
    pub fn from_gb(gb: f64) -> Ram {
        if gb.is_finite() && 0. < gb {
            Ram((gb * 100.).round() as u64)
        }
        else {
            Ram::ZERO
        }
    }

    pub const fn hundredths(self) -> u64 {
        self.0
    }

    pub fn as_gb(self) -> f64 {
        self.0 as f64 / 100.
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_sub(
        self,
        other: Ram,
    ) -> Ram {
        Ram(self.0.saturating_sub(other.0))
    }

    pub fn threads_of(
        self,
        per_thread: Ram,
    ) -> u32 {
        if per_thread.is_zero() {
            return 0;
        }

        (self.0 / per_thread.0).min(u32::MAX as u64) as u32
    }

    pub fn scaled_down(
        self,
        fraction: f64,
    ) -> Ram {
        let fraction = fraction.clamp(0., 1.);
        Ram((self.0 as f64 * (1. - fraction)).round() as u64)
    }
}

impl Add for Ram {
    type Output = Ram;

    fn add(
        self,
        other: Ram,
    ) -> Ram {
        Ram(self.0 + other.0)
    }
}

impl AddAssign for Ram {
    fn add_assign(
        &mut self,
        other: Ram,
    ) {
        self.0 += other.0;
    }
}

impl Sub for Ram {
    type Output = Ram;

    fn sub(
        self,
        other: Ram,
    ) -> Ram {
        self.saturating_sub(other)
    }
}

impl Mul<u32> for Ram {
    type Output = Ram;

    fn mul(
        self,
        threads: u32,
    ) -> Ram {
        Ram(self.0 * threads as u64)
    }
}

impl Sum for Ram {
    fn sum<I: Iterator<Item = Ram>>(iter: I) -> Ram {
        iter.fold(Ram::ZERO, Add::add)
    }
}

impl fmt::Display for Ram {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}.{:02}GB", self.0 / 100, self.0 % 100)
    }
}
