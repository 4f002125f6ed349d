//! System tick counter
//!
//! Monotonically increasing counter advanced by the timer interrupt.
//! Read-only from the scheduler's point of view.

use core::fmt;
use core::ops::{Add, AddAssign};
use core::sync::atomic::{AtomicU64, Ordering};

/// Point in time, in timer ticks since boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub u64);

impl Tick {
    /// Boot
    pub const ZERO: Self = Self(0);

    /// Get tick count as raw integer
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Ticks elapsed from `earlier` up to `self` (0 if `earlier` is later)
    pub const fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for Tick {
    type Output = Tick;

    fn add(self, rhs: u64) -> Self::Output {
        Tick(self.0.saturating_add(rhs))
    }
}

impl AddAssign<u64> for Tick {
    fn add_assign(&mut self, rhs: u64) {
        self.0 = self.0.saturating_add(rhs);
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the current tick value
pub trait TickSource {
    /// Current tick
    fn now(&self) -> Tick;
}

/// Atomic tick counter, advanced by the timer path
#[derive(Debug)]
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Called by the timer interrupt handler; returns the new tick value
    #[inline]
    pub fn advance(&self, ticks: u64) -> Tick {
        Tick(self.ticks.fetch_add(ticks, Ordering::Relaxed) + ticks)
    }

    /// Set the counter (boot / simulation only); never moves backwards
    pub fn set(&self, tick: Tick) {
        self.ticks.fetch_max(tick.0, Ordering::Relaxed);
    }
}

impl TickSource for TickCounter {
    #[inline]
    fn now(&self) -> Tick {
        Tick(self.ticks.load(Ordering::Relaxed))
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}
