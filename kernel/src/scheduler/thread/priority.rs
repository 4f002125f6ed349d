//! Thread priority and its mapping to ready-queue bands

use core::fmt;

use crate::scheduler::core::error::{SchedulerError, SchedulerResult};

/// Lowest priority
pub const PRIORITY_MIN: u8 = 0;
/// Highest priority; aging never goes past it
pub const PRIORITY_MAX: u8 = 149;
/// First priority of the L2 band
pub const L2_MIN_PRIORITY: u8 = 50;
/// First priority of the L1 band
pub const L1_MIN_PRIORITY: u8 = 100;

/// Ready queue a priority maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueLevel {
    /// [100, 149]: shortest estimated burst first, preemptive
    L1,
    /// [50, 99]: highest priority first
    L2,
    /// [0, 49]: FIFO, time-sliced
    L3,
}

impl QueueLevel {
    /// Queues in selection precedence
    pub const ALL: [QueueLevel; 3] = [QueueLevel::L1, QueueLevel::L2, QueueLevel::L3];

    pub const fn index(self) -> usize {
        match self {
            QueueLevel::L1 => 0,
            QueueLevel::L2 => 1,
            QueueLevel::L3 => 2,
        }
    }
}

impl fmt::Display for QueueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueLevel::L1 => write!(f, "L1"),
            QueueLevel::L2 => write!(f, "L2"),
            QueueLevel::L3 => write!(f, "L3"),
        }
    }
}

/// Thread priority in [0, 149]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(PRIORITY_MIN);
    pub const MAX: Priority = Priority(PRIORITY_MAX);

    /// Validated constructor
    pub fn new(value: u32) -> SchedulerResult<Self> {
        if value > PRIORITY_MAX as u32 {
            return Err(SchedulerError::InvalidPriority {
                value,
                min: PRIORITY_MIN as u32,
                max: PRIORITY_MAX as u32,
            });
        }
        Ok(Self(value as u8))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Raise by `step`, clamped at 149
    pub fn saturating_raise(self, step: u8) -> Self {
        Self(self.0.saturating_add(step).min(PRIORITY_MAX))
    }

    /// Band this priority belongs to
    pub const fn level(self) -> QueueLevel {
        if self.0 >= L1_MIN_PRIORITY {
            QueueLevel::L1
        } else if self.0 >= L2_MIN_PRIORITY {
            QueueLevel::L2
        } else {
            QueueLevel::L3
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
