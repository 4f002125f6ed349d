//! Statistics - Scheduler activity counters
//!
//! Tracks admissions, picks per queue, context switches, preemption
//! requests, aging activity and reclamation. Counters live inside the
//! scheduler and are only touched under its lock.

use core::fmt;

use crate::scheduler::thread::QueueLevel;

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Threads made ready (creation, wake-up, yield)
    pub admissions: u64,

    /// Threads selected from each queue, indexed by `QueueLevel::index`
    pub picks: [u64; 3],

    /// Selections that found every queue empty
    pub idle_picks: u64,

    /// Context handoffs performed
    pub total_switches: u64,

    /// Preemption requests raised by admission
    pub preemptions: u64,

    /// Aging promotions (priority actually raised)
    pub promotions: u64,

    /// Promotions that moved a thread to another queue
    pub migrations: u64,

    /// Finished threads whose control block was released
    pub reclaimed: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            admissions: 0,
            picks: [0; 3],
            idle_picks: 0,
            total_switches: 0,
            preemptions: 0,
            promotions: 0,
            migrations: 0,
            reclaimed: 0,
        }
    }

    pub fn record_admission(&mut self) {
        self.admissions += 1;
    }

    /// Record scheduling decision
    pub fn record_pick(&mut self, level: Option<QueueLevel>) {
        match level {
            Some(level) => self.picks[level.index()] += 1,
            None => self.idle_picks += 1,
        }
    }

    pub fn record_switch(&mut self) {
        self.total_switches += 1;
    }

    pub fn record_preemption(&mut self) {
        self.preemptions += 1;
    }

    pub fn record_promotion(&mut self, migrated: bool) {
        self.promotions += 1;
        if migrated {
            self.migrations += 1;
        }
    }

    pub fn record_reclaim(&mut self) {
        self.reclaimed += 1;
    }

    pub fn picks_from(&self, level: QueueLevel) -> u64 {
        self.picks[level.index()]
    }

    /// Successful selections across all queues
    pub fn total_picks(&self) -> u64 {
        self.picks.iter().sum()
    }
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Scheduler Statistics ===")?;
        writeln!(f, "Admissions:      {}", self.admissions)?;
        writeln!(
            f,
            "Picks:           L1={} L2={} L3={} idle={}",
            self.picks[0], self.picks[1], self.picks[2], self.idle_picks
        )?;
        writeln!(f, "Switches:        {}", self.total_switches)?;
        writeln!(f, "Preempt reqs:    {}", self.preemptions)?;
        writeln!(
            f,
            "Aging:           {} promotions, {} migrations",
            self.promotions, self.migrations
        )?;
        write!(f, "Reclaimed:       {}", self.reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_accounting() {
        let mut stats = SchedulerStats::new();
        stats.record_pick(Some(QueueLevel::L1));
        stats.record_pick(Some(QueueLevel::L3));
        stats.record_pick(Some(QueueLevel::L3));
        stats.record_pick(None);
        assert_eq!(stats.picks_from(QueueLevel::L3), 2);
        assert_eq!(stats.total_picks(), 3);
        assert_eq!(stats.idle_picks, 1);
    }

    #[test]
    fn test_promotion_accounting() {
        let mut stats = SchedulerStats::default();
        stats.record_promotion(false);
        stats.record_promotion(true);
        assert_eq!((stats.promotions, stats.migrations), (2, 1));
    }
}
