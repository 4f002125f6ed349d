//! Aging engine
//!
//! Starvation guard run over all three queues before every selection.
//! A ready thread that has waited strictly longer than the threshold
//! gains `step` priority (clamped at 149) and its aging timestamp moves
//! forward by exactly one threshold, so credit beyond one window carries
//! over to later passes.
//!
//! An aged thread is re-inserted with its new priority (a fresh
//! insertion, so it goes behind equal keys); if the band changed, it
//! lands in the destination queue under that queue's ordering.

use alloc::vec::Vec;

use super::queue::ReadyQueues;
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::thread::{Priority, QueueLevel, ThreadId, ThreadTable};
use crate::time::Tick;

/// One priority raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub thread: ThreadId,
    pub from: Priority,
    pub to: Priority,
    /// Queue before the raise
    pub from_level: QueueLevel,
    /// Queue after the raise (same as `from_level` unless it migrated)
    pub to_level: QueueLevel,
}

impl Promotion {
    pub fn migrated(&self) -> bool {
        self.from_level != self.to_level
    }
}

/// Aging parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingEngine {
    threshold: u64,
    step: u8,
}

impl AgingEngine {
    pub const fn new(threshold: u64, step: u8) -> Self {
        Self { threshold, step }
    }

    pub const fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.aging_threshold, config.aging_step)
    }

    pub const fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Whether a thread stamped at `stamp` is overdue at `now`
    #[inline]
    pub const fn is_overdue(&self, stamp: Tick, now: Tick) -> bool {
        now.since(stamp) > self.threshold
    }

    /// One aging pass over the queue `level`.
    ///
    /// The queue is snapshotted first, so a thread re-inserted into the
    /// same band is not visited twice. At most one promotion per thread.
    pub fn age(
        &self,
        level: QueueLevel,
        queues: &mut ReadyQueues,
        threads: &mut ThreadTable,
        now: Tick,
    ) -> Vec<Promotion> {
        let mut promotions = Vec::new();

        for id in queues.queue(level).ids() {
            let thread = match threads.get_mut(id) {
                Ok(thread) => thread,
                Err(_) => panic!("[SCHED CRITICAL] Invariant violated: queued thread {} not registered", id),
            };
            let stamp = thread.aging_timestamp();
            if !self.is_overdue(stamp, now) {
                continue;
            }

            thread.set_aging_timestamp(stamp + self.threshold);
            let from = thread.priority();
            let to = from.saturating_raise(self.step);
            if to == from {
                // Already at the ceiling
                continue;
            }

            thread.set_priority(to);
            queues.remove(id);
            let to_level = queues.insert(thread);
            promotions.push(Promotion {
                thread: id,
                from,
                to,
                from_level: level,
                to_level,
            });
        }

        promotions
    }
}

impl Default for AgingEngine {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::thread::Thread;

    fn setup(entries: &[(ThreadId, u32, u64)]) -> (ReadyQueues, ThreadTable) {
        let mut queues = ReadyQueues::new();
        let mut table = ThreadTable::new();
        for &(id, priority, stamp) in entries {
            let mut thread = Thread::new(id, "t", Priority::new(priority).unwrap());
            thread.set_aging_timestamp(Tick(stamp));
            queues.insert(&thread);
            table.insert(thread).unwrap();
        }
        (queues, table)
    }

    #[test]
    fn test_threshold_is_strict() {
        let engine = AgingEngine::default();
        assert!(!engine.is_overdue(Tick(0), Tick(1500)));
        assert!(engine.is_overdue(Tick(0), Tick(1501)));
    }

    #[test]
    fn test_promotion_migrates_band() {
        let engine = AgingEngine::default();
        let (mut queues, mut table) = setup(&[(1, 40, 0)]);

        let promotions = engine.age(QueueLevel::L3, &mut queues, &mut table, Tick(1600));

        assert_eq!(promotions.len(), 1);
        assert!(promotions[0].migrated());
        assert_eq!(promotions[0].to_level, QueueLevel::L2);
        assert_eq!(queues.level_of(1), Some(QueueLevel::L2));
        let thread = table.get(1).unwrap();
        assert_eq!(thread.priority().value(), 50);
        assert_eq!(thread.aging_timestamp(), Tick(1500));
    }

    #[test]
    fn test_same_band_goes_behind_equals() {
        let engine = AgingEngine::default();
        // 1 is overdue and stays in L3, 2 is fresh
        let (mut queues, mut table) = setup(&[(1, 10, 0), (2, 10, 1000)]);

        let promotions = engine.age(QueueLevel::L3, &mut queues, &mut table, Tick(1600));

        assert_eq!(promotions.len(), 1);
        assert!(!promotions[0].migrated());
        assert_eq!(queues.queue(QueueLevel::L3).ids(), [2, 1]);
    }

    #[test]
    fn test_ceiling_restamps_without_promotion() {
        let engine = AgingEngine::default();
        let (mut queues, mut table) = setup(&[(1, 149, 0)]);

        let promotions = engine.age(QueueLevel::L1, &mut queues, &mut table, Tick(5000));

        assert!(promotions.is_empty());
        assert_eq!(table.get(1).unwrap().aging_timestamp(), Tick(1500));
        assert_eq!(table.get(1).unwrap().priority(), Priority::MAX);
    }

    #[test]
    fn test_one_promotion_per_pass_keeps_credit() {
        let engine = AgingEngine::default();
        let (mut queues, mut table) = setup(&[(1, 0, 0)]);

        engine.age(QueueLevel::L3, &mut queues, &mut table, Tick(4000));
        assert_eq!(table.get(1).unwrap().priority().value(), 10);
        // 4000 - 1500 = 2500 > 1500: still overdue on the next pass
        engine.age(QueueLevel::L3, &mut queues, &mut table, Tick(4000));
        assert_eq!(table.get(1).unwrap().priority().value(), 20);
        assert_eq!(table.get(1).unwrap().aging_timestamp(), Tick(3000));
        engine.age(QueueLevel::L3, &mut queues, &mut table, Tick(4000));
        assert_eq!(table.get(1).unwrap().priority().value(), 20);
    }
}
