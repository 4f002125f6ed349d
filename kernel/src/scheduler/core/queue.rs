//! Ready queues (L1/L2/L3)
//!
//! Each queue is an ordered map keyed by `(rank, seq)`:
//! - L1: rank = burst estimate at insertion (shortest first)
//! - L2: rank = `PRIORITY_MAX - priority` (highest priority first)
//! - L3: rank = 0 (pure FIFO)
//!
//! `seq` is a scheduler-wide insertion counter, so equal ranks keep
//! insertion order. A side index maps each queued thread to its key for
//! O(log n) removal during band migration.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashMap;

use crate::scheduler::thread::{QueueLevel, Thread, ThreadId, PRIORITY_MAX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct QueueKey {
    rank: u64,
    seq: u64,
}

/// One ready queue
pub struct ReadyQueue {
    level: QueueLevel,
    entries: BTreeMap<QueueKey, ThreadId>,
    index: HashMap<ThreadId, QueueKey>,
}

impl ReadyQueue {
    pub fn new(level: QueueLevel) -> Self {
        Self {
            level,
            entries: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn level(&self) -> QueueLevel {
        self.level
    }

    fn insert(&mut self, id: ThreadId, key: QueueKey) {
        self.entries.insert(key, id);
        self.index.insert(id, key);
    }

    fn remove(&mut self, id: ThreadId) -> bool {
        match self.index.remove(&id) {
            Some(key) => {
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }

    fn pop_front(&mut self) -> Option<ThreadId> {
        let (_, id) = self.entries.pop_first()?;
        self.index.remove(&id);
        Some(id)
    }

    /// Thread that would be selected next
    pub fn front(&self) -> Option<ThreadId> {
        self.entries.values().next().copied()
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued threads in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.entries.values().copied()
    }

    /// Snapshot of `iter()`
    pub fn ids(&self) -> Vec<ThreadId> {
        self.iter().collect()
    }
}

impl fmt::Display for ReadyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [", self.level)?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "]")
    }
}

/// The three ready queues
pub struct ReadyQueues {
    queues: [ReadyQueue; 3],
    next_seq: u64,
}

impl ReadyQueues {
    pub fn new() -> Self {
        Self {
            queues: [
                ReadyQueue::new(QueueLevel::L1),
                ReadyQueue::new(QueueLevel::L2),
                ReadyQueue::new(QueueLevel::L3),
            ],
            next_seq: 0,
        }
    }

    /// Ordering rank of `thread` in the queue of its current band
    pub fn rank_of(thread: &Thread) -> u64 {
        match thread.priority().level() {
            QueueLevel::L1 => thread.burst_estimate(),
            QueueLevel::L2 => u64::from(PRIORITY_MAX - thread.priority().value()),
            QueueLevel::L3 => 0,
        }
    }

    /// Insert `thread` into the queue of its band, returning that band.
    ///
    /// The thread must not already be queued.
    pub fn insert(&mut self, thread: &Thread) -> QueueLevel {
        let id = thread.id();
        crate::sched_assert!(
            self.level_of(id).is_none(),
            "thread {} queued twice",
            id
        );

        let level = thread.priority().level();
        let key = QueueKey {
            rank: Self::rank_of(thread),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queues[level.index()].insert(id, key);
        level
    }

    /// Remove `id` from whichever queue holds it
    pub fn remove(&mut self, id: ThreadId) -> Option<QueueLevel> {
        self.queues
            .iter_mut()
            .find_map(|queue| queue.remove(id).then_some(queue.level))
    }

    /// Head of the first non-empty queue, in L1, L2, L3 precedence
    pub fn pop_next(&mut self) -> Option<(ThreadId, QueueLevel)> {
        self.queues
            .iter_mut()
            .find_map(|queue| queue.pop_front().map(|id| (id, queue.level)))
    }

    pub fn queue(&self, level: QueueLevel) -> &ReadyQueue {
        &self.queues[level.index()]
    }

    /// Queue currently holding `id`
    pub fn level_of(&self, id: ThreadId) -> Option<QueueLevel> {
        self.queues
            .iter()
            .find(|queue| queue.contains(id))
            .map(|queue| queue.level)
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(ReadyQueue::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(ReadyQueue::is_empty)
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReadyQueues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, queue) in self.queues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", queue)?;
        }
        Ok(())
    }
}
