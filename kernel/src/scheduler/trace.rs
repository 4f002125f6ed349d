//! Scheduler diagnostic events
//!
//! Every queue insertion/removal, aging promotion and dispatch decision
//! is recorded as a `SchedEvent` tagged with the tick and thread ID. The
//! log keeps the last `capacity` events for inspection and forwards each
//! one to the `log` facade under the `sched` target.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;

use super::config::TraceFlags;
use super::thread::{Priority, QueueLevel, ThreadId};
use crate::time::Tick;

/// What happened to a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Entered a ready queue
    Inserted(QueueLevel),
    /// Left a ready queue (selected, or migrated by aging)
    Removed(QueueLevel),
    /// Aged
    PriorityChanged { from: Priority, to: Priority },
    /// Picked for the next dispatch
    Selected,
    /// Switched out after running `executed` ticks
    Replaced { executed: u64 },
    /// Admission asked the running thread to yield
    PreemptRequested,
    /// Control block released
    Destroyed,
}

impl EventKind {
    /// Trace class this event belongs to
    pub const fn flag(&self) -> TraceFlags {
        match self {
            EventKind::Inserted(_) | EventKind::Removed(_) => TraceFlags::QUEUE,
            EventKind::PriorityChanged { .. } => TraceFlags::AGING,
            EventKind::Selected | EventKind::Replaced { .. } => TraceFlags::DISPATCH,
            EventKind::PreemptRequested => TraceFlags::PREEMPT,
            EventKind::Destroyed => TraceFlags::RECLAIM,
        }
    }
}

/// One diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedEvent {
    pub tick: Tick,
    pub thread: ThreadId,
    pub kind: EventKind,
}

impl SchedEvent {
    pub const fn new(tick: Tick, thread: ThreadId, kind: EventKind) -> Self {
        Self { tick, thread, kind }
    }
}

impl fmt::Display for SchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tick {}: Thread {} ", self.tick, self.thread)?;
        match self.kind {
            EventKind::Inserted(level) => write!(f, "is inserted into queue {}", level),
            EventKind::Removed(level) => write!(f, "is removed from queue {}", level),
            EventKind::PriorityChanged { from, to } => {
                write!(f, "changes its priority from {} to {}", from, to)
            }
            EventKind::Selected => write!(f, "is now selected for execution"),
            EventKind::Replaced { executed } => {
                write!(f, "is replaced, and it has executed {} ticks", executed)
            }
            EventKind::PreemptRequested => write!(f, "requests preemption of the running thread"),
            EventKind::Destroyed => write!(f, "is destroyed"),
        }
    }
}

/// Bounded event ring
pub struct TraceLog {
    events: VecDeque<SchedEvent>,
    capacity: usize,
    flags: TraceFlags,
    /// Events evicted because the ring was full
    dropped: u64,
}

impl TraceLog {
    pub fn new(flags: TraceFlags, capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            flags,
            dropped: 0,
        }
    }

    /// Record an event if its class is enabled
    pub fn record(&mut self, event: SchedEvent) {
        if !self.flags.contains(event.kind.flag()) {
            return;
        }

        match event.kind {
            EventKind::Selected | EventKind::Destroyed => {
                log::info!(target: "sched", "{}", event)
            }
            _ => log::debug!(target: "sched", "{}", event),
        }

        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &SchedEvent> + '_ {
        self.events.iter()
    }

    /// Take every retained event, leaving the ring empty
    pub fn drain(&mut self) -> Vec<SchedEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }
}
