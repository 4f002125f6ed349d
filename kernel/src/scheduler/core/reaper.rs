//! Deferred destruction of finished threads
//!
//! A finishing thread is still running on its own stack when it hands
//! the CPU over, so its control block cannot be released until some
//! other thread has resumed. The reaper holds exactly one such thread
//! between the handoff and the next resumption.

use alloc::boxed::Box;

use crate::scheduler::thread::{Thread, ThreadId};

/// Single-slot pending-destruction state machine
#[derive(Debug, Default)]
pub enum Reaper {
    /// Nothing staged, nothing reclaimed yet
    #[default]
    Empty,
    /// Finished thread waiting for the next resumption
    Pending(Box<Thread>),
    /// Slot free again; `last` was the most recent thread released
    Reclaimed { last: ThreadId },
}

impl Reaper {
    pub const fn new() -> Self {
        Reaper::Empty
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Reaper::Pending(_))
    }

    /// Thread currently awaiting destruction
    pub fn pending(&self) -> Option<ThreadId> {
        match self {
            Reaper::Pending(thread) => Some(thread.id()),
            _ => None,
        }
    }

    pub(crate) fn pending_mut(&mut self) -> Option<&mut Thread> {
        match self {
            Reaper::Pending(thread) => Some(thread),
            _ => None,
        }
    }

    pub fn last_reclaimed(&self) -> Option<ThreadId> {
        match self {
            Reaper::Reclaimed { last } => Some(*last),
            _ => None,
        }
    }

    /// Take ownership of a finishing thread.
    ///
    /// Fatal if another thread is still pending: its destruction must
    /// complete first.
    pub fn stage(&mut self, thread: Box<Thread>) {
        if let Reaper::Pending(pending) = self {
            panic!(
                "[SCHED CRITICAL] Invariant violated: thread {} finishing while thread {} is pending destruction",
                thread.id(),
                pending.id()
            );
        }
        *self = Reaper::Pending(thread);
    }

    /// Release the pending thread, if any
    pub fn reclaim(&mut self) -> Option<ThreadId> {
        match core::mem::take(self) {
            Reaper::Pending(thread) => {
                let id = (*thread).destroy();
                *self = Reaper::Reclaimed { last: id };
                Some(id)
            }
            previous => {
                *self = previous;
                None
            }
        }
    }
}
