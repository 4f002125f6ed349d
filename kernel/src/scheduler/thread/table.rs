//! Thread registry
//!
//! Owns every live control block. Ready queues and the dispatcher refer
//! to threads by `ThreadId`; the only thread ever taken out of the table
//! is the one handed to the reaper for destruction.

use super::thread::{Thread, ThreadId};
use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Registry of live threads
pub struct ThreadTable {
    threads: HashMap<ThreadId, Box<Thread>>,
    next_id: ThreadId,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            threads: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate a fresh thread ID
    pub fn alloc_id(&mut self) -> ThreadId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a thread
    pub fn insert(&mut self, thread: Thread) -> SchedulerResult<ThreadId> {
        let id = thread.id();
        if self.threads.contains_key(&id) {
            return Err(SchedulerError::ThreadAlreadyExists { thread_id: id });
        }
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        self.threads.insert(id, Box::new(thread));
        Ok(id)
    }

    /// Take a thread out of the registry (ownership moves to the caller)
    pub fn remove(&mut self, id: ThreadId) -> Option<Box<Thread>> {
        self.threads.remove(&id)
    }

    pub fn get(&self, id: ThreadId) -> SchedulerResult<&Thread> {
        self.threads
            .get(&id)
            .map(|t| &**t)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: id })
    }

    pub fn get_mut(&mut self, id: ThreadId) -> SchedulerResult<&mut Thread> {
        self.threads
            .get_mut(&id)
            .map(|t| &mut **t)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: id })
    }

    /// Two distinct threads at once (outgoing / incoming of a handoff)
    pub fn get_pair_mut(
        &mut self,
        a: ThreadId,
        b: ThreadId,
    ) -> SchedulerResult<(&mut Thread, &mut Thread)> {
        let missing = if self.threads.contains_key(&a) { b } else { a };
        match self.threads.get_many_mut([&a, &b]) {
            Some([x, y]) => Ok((&mut **x, &mut **y)),
            None => Err(SchedulerError::ThreadNotFound { thread_id: missing }),
        }
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Registered IDs in ascending order
    pub fn ids(&self) -> Vec<ThreadId> {
        let mut ids: Vec<ThreadId> = self.threads.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}
