//! Scheduler subsystem
//!
//! Multilevel feedback queue scheduler for a single CPU: three ready
//! queues (shortest-burst-first, priority, round robin), priority aging
//! and deferred reclamation of finished threads.

pub mod config;
pub mod core;
pub mod prediction;
pub mod thread;
pub mod trace;

// Re-exports
pub use self::config::{SchedulerConfig, TraceFlags};
pub use self::core::{
    Dispatcher, Handoff, ReadyQueues, Scheduler, SchedulerError, SchedulerResult, SchedulerStats,
};
pub use self::thread::{
    AddressSpace, Priority, QueueLevel, Thread, ThreadContext, ThreadId, ThreadStatus,
};
pub use self::trace::{EventKind, SchedEvent, TraceLog};
