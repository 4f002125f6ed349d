// src/lib.rs
// Scheduler core library: ready queues, aging, selection and dispatch
// for a single-processor kernel.
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod arch;
pub mod logger;
pub mod scheduler;
pub mod time;

pub use scheduler::{
    Dispatcher, Priority, QueueLevel, Scheduler, SchedulerConfig, SchedulerError,
    SchedulerResult, Thread, ThreadId, ThreadStatus,
};
pub use time::Tick;
