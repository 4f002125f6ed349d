//! Scheduler core module
//!
//! - `queue`: the three ready queues and their ordering keys
//! - `aging`: starvation guard run before every selection
//! - `scheduler`: admission, selection and the two halves of dispatch
//! - `reaper`: single-slot deferred destruction
//! - `dispatcher`: lock + context switch around the scheduler

pub mod aging;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod reaper;
pub mod scheduler;
pub mod statistics;

pub use aging::{AgingEngine, Promotion};
pub use dispatcher::Dispatcher;
pub use error::{SchedulerError, SchedulerResult};
pub use queue::{ReadyQueue, ReadyQueues};
pub use reaper::Reaper;
pub use scheduler::{Handoff, Scheduler};
pub use statistics::SchedulerStats;
