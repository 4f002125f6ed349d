//! Thread management module

pub mod priority;
pub mod stack;
pub mod state;
pub mod table;
pub mod thread;

pub use priority::{Priority, QueueLevel, L1_MIN_PRIORITY, L2_MIN_PRIORITY, PRIORITY_MAX, PRIORITY_MIN};
pub use stack::{Stack, DEFAULT_KERNEL_STACK_SIZE, STACK_FENCEPOST};
pub use state::{validate_transition, ThreadStatus};
pub use table::ThreadTable;
pub use thread::{AddressSpace, Thread, ThreadContext, ThreadId, UserState};
