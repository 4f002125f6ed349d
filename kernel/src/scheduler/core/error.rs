//! Scheduler Error Handling
//!
//! Two tiers:
//! - `sched_assert!` for invariant breaches by the surrounding kernel
//!   (interrupts enabled on entry, double finish, stack overflow). These
//!   are fatal: the kernel panic handler halts.
//! - `SchedulerError` for recoverable failures at the registry boundary.

use core::fmt;

use crate::scheduler::thread::{ThreadId, ThreadStatus};

/// Scheduler error types with detailed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    // ═══════════════════════════════════════════════════════════════
    // Thread Registry Errors
    // ═══════════════════════════════════════════════════════════════

    /// Thread not found in the registry
    ThreadNotFound { thread_id: ThreadId },

    /// Thread already registered (duplicate ID)
    ThreadAlreadyExists { thread_id: ThreadId },

    // ═══════════════════════════════════════════════════════════════
    // Thread State Errors
    // ═══════════════════════════════════════════════════════════════

    /// Invalid thread state transition
    InvalidStateTransition {
        thread_id: ThreadId,
        from: ThreadStatus,
        to: ThreadStatus,
    },

    // ═══════════════════════════════════════════════════════════════
    // Priority Errors
    // ═══════════════════════════════════════════════════════════════

    /// Priority outside [0, 149]
    InvalidPriority { value: u32, min: u32, max: u32 },

    // ═══════════════════════════════════════════════════════════════
    // Dispatch Errors
    // ═══════════════════════════════════════════════════════════════

    /// No running thread (scheduler not bootstrapped)
    NoCurrentThread,

    /// Every queue is empty and no interrupt can make a thread ready
    NothingToRun,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadNotFound { thread_id } => {
                write!(f, "Thread {} not found", thread_id)
            }
            Self::ThreadAlreadyExists { thread_id } => {
                write!(f, "Thread {} already registered", thread_id)
            }
            Self::InvalidStateTransition { thread_id, from, to } => {
                write!(f, "Thread {}: invalid transition {} -> {}", thread_id, from, to)
            }
            Self::InvalidPriority { value, min, max } => {
                write!(f, "Priority {} outside [{}, {}]", value, min, max)
            }
            Self::NoCurrentThread => write!(f, "No running thread"),
            Self::NothingToRun => write!(f, "No ready thread and nothing pending"),
        }
    }
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ThreadNotFound { .. } => "Thread may have already been destroyed",
            Self::ThreadAlreadyExists { .. } => "Allocate IDs through the thread table",
            Self::InvalidStateTransition { .. } => "Check thread lifecycle management",
            Self::InvalidPriority { .. } => "Clamp priority to [0, 149]",
            Self::NoCurrentThread => "Bootstrap the boot thread before dispatching",
            Self::NothingToRun => "Machine is idle with no pending interrupts; halt",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NoCurrentThread | Self::NothingToRun)
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::NothingToRun => 3,
            Self::NoCurrentThread => 2,
            Self::InvalidStateTransition { .. } => 1,
            _ => 0,
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Log a scheduler error with its recovery hint and pass it through
#[macro_export]
macro_rules! sched_error {
    ($err:expr) => {{
        let err = $err;
        ::log::error!(target: "sched", "[SCHED] Error: {} (hint: {})", err, err.recovery_hint());
        err
    }};
}

/// Fatal scheduler invariant check
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $($reason:tt)+) => {
        if !$cond {
            panic!("[SCHED CRITICAL] Invariant violated: {}", format_args!($($reason)+));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_hints() {
        let err = SchedulerError::InvalidPriority { value: 150, min: 0, max: 149 };
        assert_eq!(alloc::format!("{}", err), "Priority 150 outside [0, 149]");
        assert!(err.is_recoverable());
        assert!(!SchedulerError::NothingToRun.is_recoverable());
        assert_eq!(SchedulerError::NothingToRun.severity(), 3);
    }

    #[test]
    #[should_panic(expected = "[SCHED CRITICAL] Invariant violated: slot busy (thread 7)")]
    fn test_sched_assert_panics() {
        sched_assert!(1 + 1 == 3, "slot busy (thread {})", 7);
    }
}
