//! State - Thread state machine
//!
//! Manages thread lifecycle and state transitions

use core::fmt;

/// Thread status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    /// Registered, never made runnable
    JustCreated,

    /// Currently running on the CPU
    Running,

    /// In exactly one ready queue
    Ready,

    /// Waiting for an event (semaphore, I/O, join)
    Blocked,

    /// Finished; control block released after the next handoff
    Finishing,
}

impl ThreadStatus {
    /// Check if state is schedulable
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::JustCreated => write!(f, "JustCreated"),
            Self::Running => write!(f, "Running"),
            Self::Ready => write!(f, "Ready"),
            Self::Blocked => write!(f, "Blocked"),
            Self::Finishing => write!(f, "Finishing"),
        }
    }
}

/// Validate state transition
pub fn validate_transition(from: ThreadStatus, to: ThreadStatus) -> bool {
    use ThreadStatus::*;

    match (from, to) {
        // JustCreated -> Ready (first admission)
        (JustCreated, Ready) => true,

        // JustCreated -> Running (boot thread)
        (JustCreated, Running) => true,

        // Ready -> Running (dispatch)
        (Ready, Running) => true,

        // Running -> Ready (yield / preemption)
        (Running, Ready) => true,

        // Running -> Blocked
        (Running, Blocked) => true,

        // Running -> Finishing
        (Running, Finishing) => true,

        // Blocked -> Ready (wake-up)
        (Blocked, Ready) => true,

        // All other transitions invalid
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use ThreadStatus::*;
        assert!(validate_transition(JustCreated, Ready));
        assert!(validate_transition(Ready, Running));
        assert!(validate_transition(Running, Finishing));
        assert!(validate_transition(Blocked, Ready));
        assert!(!validate_transition(Finishing, Ready));
        assert!(!validate_transition(Ready, Blocked));
        assert!(!validate_transition(Blocked, Running));
    }
}
