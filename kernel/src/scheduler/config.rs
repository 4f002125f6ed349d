//! Scheduler configuration
//!
//! Tunables of the aging engine and of the diagnostic trace. Band
//! boundaries are not configurable: they live in `thread::priority`.

use bitflags::bitflags;

/// Ticks a thread may wait in a ready queue before it is aged
pub const DEFAULT_AGING_THRESHOLD: u64 = 1500;

/// Priority gained per aging promotion
pub const DEFAULT_AGING_STEP: u8 = 10;

/// Events retained by the trace log
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

bitflags! {
    /// Diagnostic event classes recorded by the trace log
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraceFlags: u32 {
        /// Queue insertion and removal
        const QUEUE    = 1 << 0;
        /// Priority changes caused by aging
        const AGING    = 1 << 1;
        /// Selection and context handoff
        const DISPATCH = 1 << 2;
        /// Preemption requests from admission
        const PREEMPT  = 1 << 3;
        /// Reclamation of finished threads
        const RECLAIM  = 1 << 4;
    }
}

/// Scheduler tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// A ready thread waiting strictly longer than this is aged
    pub aging_threshold: u64,
    /// Priority added per promotion (result clamped at 149)
    pub aging_step: u8,
    /// Event classes kept in the trace log
    pub trace: TraceFlags,
    /// Ring size of the trace log (0 disables retention, not logging)
    pub event_capacity: usize,
}

impl SchedulerConfig {
    pub const fn new() -> Self {
        Self {
            aging_threshold: DEFAULT_AGING_THRESHOLD,
            aging_step: DEFAULT_AGING_STEP,
            trace: TraceFlags::all(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub const fn with_trace(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }

    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
