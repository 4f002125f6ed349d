//! Thread Structure and Management
//!
//! Thread control block: identity, scheduling attributes, saved kernel
//! context, stack and (for user programs) the user-mode state.

use super::priority::Priority;
use super::stack::Stack;
use super::state::ThreadStatus;
use crate::arch::{UserMachine, UserRegisters};
use crate::scheduler::prediction::{self, BurstHistory};
use crate::time::Tick;
use alloc::boxed::Box;

/// Thread ID type
pub type ThreadId = u64;

/// Saved thread context (callee-saved window; RSP first)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadContext {
    /// Stack pointer (RSP)
    pub rsp: u64,
    /// Instruction pointer (RIP)
    pub rip: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl ThreadContext {
    pub const fn empty() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }
}

/// Per-process address-space state switched along with user threads
pub trait AddressSpace: Send {
    /// Save MMU/TLB state on switch-out
    fn save_state(&mut self);
    /// Reload MMU/TLB state on switch-in
    fn restore_state(&mut self);
}

/// User-mode half of a thread
pub struct UserState {
    /// User register file saved on switch-out
    pub registers: UserRegisters,
    pub space: Box<dyn AddressSpace>,
}

/// Thread Control Block (TCB)
pub struct Thread {
    /// Unique thread ID
    id: ThreadId,

    /// Thread name (for debugging)
    name: Box<str>,

    /// Current state
    status: ThreadStatus,

    /// Priority in [0, 149]
    priority: Priority,

    /// Prediction: smoothed estimate of the next CPU burst (ticks)
    predicted_burst: u64,

    /// Ticks consumed since last dispatched
    last_burst_ticks: u64,

    /// Tick at which the thread entered its queue or was last aged
    aging_timestamp: Tick,

    /// Bursts actually executed (recorded on every switch-out)
    history: BurstHistory,

    /// Saved context (for the context-switch primitive)
    context: ThreadContext,

    /// Kernel stack (`None` for the boot thread, which runs on the boot stack)
    stack: Option<Stack>,

    /// User program state, if this thread runs one
    user: Option<UserState>,
}

impl Thread {
    /// Thread without its own stack (the boot thread)
    pub fn new(id: ThreadId, name: &str, priority: Priority) -> Self {
        Self {
            id,
            name: name.into(),
            status: ThreadStatus::JustCreated,
            priority,
            predicted_burst: 0,
            last_burst_ticks: 0,
            aging_timestamp: Tick::ZERO,
            history: BurstHistory::new(),
            context: ThreadContext::empty(),
            stack: None,
            user: None,
        }
    }

    /// Create a new kernel thread with a `stack_size`-byte stack
    pub fn new_kernel(id: ThreadId, name: &str, priority: Priority, stack_size: usize) -> Self {
        let stack = Stack::new(stack_size);
        let mut thread = Self::new(id, name, priority);
        // 16-byte aligned initial RSP
        thread.context.rsp = stack.top() & !0xf;
        thread.stack = Some(stack);
        thread
    }

    /// Attach a user address space
    pub fn with_user_space(mut self, space: Box<dyn AddressSpace>) -> Self {
        self.user = Some(UserState {
            registers: UserRegisters::empty(),
            space,
        });
        self
    }

    /// Seed the burst prediction
    pub fn with_predicted_burst(mut self, ticks: u64) -> Self {
        self.predicted_burst = ticks;
        self
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ThreadStatus) {
        self.status = status;
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn predicted_burst(&self) -> u64 {
        self.predicted_burst
    }

    pub fn set_predicted_burst(&mut self, ticks: u64) {
        self.predicted_burst = ticks;
    }

    pub fn last_burst_ticks(&self) -> u64 {
        self.last_burst_ticks
    }

    pub fn set_last_burst_ticks(&mut self, ticks: u64) {
        self.last_burst_ticks = ticks;
    }

    /// Charge `ticks` of CPU time to the current burst
    pub fn add_burst_ticks(&mut self, ticks: u64) {
        self.last_burst_ticks = self.last_burst_ticks.saturating_add(ticks);
    }

    pub fn aging_timestamp(&self) -> Tick {
        self.aging_timestamp
    }

    pub fn set_aging_timestamp(&mut self, tick: Tick) {
        self.aging_timestamp = tick;
    }

    pub fn history(&self) -> &BurstHistory {
        &self.history
    }

    /// Close the current burst on switch-out
    pub fn record_burst(&mut self) {
        self.history.record(self.last_burst_ticks);
    }

    /// Estimated remaining burst, the L1 ordering key
    pub fn burst_estimate(&self) -> u64 {
        prediction::burst_estimate(self.predicted_burst, self.last_burst_ticks)
    }

    pub fn context(&self) -> &ThreadContext {
        &self.context
    }

    /// Raw pointer handed to the context-switch primitive
    pub fn context_ptr(&mut self) -> *mut ThreadContext {
        &mut self.context as *mut ThreadContext
    }

    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn stack_mut(&mut self) -> Option<&mut Stack> {
        self.stack.as_mut()
    }

    /// Check if this is a user-space thread
    pub fn is_user_thread(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_state(&self) -> Option<&UserState> {
        self.user.as_ref()
    }

    /// Save the user register file and address-space state
    pub fn save_user_state<M: UserMachine + ?Sized>(&mut self, machine: &M) {
        if let Some(user) = self.user.as_mut() {
            machine.save_user_registers(&mut user.registers);
            user.space.save_state();
        }
    }

    /// Restore the user register file and address-space state
    pub fn restore_user_state<M: UserMachine + ?Sized>(&mut self, machine: &M) {
        if let Some(user) = self.user.as_mut() {
            machine.restore_user_registers(&user.registers);
            user.space.restore_state();
        }
    }

    /// Fatal if the stack fencepost was overwritten
    pub fn check_overflow(&self) {
        if let Some(stack) = &self.stack {
            crate::sched_assert!(
                stack.is_intact(),
                "stack overflow in thread {} ('{}')",
                self.id,
                self.name
            );
        }
    }

    /// Release the control block and its stack.
    ///
    /// Must not be called on the running thread: its stack is live.
    pub fn destroy(self) -> ThreadId {
        crate::sched_assert!(
            self.status != ThreadStatus::Running,
            "destroying running thread {}",
            self.id
        );
        log::debug!(target: "sched", "Deleting thread {} ('{}')", self.id, self.name);
        self.id
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("priority", &self.priority)
            .field("predicted_burst", &self.predicted_burst)
            .field("last_burst_ticks", &self.last_burst_ticks)
            .field("aging_timestamp", &self.aging_timestamp)
            .field("user", &self.user.is_some())
            .finish()
    }
}
