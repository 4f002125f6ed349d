// src/arch/mod.rs
// Machine collaborators consumed by the scheduler.
//
// The scheduler never touches interrupt flags, timers or CPU registers
// directly: everything goes through these narrow traits so the same
// core runs on hardware and on the simulated machine (`sim`).

pub mod sim;

use crate::scheduler::thread::ThreadContext;
use crate::time::TickSource;

/// Interrupt level of the (single) CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntLevel {
    /// Interrupts masked: the caller has exclusive access to scheduler state
    Off,
    /// Interrupts delivered
    On,
}

/// Interrupt controller
pub trait InterruptController {
    /// Current interrupt level
    fn level(&self) -> IntLevel;

    /// Ask for a context switch at the next interrupt-return point
    fn yield_on_return(&self);

    /// Nothing is runnable: wait for the next interrupt.
    ///
    /// Returns `false` when no interrupt can ever arrive (the machine
    /// would halt).
    fn idle(&self) -> bool;

    #[inline]
    fn interrupts_disabled(&self) -> bool {
        self.level() == IntLevel::Off
    }
}

/// Time-slice control of the timer subsystem
pub trait RoundRobinTimer {
    /// `true`: preempt the running thread when its slice expires
    fn set_round_robin(&self, enabled: bool);
}

/// Number of user-visible registers saved on a kernel entry
pub const NUM_USER_REGS: usize = 40;

/// Saved user-mode register file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRegisters {
    pub regs: [u64; NUM_USER_REGS],
}

impl UserRegisters {
    pub const fn empty() -> Self {
        Self {
            regs: [0; NUM_USER_REGS],
        }
    }
}

impl Default for UserRegisters {
    fn default() -> Self {
        Self::empty()
    }
}

/// Access to the CPU's user-mode register file
pub trait UserMachine {
    fn save_user_registers(&self, into: &mut UserRegisters);
    fn restore_user_registers(&self, from: &UserRegisters);
}

/// Everything the scheduler core needs from the machine
pub trait Platform: InterruptController + TickSource + RoundRobinTimer + UserMachine {}

impl<T> Platform for T where T: InterruptController + TickSource + RoundRobinTimer + UserMachine {}

/// Low-level register/stack switch
pub trait ContextSwitch {
    /// Save the running context into `old` and resume `new`.
    ///
    /// Returns only once some later dispatch switches back to `old`.
    ///
    /// # Safety
    /// - `old` must be valid for writes, `new` valid for reads
    /// - both must stay allocated until the switch completes
    /// - interrupts must be disabled
    unsafe fn switch(&self, old: *mut ThreadContext, new: *const ThreadContext);
}
