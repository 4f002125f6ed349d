//! Simulated uniprocessor
//!
//! Deterministic machine used on the host: an atomic tick counter, an
//! interrupt level, the yield-on-return and round-robin flags, a user
//! register file and a log of context switches.
//!
//! Clones share state, so a test can keep one handle while the
//! scheduler owns another.

use super::{ContextSwitch, IntLevel, InterruptController, RoundRobinTimer, UserMachine, UserRegisters};
use crate::scheduler::thread::ThreadContext;
use crate::time::{Tick, TickCounter, TickSource};
use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

#[derive(Debug)]
struct SimState {
    clock: TickCounter,
    interrupts_off: AtomicBool,
    yield_pending: AtomicBool,
    round_robin: AtomicBool,
    user_regs: Mutex<UserRegisters>,
    /// Ticks at which a device interrupt is pending
    pending: Mutex<BTreeSet<Tick>>,
    /// `rsp` of every context switched to, in order
    switches: Mutex<Vec<u64>>,
}

/// Simulated machine
#[derive(Debug, Clone)]
pub struct SimMachine {
    state: Arc<SimState>,
}

impl SimMachine {
    /// New machine at tick 0 with interrupts disabled
    pub fn new() -> Self {
        Self {
            state: Arc::new(SimState {
                clock: TickCounter::new(),
                interrupts_off: AtomicBool::new(true),
                yield_pending: AtomicBool::new(false),
                round_robin: AtomicBool::new(false),
                user_regs: Mutex::new(UserRegisters::empty()),
                pending: Mutex::new(BTreeSet::new()),
                switches: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_level(&self, level: IntLevel) {
        self.state
            .interrupts_off
            .store(level == IntLevel::Off, Ordering::SeqCst);
    }

    /// Timer tick(s)
    pub fn advance(&self, ticks: u64) -> Tick {
        self.state.clock.advance(ticks)
    }

    pub fn set_now(&self, tick: Tick) {
        self.state.clock.set(tick);
    }

    /// Whether a preemption was requested (does not clear the flag)
    pub fn yield_requested(&self) -> bool {
        self.state.yield_pending.load(Ordering::SeqCst)
    }

    /// Consume the yield-on-return flag, as the interrupt-return path does
    pub fn take_yield_request(&self) -> bool {
        self.state.yield_pending.swap(false, Ordering::SeqCst)
    }

    pub fn round_robin(&self) -> bool {
        self.state.round_robin.load(Ordering::SeqCst)
    }

    /// Raise a device interrupt at `at`; `idle()` fast-forwards to it
    pub fn schedule_interrupt(&self, at: Tick) {
        self.state.pending.lock().insert(at);
    }

    /// Load the CPU user register file (what a user program left there)
    pub fn load_user_registers(&self, regs: UserRegisters) {
        *self.state.user_regs.lock() = regs;
    }

    pub fn user_registers(&self) -> UserRegisters {
        *self.state.user_regs.lock()
    }

    /// `rsp` of every context switched to so far
    pub fn switches(&self) -> Vec<u64> {
        self.state.switches.lock().clone()
    }
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SimMachine {
    fn now(&self) -> Tick {
        self.state.clock.now()
    }
}

impl InterruptController for SimMachine {
    fn level(&self) -> IntLevel {
        if self.state.interrupts_off.load(Ordering::SeqCst) {
            IntLevel::Off
        } else {
            IntLevel::On
        }
    }

    fn yield_on_return(&self) {
        self.state.yield_pending.store(true, Ordering::SeqCst);
    }

    fn idle(&self) -> bool {
        let next = {
            let mut pending = self.state.pending.lock();
            let first = pending.iter().next().copied();
            if let Some(at) = first {
                pending.remove(&at);
            }
            first
        };
        match next {
            Some(at) => {
                self.state.clock.set(at);
                true
            }
            None => false,
        }
    }
}

impl RoundRobinTimer for SimMachine {
    fn set_round_robin(&self, enabled: bool) {
        self.state.round_robin.store(enabled, Ordering::SeqCst);
    }
}

impl UserMachine for SimMachine {
    fn save_user_registers(&self, into: &mut UserRegisters) {
        *into = *self.state.user_regs.lock();
    }

    fn restore_user_registers(&self, from: &UserRegisters) {
        *self.state.user_regs.lock() = *from;
    }
}

impl ContextSwitch for SimMachine {
    /// Records the handoff and returns at once, as if `old` had been
    /// switched back to immediately.
    unsafe fn switch(&self, _old: *mut ThreadContext, new: *const ThreadContext) {
        // SAFETY: caller guarantees `new` is valid for reads.
        let rsp = unsafe { (*new).rsp };
        self.state.switches.lock().push(rsp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let machine = SimMachine::new();
        let handle = machine.clone();
        machine.advance(42);
        machine.yield_on_return();
        assert_eq!(handle.now(), Tick(42));
        assert!(handle.take_yield_request());
        assert!(!machine.yield_requested());
    }

    #[test]
    fn test_idle_fast_forwards_to_pending_interrupt() {
        let machine = SimMachine::new();
        machine.schedule_interrupt(Tick(300));
        machine.schedule_interrupt(Tick(100));
        assert!(machine.idle());
        assert_eq!(machine.now(), Tick(100));
        assert!(machine.idle());
        assert_eq!(machine.now(), Tick(300));
        assert!(!machine.idle());
    }

    #[test]
    fn test_starts_with_interrupts_off() {
        let machine = SimMachine::new();
        assert!(machine.interrupts_disabled());
        machine.set_level(IntLevel::On);
        assert!(!machine.interrupts_disabled());
    }
}
