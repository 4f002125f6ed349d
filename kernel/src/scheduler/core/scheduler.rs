//! Scheduler Core - 3-Queue MLFQ with aging and burst prediction
//!
//! L1 [100,149] shortest estimated burst first (preemptive on admission),
//! L2 [50,99] highest priority first, L3 [0,49] FIFO with round robin.
//!
//! # Features
//! - Admission with preemption requests at the next interrupt return
//! - Aging over all three queues before every selection
//! - EMA burst prediction updated when a thread leaves L1
//! - Dispatch split in two halves around the context switch
//! - Deferred reclamation of the finishing thread
//! - Structured trace of every queue and dispatch event
//!
//! Every entry point requires interrupts to be disabled; calling one with
//! interrupts enabled is a fatal invariant breach.

use alloc::vec::Vec;

use super::aging::{AgingEngine, Promotion};
use super::error::{SchedulerError, SchedulerResult};
use super::queue::ReadyQueues;
use super::reaper::Reaper;
use super::statistics::SchedulerStats;
use crate::arch::Platform;
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::prediction::burst_estimate;
use crate::scheduler::thread::{
    validate_transition, Priority, QueueLevel, Thread, ThreadContext, ThreadId, ThreadStatus,
    ThreadTable, DEFAULT_KERNEL_STACK_SIZE, L1_MIN_PRIORITY,
};
use crate::scheduler::trace::{EventKind, SchedEvent, TraceLog};
use crate::time::Tick;

/// Both halves of a CPU handoff, as needed by the context-switch primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Outgoing thread
    pub old: ThreadId,
    /// Incoming thread
    pub new: ThreadId,
    /// Where the outgoing registers are saved
    pub old_ctx: *mut ThreadContext,
    /// Registers the incoming thread resumes with
    pub new_ctx: *const ThreadContext,
}

/// Scheduler state
///
/// Owns the thread registry, the three ready queues and the
/// pending-destruction slot. Not internally synchronized: the
/// `Dispatcher` wraps it in a lock, and interrupts are off around
/// every call.
pub struct Scheduler<P: Platform> {
    /// Interrupt controller, clock, round-robin timer and user registers
    platform: P,

    config: SchedulerConfig,
    aging: AgingEngine,

    /// All threads registry
    threads: ThreadTable,

    /// Ready queues (L1/L2/L3)
    queues: ReadyQueues,

    /// Currently running thread
    current: Option<ThreadId>,

    /// Finished thread awaiting reclamation
    reaper: Reaper,

    trace: TraceLog,
    stats: SchedulerStats,
}

impl<P: Platform> Scheduler<P> {
    /// Create a new scheduler
    pub fn new(platform: P, config: SchedulerConfig) -> Self {
        Self {
            platform,
            config,
            aging: AgingEngine::from_config(&config),
            threads: ThreadTable::new(),
            queues: ReadyQueues::new(),
            current: None,
            reaper: Reaper::new(),
            trace: TraceLog::new(config.trace, config.event_capacity),
            stats: SchedulerStats::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Registry
    // ═══════════════════════════════════════════════════════════════

    /// Register a thread (status JUST_CREATED, not yet runnable)
    pub fn add_thread(&mut self, thread: Thread) -> SchedulerResult<ThreadId> {
        let id = self.threads.insert(thread)?;
        log::debug!(target: "sched", "[SPAWN] Registered thread {} (total: {})", id, self.threads.len());
        Ok(id)
    }

    /// Spawn a kernel thread with a default-size stack and make it ready
    pub fn spawn(&mut self, name: &str, priority: u32) -> SchedulerResult<ThreadId> {
        let priority = Priority::new(priority)?;
        let id = self.threads.alloc_id();
        self.add_thread(Thread::new_kernel(id, name, priority, DEFAULT_KERNEL_STACK_SIZE))?;
        self.ready_to_run(id)?;
        Ok(id)
    }

    /// Make a registered JUST_CREATED thread the running thread without a
    /// handoff (the boot thread already owns the CPU).
    pub fn bootstrap(&mut self, id: ThreadId) -> SchedulerResult<()> {
        let from = self.threads.get(id)?.status();
        if self.current.is_some() || from != ThreadStatus::JustCreated {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: id,
                from,
                to: ThreadStatus::Running,
            });
        }
        self.transition(id, ThreadStatus::Running)?;
        self.current = Some(id);
        log::info!(target: "sched", "Thread {} bootstrapped as running thread", id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Admission
    // ═══════════════════════════════════════════════════════════════

    /// Make `id` eligible for scheduling.
    ///
    /// Stamps it with the current tick, marks it READY and inserts it
    /// into the queue of its band. An L1 arrival whose burst estimate is
    /// strictly smaller than that of a running L1 thread requests a
    /// preemption at the next interrupt return; no switch happens here.
    pub fn ready_to_run(&mut self, id: ThreadId) -> SchedulerResult<()> {
        self.assert_interrupts_off("ReadyToRun");
        let now = self.platform.now();

        self.transition(id, ThreadStatus::Ready)?;
        let thread = self.threads.get_mut(id)?;
        thread.set_aging_timestamp(now);
        let estimate = thread.burst_estimate();
        let level = self.queues.insert(thread);

        self.stats.record_admission();
        self.record(now, id, EventKind::Inserted(level));

        if level == QueueLevel::L1 && self.should_preempt(id, estimate) {
            self.platform.yield_on_return();
            self.stats.record_preemption();
            self.record(now, id, EventKind::PreemptRequested);
        }
        Ok(())
    }

    /// Running thread in the L1 band with a strictly longer estimate
    fn should_preempt(&self, arriving: ThreadId, estimate: u64) -> bool {
        let current = match self.current.and_then(|id| self.threads.get(id).ok()) {
            Some(current) if current.id() != arriving => current,
            _ => return false,
        };
        current.priority().value() >= L1_MIN_PRIORITY && estimate < current.burst_estimate()
    }

    // ═══════════════════════════════════════════════════════════════
    // Selection
    // ═══════════════════════════════════════════════════════════════

    /// Age all three queues, then take the head of the first non-empty
    /// one (L1, L2, L3).
    ///
    /// Round robin is enabled only for an L3 pick. A thread leaving L1
    /// folds its last burst into its prediction; every pick clears the
    /// burst counter. `None` leaves the queues (and the round-robin mode)
    /// untouched.
    pub fn find_next_to_run(&mut self) -> Option<ThreadId> {
        self.assert_interrupts_off("FindNextToRun");
        let now = self.platform.now();

        for level in QueueLevel::ALL {
            let promotions = self.aging.age(level, &mut self.queues, &mut self.threads, now);
            for promotion in promotions {
                self.record_promotion(now, &promotion);
            }
        }

        let (id, level) = match self.queues.pop_next() {
            Some(pick) => pick,
            None => {
                self.stats.record_pick(None);
                return None;
            }
        };

        self.platform.set_round_robin(level == QueueLevel::L3);
        let thread = self.thread_in_queue(id);
        if level == QueueLevel::L1 {
            let predicted = burst_estimate(thread.predicted_burst(), thread.last_burst_ticks());
            thread.set_predicted_burst(predicted);
        }
        thread.set_last_burst_ticks(0);

        self.stats.record_pick(Some(level));
        self.record(now, id, EventKind::Removed(level));
        Some(id)
    }

    fn record_promotion(&mut self, now: Tick, promotion: &Promotion) {
        self.record(
            now,
            promotion.thread,
            EventKind::PriorityChanged {
                from: promotion.from,
                to: promotion.to,
            },
        );
        if promotion.migrated() {
            self.record(now, promotion.thread, EventKind::Removed(promotion.from_level));
            self.record(now, promotion.thread, EventKind::Inserted(promotion.to_level));
        }
        self.stats.record_promotion(promotion.migrated());
    }

    // ═══════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════

    /// First half of `Run(next, finishing)`: everything up to the switch.
    ///
    /// Stages the running thread for destruction when `finishing`, saves
    /// its user state, checks its stack and makes `next` the running
    /// thread. The returned context pointers point into boxed control
    /// blocks and stay valid until the staged thread is reclaimed.
    pub fn prepare_run(&mut self, next: ThreadId, finishing: bool) -> SchedulerResult<Handoff> {
        self.assert_interrupts_off("Run");
        let now = self.platform.now();
        let old = self.current.ok_or(SchedulerError::NoCurrentThread)?;
        crate::sched_assert!(old != next, "thread {} dispatched onto itself", old);
        crate::sched_assert!(
            self.queues.level_of(next).is_none(),
            "thread {} dispatched while still queued",
            next
        );

        {
            let (outgoing, incoming) = self.threads.get_pair_mut(old, next)?;
            if !incoming.status().is_schedulable() {
                return Err(SchedulerError::InvalidStateTransition {
                    thread_id: next,
                    from: incoming.status(),
                    to: ThreadStatus::Running,
                });
            }

            if finishing {
                outgoing.set_status(ThreadStatus::Finishing);
            }
            outgoing.save_user_state(&self.platform);
            outgoing.check_overflow();

            let executed = outgoing.last_burst_ticks();
            outgoing.record_burst();
            incoming.set_status(ThreadStatus::Running);
            self.current = Some(next);

            self.record(now, next, EventKind::Selected);
            self.record(now, old, EventKind::Replaced { executed });
        }

        if finishing {
            let thread = self
                .threads
                .remove(old)
                .ok_or(SchedulerError::ThreadNotFound { thread_id: old })?;
            self.reaper.stage(thread);
        }

        let old_ctx = match self.reaper.pending_mut() {
            Some(staged) if finishing => staged.context_ptr(),
            _ => self.threads.get_mut(old)?.context_ptr(),
        };
        // Staged or not, the outgoing block stays boxed until reclaimed
        let new_ctx = self.threads.get_mut(next)?.context_ptr() as *const ThreadContext;

        self.stats.record_switch();
        Ok(Handoff {
            old,
            new: next,
            old_ctx,
            new_ctx,
        })
    }

    /// Second half of `Run`: `resumed` is executing again.
    ///
    /// Reclaims the thread staged by this or an intervening dispatch and
    /// restores the resumed thread's user state. Resuming the staged
    /// thread itself is fatal: its stack is about to be released.
    pub fn complete_run(&mut self, resumed: ThreadId) -> SchedulerResult<()> {
        self.assert_interrupts_off("Run");
        crate::sched_assert!(
            self.reaper.pending() != Some(resumed),
            "thread {} resumed while pending destruction",
            resumed
        );

        self.check_to_be_destroyed();
        self.threads.get_mut(resumed)?.restore_user_state(&self.platform);
        Ok(())
    }

    /// Release the thread pending destruction, if any
    pub fn check_to_be_destroyed(&mut self) -> Option<ThreadId> {
        self.assert_interrupts_off("CheckToBeDestroyed");
        let id = self.reaper.reclaim()?;
        let now = self.platform.now();
        self.stats.record_reclaim();
        self.record(now, id, EventKind::Destroyed);
        Some(id)
    }

    /// Mark the running thread BLOCKED (or FINISHING) ahead of a handoff
    pub fn suspend_current(&mut self, finishing: bool) -> SchedulerResult<ThreadId> {
        self.assert_interrupts_off("Sleep");
        let id = self.current.ok_or(SchedulerError::NoCurrentThread)?;
        let status = if finishing {
            ThreadStatus::Finishing
        } else {
            ThreadStatus::Blocked
        };
        self.transition(id, status)?;
        Ok(id)
    }

    /// Undo `suspend_current` when no successor could be dispatched: the
    /// running thread keeps the CPU.
    pub fn resume_current(&mut self) -> SchedulerResult<ThreadId> {
        self.assert_interrupts_off("Sleep");
        let id = self.current.ok_or(SchedulerError::NoCurrentThread)?;
        let thread = self.threads.get_mut(id)?;
        match thread.status() {
            ThreadStatus::Blocked | ThreadStatus::Finishing => {
                thread.set_status(ThreadStatus::Running);
                Ok(id)
            }
            ThreadStatus::Running => Ok(id),
            from => Err(SchedulerError::InvalidStateTransition {
                thread_id: id,
                from,
                to: ThreadStatus::Running,
            }),
        }
    }

    /// Charge elapsed CPU time to the running thread's current burst
    pub fn charge_running(&mut self, ticks: u64) {
        self.assert_interrupts_off("ChargeRunning");
        if let Some(thread) = self.current.and_then(|id| self.threads.get_mut(id).ok()) {
            thread.add_burst_ticks(ticks);
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Diagnostics
    // ═══════════════════════════════════════════════════════════════

    /// Dump the ready queues in dispatch order
    pub fn print(&self) {
        log::info!(target: "sched", "Ready queues at tick {}:", self.platform.now());
        for level in QueueLevel::ALL {
            log::info!(target: "sched", "  {}", self.queues.queue(level));
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    pub fn thread(&self, id: ThreadId) -> SchedulerResult<&Thread> {
        self.threads.get(id)
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> SchedulerResult<&mut Thread> {
        self.threads.get_mut(id)
    }

    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    pub fn queues(&self) -> &ReadyQueues {
        &self.queues
    }

    /// Queue currently holding `id`
    pub fn queue_of(&self, id: ThreadId) -> Option<QueueLevel> {
        self.queues.level_of(id)
    }

    /// Thread pending destruction
    pub fn pending_destruction(&self) -> Option<ThreadId> {
        self.reaper.pending()
    }

    pub fn last_reclaimed(&self) -> Option<ThreadId> {
        self.reaper.last_reclaimed()
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Take every retained event
    pub fn take_events(&mut self) -> Vec<SchedEvent> {
        self.trace.drain()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    // ═══════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════

    fn assert_interrupts_off(&self, op: &str) {
        crate::sched_assert!(
            self.platform.interrupts_disabled(),
            "{} called with interrupts enabled",
            op
        );
    }

    fn transition(&mut self, id: ThreadId, to: ThreadStatus) -> SchedulerResult<()> {
        let thread = self.threads.get_mut(id)?;
        let from = thread.status();
        if !validate_transition(from, to) {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: id,
                from,
                to,
            });
        }
        thread.set_status(to);
        Ok(())
    }

    /// Queued threads are always registered
    fn thread_in_queue(&mut self, id: ThreadId) -> &mut Thread {
        match self.threads.get_mut(id) {
            Ok(thread) => thread,
            Err(_) => panic!("[SCHED CRITICAL] Invariant violated: queued thread {} not registered", id),
        }
    }

    fn record(&mut self, tick: Tick, thread: ThreadId, kind: EventKind) {
        self.trace.record(SchedEvent::new(tick, thread, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimMachine;
    use crate::arch::IntLevel;

    fn scheduler() -> (Scheduler<SimMachine>, SimMachine) {
        let machine = SimMachine::new();
        (Scheduler::new(machine.clone(), SchedulerConfig::new()), machine)
    }

    fn add(sched: &mut Scheduler<SimMachine>, id: ThreadId, priority: u32) -> ThreadId {
        let thread = Thread::new_kernel(id, "t", Priority::new(priority).unwrap(), 1024);
        sched.add_thread(thread).unwrap()
    }

    fn booted() -> (Scheduler<SimMachine>, SimMachine) {
        let (mut sched, machine) = scheduler();
        sched.add_thread(Thread::new(1, "main", Priority::MIN)).unwrap();
        sched.bootstrap(1).unwrap();
        (sched, machine)
    }

    #[test]
    fn test_admission_stamps_and_marks_ready() {
        let (mut sched, machine) = scheduler();
        machine.advance(77);
        add(&mut sched, 5, 60);
        sched.ready_to_run(5).unwrap();

        let thread = sched.thread(5).unwrap();
        assert_eq!(thread.status(), ThreadStatus::Ready);
        assert_eq!(thread.aging_timestamp(), Tick(77));
        assert_eq!(sched.queue_of(5), Some(QueueLevel::L2));
        assert_eq!(sched.stats().admissions, 1);
    }

    #[test]
    fn test_double_admission_rejected() {
        let (mut sched, _) = scheduler();
        add(&mut sched, 5, 60);
        sched.ready_to_run(5).unwrap();
        assert_eq!(
            sched.ready_to_run(5),
            Err(SchedulerError::InvalidStateTransition {
                thread_id: 5,
                from: ThreadStatus::Ready,
                to: ThreadStatus::Ready,
            })
        );
        assert_eq!(
            sched.ready_to_run(9),
            Err(SchedulerError::ThreadNotFound { thread_id: 9 })
        );
    }

    #[test]
    fn test_l1_pick_updates_prediction() {
        let (mut sched, machine) = scheduler();
        let thread = Thread::new(2, "sjf", Priority::new(120).unwrap()).with_predicted_burst(40);
        sched.add_thread(thread).unwrap();
        sched.thread_mut(2).unwrap().add_burst_ticks(20);
        sched.ready_to_run(2).unwrap();

        assert_eq!(sched.find_next_to_run(), Some(2));
        let thread = sched.thread(2).unwrap();
        assert_eq!(thread.predicted_burst(), 30);
        assert_eq!(thread.last_burst_ticks(), 0);
        assert!(!machine.round_robin());
    }

    #[test]
    fn test_l2_pick_keeps_prediction() {
        let (mut sched, _) = scheduler();
        let thread = Thread::new(2, "mid", Priority::new(70).unwrap()).with_predicted_burst(40);
        sched.add_thread(thread).unwrap();
        sched.thread_mut(2).unwrap().add_burst_ticks(20);
        sched.ready_to_run(2).unwrap();

        assert_eq!(sched.find_next_to_run(), Some(2));
        let thread = sched.thread(2).unwrap();
        assert_eq!(thread.predicted_burst(), 40);
        assert_eq!(thread.last_burst_ticks(), 0);
    }

    #[test]
    fn test_round_robin_only_for_l3() {
        let (mut sched, machine) = scheduler();
        add(&mut sched, 2, 10);
        add(&mut sched, 3, 110);
        sched.ready_to_run(2).unwrap();
        sched.ready_to_run(3).unwrap();

        assert_eq!(sched.find_next_to_run(), Some(3));
        assert!(!machine.round_robin());
        assert_eq!(sched.find_next_to_run(), Some(2));
        assert!(machine.round_robin());
        // Empty selection leaves the mode alone
        assert_eq!(sched.find_next_to_run(), None);
        assert!(machine.round_robin());
        assert_eq!(sched.stats().idle_picks, 1);
    }

    #[test]
    fn test_preemption_requires_running_l1() {
        let (mut sched, machine) = booted();
        // Boot thread runs at priority 0: no preemption request
        add(&mut sched, 2, 120);
        sched.ready_to_run(2).unwrap();
        assert!(!machine.yield_requested());
    }

    #[test]
    fn test_charge_running() {
        let (mut sched, _) = booted();
        sched.charge_running(12);
        sched.charge_running(3);
        assert_eq!(sched.thread(1).unwrap().last_burst_ticks(), 15);
    }

    #[test]
    fn test_prepare_run_switches_current() {
        let (mut sched, _) = booted();
        add(&mut sched, 2, 60);
        sched.ready_to_run(2).unwrap();
        sched.charge_running(7);
        sched.suspend_current(false).unwrap();
        let next = sched.find_next_to_run().unwrap();

        let handoff = sched.prepare_run(next, false).unwrap();
        assert_eq!(sched.thread(1).unwrap().history().max_ticks, 7);
        assert_eq!((handoff.old, handoff.new), (1, 2));
        assert_eq!(sched.current(), Some(2));
        assert_eq!(sched.thread(2).unwrap().status(), ThreadStatus::Running);
        assert_eq!(sched.thread(1).unwrap().status(), ThreadStatus::Blocked);
        assert_eq!(sched.stats().total_switches, 1);
    }

    #[test]
    fn test_prepare_run_rejects_unready_thread() {
        let (mut sched, _) = booted();
        add(&mut sched, 2, 60);
        assert!(matches!(
            sched.prepare_run(2, false),
            Err(SchedulerError::InvalidStateTransition { thread_id: 2, .. })
        ));
    }

    #[test]
    fn test_prepare_run_without_boot_thread() {
        let (mut sched, _) = scheduler();
        add(&mut sched, 2, 60);
        sched.ready_to_run(2).unwrap();
        assert_eq!(sched.prepare_run(2, false), Err(SchedulerError::NoCurrentThread));
    }

    #[test]
    #[should_panic(expected = "FindNextToRun called with interrupts enabled")]
    fn test_selection_with_interrupts_on_is_fatal() {
        let (mut sched, machine) = scheduler();
        machine.set_level(IntLevel::On);
        sched.find_next_to_run();
    }

    #[test]
    #[should_panic(expected = "CheckToBeDestroyed called with interrupts enabled")]
    fn test_reclaim_with_interrupts_on_is_fatal() {
        let (mut sched, machine) = booted();
        machine.set_level(IntLevel::On);
        sched.check_to_be_destroyed();
    }

    #[test]
    #[should_panic(expected = "ChargeRunning called with interrupts enabled")]
    fn test_charge_with_interrupts_on_is_fatal() {
        let (mut sched, machine) = booted();
        machine.set_level(IntLevel::On);
        sched.charge_running(1);
    }

    #[test]
    #[should_panic(expected = "thread 2 dispatched while still queued")]
    fn test_prepare_run_of_queued_thread_is_fatal() {
        let (mut sched, _) = booted();
        add(&mut sched, 2, 60);
        sched.ready_to_run(2).unwrap();
        let _ = sched.prepare_run(2, false);
    }

    #[test]
    fn test_resume_current_undoes_suspend() {
        let (mut sched, _) = booted();
        sched.suspend_current(true).unwrap();
        assert_eq!(sched.resume_current(), Ok(1));
        assert_eq!(sched.thread(1).unwrap().status(), ThreadStatus::Running);
        assert_eq!(sched.current(), Some(1));
        assert_eq!(sched.queue_of(1), None);
    }

    #[test]
    #[should_panic(expected = "stack overflow in thread 2")]
    fn test_overflowed_outgoing_thread_is_fatal() {
        let (mut sched, _) = scheduler();
        add(&mut sched, 2, 60);
        add(&mut sched, 3, 60);
        sched.bootstrap(2).unwrap();
        sched.ready_to_run(3).unwrap();
        sched.thread_mut(2).unwrap().stack_mut().unwrap().clobber_fencepost();
        let next = sched.find_next_to_run().unwrap();
        let _ = sched.prepare_run(next, false);
    }
}
