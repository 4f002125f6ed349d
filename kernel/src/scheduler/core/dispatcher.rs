//! Dispatcher - CPU handoff around the context switch
//!
//! Owns the scheduler behind a spinlock and the low-level switch
//! primitive. The lock is never held across `switch`: the outgoing
//! thread prepares the handoff, releases the lock, switches, and the
//! resumed side re-acquires it to finish (reclaim + user state).

use spin::Mutex;

use super::error::{SchedulerError, SchedulerResult};
use super::scheduler::Scheduler;
use crate::arch::{ContextSwitch, Platform};
use crate::scheduler::thread::{ThreadId, ThreadStatus};

/// Scheduler plus context-switch primitive
pub struct Dispatcher<P: Platform, S: ContextSwitch> {
    scheduler: Mutex<Scheduler<P>>,
    switcher: S,
    /// Handle used to idle without holding the scheduler lock
    idle: P,
}

impl<P: Platform + Clone, S: ContextSwitch> Dispatcher<P, S> {
    pub fn new(scheduler: Scheduler<P>, switcher: S) -> Self {
        let idle = scheduler.platform().clone();
        Self {
            scheduler: Mutex::new(scheduler),
            switcher,
            idle,
        }
    }

    /// Run `f` with exclusive access to the scheduler
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&mut Scheduler<P>) -> R) -> R {
        f(&mut self.scheduler.lock())
    }

    /// `Run(next, finishing)`: hand the CPU to `next`.
    ///
    /// Returns once the calling thread is resumed by a later dispatch.
    pub fn run(&self, next: ThreadId, finishing: bool) -> SchedulerResult<()> {
        let handoff = self.scheduler.lock().prepare_run(next, finishing)?;

        // SAFETY: both contexts live in boxed control blocks owned by the
        // scheduler (the outgoing one possibly by its reaper). Neither is
        // released before `complete_run` runs on another thread, and
        // interrupts are off by `prepare_run`'s precondition.
        unsafe { self.switcher.switch(handoff.old_ctx, handoff.new_ctx) };

        self.scheduler.lock().complete_run(handoff.old)
    }

    /// Give up the CPU if another thread is ready.
    ///
    /// Returns `false` when nothing else was runnable (the caller keeps
    /// running).
    pub fn yield_now(&self) -> SchedulerResult<bool> {
        let next = {
            let mut sched = self.scheduler.lock();
            let current = sched.current().ok_or(SchedulerError::NoCurrentThread)?;
            let status = sched.thread(current)?.status();
            if status != ThreadStatus::Running {
                return Err(SchedulerError::InvalidStateTransition {
                    thread_id: current,
                    from: status,
                    to: ThreadStatus::Ready,
                });
            }
            match sched.find_next_to_run() {
                Some(next) => {
                    sched.ready_to_run(current)?;
                    next
                }
                None => return Ok(false),
            }
        };

        self.run(next, false)?;
        Ok(true)
    }

    /// Block the running thread (or finish it) and dispatch a successor,
    /// idling the machine until one becomes ready.
    ///
    /// If the machine runs out of pending work first, the caller is put
    /// back to RUNNING before `NothingToRun` is returned.
    pub fn sleep(&self, finishing: bool) -> SchedulerResult<()> {
        self.scheduler.lock().suspend_current(finishing)?;

        let next = loop {
            if let Some(next) = self.scheduler.lock().find_next_to_run() {
                break next;
            }
            if !self.idle.idle() {
                self.scheduler.lock().resume_current()?;
                return Err(crate::sched_error!(SchedulerError::NothingToRun));
            }
        };

        self.run(next, finishing)
    }

    /// Terminate the running thread; its control block is released after
    /// the next thread resumes.
    pub fn finish(&self) -> SchedulerResult<()> {
        self.sleep(true)
    }

    /// Unblock `id`
    pub fn wake(&self, id: ThreadId) -> SchedulerResult<()> {
        let mut sched = self.scheduler.lock();
        let status = sched.thread(id)?.status();
        if status != ThreadStatus::Blocked {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: id,
                from: status,
                to: ThreadStatus::Ready,
            });
        }
        sched.ready_to_run(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimMachine;
    use crate::scheduler::config::SchedulerConfig;
    use crate::scheduler::thread::{Priority, Thread};
    use crate::time::{Tick, TickSource};

    fn dispatcher() -> (Dispatcher<SimMachine, SimMachine>, SimMachine) {
        let machine = SimMachine::new();
        let mut sched = Scheduler::new(machine.clone(), SchedulerConfig::new());
        sched.add_thread(Thread::new(1, "main", Priority::MIN)).unwrap();
        sched.bootstrap(1).unwrap();
        (Dispatcher::new(sched, machine.clone()), machine)
    }

    fn spawn(dispatcher: &Dispatcher<SimMachine, SimMachine>, priority: u32) -> ThreadId {
        dispatcher.with_scheduler(|s| s.spawn("worker", priority)).unwrap()
    }

    #[test]
    fn test_yield_without_competition() {
        let (dispatcher, machine) = dispatcher();
        assert_eq!(dispatcher.yield_now(), Ok(false));
        assert!(machine.switches().is_empty());
    }

    #[test]
    fn test_yield_hands_over_and_requeues() {
        let (dispatcher, machine) = dispatcher();
        let worker = spawn(&dispatcher, 60);

        assert_eq!(dispatcher.yield_now(), Ok(true));

        let expected_rsp = dispatcher.with_scheduler(|s| s.thread(worker).unwrap().context().rsp);
        assert_eq!(machine.switches(), [expected_rsp]);
        dispatcher.with_scheduler(|s| {
            assert_eq!(s.current(), Some(worker));
            assert_eq!(s.thread(1).unwrap().status(), ThreadStatus::Ready);
            assert_eq!(s.queue_of(1), Some(crate::scheduler::thread::QueueLevel::L3));
        });
    }

    #[test]
    fn test_sleep_then_wake() {
        let (dispatcher, _) = dispatcher();
        let worker = spawn(&dispatcher, 30);

        dispatcher.sleep(false).unwrap();
        dispatcher.with_scheduler(|s| {
            assert_eq!(s.current(), Some(worker));
            assert_eq!(s.thread(1).unwrap().status(), ThreadStatus::Blocked);
        });

        dispatcher.wake(1).unwrap();
        assert_eq!(dispatcher.with_scheduler(|s| s.queue_of(1)), Some(crate::scheduler::thread::QueueLevel::L3));
        assert!(matches!(
            dispatcher.wake(1),
            Err(SchedulerError::InvalidStateTransition { thread_id: 1, .. })
        ));
    }

    #[test]
    fn test_sleep_idles_until_nothing_pending() {
        let (dispatcher, machine) = dispatcher();
        machine.schedule_interrupt(Tick(500));

        assert_eq!(dispatcher.sleep(false), Err(SchedulerError::NothingToRun));
        // Idled through the pending interrupt before giving up
        assert_eq!(machine.now(), Tick(500));
    }

    #[test]
    fn test_idle_failure_keeps_caller_running() {
        let (dispatcher, _) = dispatcher();

        assert_eq!(dispatcher.sleep(false), Err(SchedulerError::NothingToRun));
        dispatcher.with_scheduler(|s| {
            assert_eq!(s.current(), Some(1));
            assert_eq!(s.thread(1).unwrap().status(), ThreadStatus::Running);
        });

        // Still running, so it cannot be woken into a ready queue
        assert!(matches!(
            dispatcher.wake(1),
            Err(SchedulerError::InvalidStateTransition { from: ThreadStatus::Running, .. })
        ));
        assert_eq!(dispatcher.with_scheduler(|s| s.queue_of(1)), None);

        let worker = spawn(&dispatcher, 20);
        assert_eq!(dispatcher.yield_now(), Ok(true));
        dispatcher.with_scheduler(|s| {
            assert_eq!(s.current(), Some(worker));
            assert_eq!(s.thread(1).unwrap().status(), ThreadStatus::Ready);
            assert_eq!(s.queue_of(1), Some(crate::scheduler::thread::QueueLevel::L3));
        });
    }

    #[test]
    fn test_yield_from_suspended_thread_leaves_queues_alone() {
        let (dispatcher, _) = dispatcher();
        let worker = spawn(&dispatcher, 20);
        dispatcher.with_scheduler(|s| s.suspend_current(false)).unwrap();

        assert_eq!(
            dispatcher.yield_now(),
            Err(SchedulerError::InvalidStateTransition {
                thread_id: 1,
                from: ThreadStatus::Blocked,
                to: ThreadStatus::Ready,
            })
        );
        assert_eq!(
            dispatcher.with_scheduler(|s| s.queue_of(worker)),
            Some(crate::scheduler::thread::QueueLevel::L3)
        );
    }

    #[test]
    #[should_panic(expected = "thread 1 resumed while pending destruction")]
    fn test_finished_thread_never_resumes() {
        // The simulated switch returns at once, as if the finished thread
        // had been resumed: that must be caught.
        let (dispatcher, _) = dispatcher();
        spawn(&dispatcher, 30);
        let _ = dispatcher.finish();
    }
}
