//! Shared fixtures for the scheduler scenario tests

#![allow(dead_code)]

use mlfq_kernel::arch::sim::SimMachine;
use mlfq_kernel::scheduler::trace::{EventKind, SchedEvent};
use mlfq_kernel::{Priority, Scheduler, SchedulerConfig, Thread, ThreadId};

pub type SimScheduler = Scheduler<SimMachine>;

/// Fresh scheduler on a simulated machine (tick 0, interrupts off)
pub fn scheduler() -> (SimScheduler, SimMachine) {
    let machine = SimMachine::new();
    let sched = Scheduler::new(machine.clone(), SchedulerConfig::new());
    (sched, machine)
}

/// Register a boot thread at `priority` and make it the running thread
pub fn boot(sched: &mut SimScheduler, priority: u32) -> ThreadId {
    let id = next_id(sched);
    let thread = Thread::new(id, "main", Priority::new(priority).unwrap());
    sched.add_thread(thread).unwrap();
    sched.bootstrap(id).unwrap();
    id
}

/// Register a thread with explicit burst counters and make it ready
pub fn admit(sched: &mut SimScheduler, priority: u32, predicted: u64, last: u64) -> ThreadId {
    let id = next_id(sched);
    let mut thread = Thread::new_kernel(id, "worker", Priority::new(priority).unwrap(), 4096)
        .with_predicted_burst(predicted);
    thread.set_last_burst_ticks(last);
    sched.add_thread(thread).unwrap();
    sched.ready_to_run(id).unwrap();
    id
}

/// Selection until every queue is empty
pub fn drain(sched: &mut SimScheduler) -> Vec<ThreadId> {
    core::iter::from_fn(|| sched.find_next_to_run()).collect()
}

pub fn events_of(events: &[SchedEvent], thread: ThreadId) -> Vec<EventKind> {
    events
        .iter()
        .filter(|e| e.thread == thread)
        .map(|e| e.kind)
        .collect()
}

fn next_id(sched: &SimScheduler) -> ThreadId {
    sched.threads().ids().last().map_or(1, |id| id + 1)
}
