// worker thread stuff
use super::pool::{Queues, Shared};
use super::task::{enter, Job};
use crate::error::TaskError;
use parking_lot::MutexGuard;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
    pub idle_time_ns: AtomicU64,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            idle_time_ns: AtomicU64::new(0),
        }
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub state: Arc<WorkerState>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: Arc::new(WorkerState::new()),
        }
    }

    // main loop
    pub fn run(&self, shared: Arc<Shared>) {
        debug!(worker = self.id, "worker started");
        let mut queues = shared.queues.lock();

        while !queues.shutdown {
            promote(&mut queues, shared.clock.now());

            if let Some(job) = queues.ready.pop_front() {
                MutexGuard::unlocked(&mut queues, || self.dispatch(&shared, job));
                continue;
            }

            // nothing to do, sleep until work arrives or the nearest deadline
            let idle_start = Instant::now();
            match queues.timers.next_deadline() {
                Some(at) => {
                    shared.work_available.wait_until(&mut queues, at);
                }
                None => shared.work_available.wait(&mut queues),
            }
            let idle_ns = u64::try_from(idle_start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.state.idle_time_ns.fetch_add(idle_ns, Ordering::Relaxed);
        }

        queues.exited += 1;
        if queues.exited == shared.num_threads {
            shared.workers_exited.notify_all();
        }
        debug!(worker = self.id, "worker stopped");
    }

    fn dispatch(&self, shared: &Shared, job: Arc<dyn Job>) {
        let task = job.task();

        if task.upstream_canceled() {
            if task.cancel() {
                debug!(task = %task.id(), "canceled: a dependency was canceled");
            }
            return;
        }

        if !task.begin() {
            trace!(task = %task.id(), state = ?task.state(), "skipping finished task");
            return;
        }

        let start = Instant::now();
        let outcome = match shared
            .panic_handler
            .execute(|| enter(task.id(), || job.run()))
        {
            Ok(result) => result,
            Err(info) => Err(TaskError::Panicked(info.message)),
        };
        shared.metrics.record_run(start.elapsed());

        match &outcome {
            Ok(()) => shared.metrics.record_completed(),
            Err(err) => {
                warn!(task = %task.id(), error = %err, "task failed");
                shared.metrics.record_failed();
            }
        }

        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
        task.finish(outcome);
    }
}

/// Moves everything that became runnable into the ready queue, keeping
/// deadline order for timers and submission order for blocked tasks.
fn promote(queues: &mut Queues, now: Instant) {
    if !queues.timers.is_empty() {
        for job in queues.timers.pop_expired(now) {
            trace!(task = %job.task().id(), "deadline elapsed");
            job.task().fire_timer();
            queues.ready.push_back(job);
        }
        let released = queues.timers.extract_if(|job| job.task().is_runnable());
        queues.ready.extend(released);
    }

    if queues.blocked.iter().any(|job| job.task().is_runnable()) {
        let (released, blocked): (Vec<_>, Vec<_>) = mem::take(&mut queues.blocked)
            .into_iter()
            .partition(|job| job.task().is_runnable());
        trace!(count = released.len(), "promoting blocked tasks");
        queues.blocked = blocked;
        queues.ready.extend(released);
    }
}
