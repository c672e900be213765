use super::panic_handler::PanicHandler;
use super::task::{Job, Placement};
use super::timer::TimerQueue;
use super::worker::{Worker, WorkerId, WorkerState};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Work-selection structures, all guarded by the executor lock.
pub(crate) struct Queues {
    pub(crate) ready: VecDeque<Arc<dyn Job>>,
    pub(crate) blocked: Vec<Arc<dyn Job>>,
    pub(crate) timers: TimerQueue<Arc<dyn Job>>,
    pub(crate) shutdown: bool,
    pub(crate) exited: usize,
}

/// State shared between the executor handle, its workers and the tasks
/// submitted to it.
pub(crate) struct Shared {
    pub(crate) queues: Mutex<Queues>,
    pub(crate) work_available: Condvar,
    pub(crate) workers_exited: Condvar,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) metrics: Metrics,
    pub(crate) num_threads: usize,
}

impl Shared {
    /// Wakes every idle worker so it rescans the blocked and timer queues.
    pub(crate) fn wake(&self) {
        let _queues = self.queues.lock();
        self.work_available.notify_all();
    }
}

/// Number of tasks parked in each work-selection structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub ready: usize,
    pub blocked: usize,
    pub timed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.ready + self.blocked + self.timed
    }
}

/// Fixed-size thread pool that runs [`Job`]s once their dependencies,
/// triggers or deadlines allow.
pub struct Executor {
    shared: Arc<Shared>,
    workers: Vec<WorkerHandle>,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    state: Arc<WorkerState>,
}

impl Executor {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues {
                ready: VecDeque::new(),
                blocked: Vec::new(),
                timers: TimerQueue::new(),
                shutdown: false,
                exited: 0,
            }),
            work_available: Condvar::new(),
            workers_exited: Condvar::new(),
            clock: config.clock.clone(),
            panic_handler: PanicHandler::new(config.panic_strategy),
            metrics: Metrics::new(),
            num_threads,
        });

        let mut executor = Self {
            shared,
            workers: Vec::with_capacity(num_threads),
        };

        for id in 0..num_threads {
            let worker = Worker::new(id);
            let state = worker.state.clone();
            let shared = executor.shared.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            // on failure, Drop stops the workers spawned so far
            let thread = builder
                .spawn(move || worker.run(shared))
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

            executor.workers.push(WorkerHandle {
                id,
                thread: Some(thread),
                state,
            });
        }

        info!(num_threads, "executor started");
        Ok(executor)
    }

    /// Executor with `num_threads` workers and default settings otherwise.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let config = Config::builder().num_threads(num_threads).build()?;
        Self::new(&config)
    }

    /// Hands a task to the scheduler.
    ///
    /// The task goes to the ready queue when nothing holds it back, to the
    /// timer queue when it waits for a future deadline, and to the blocked
    /// list otherwise. Once shutdown started the task is canceled instead.
    ///
    /// # Panics
    ///
    /// When the same task is submitted twice.
    pub fn submit<J: Job>(&self, job: Arc<J>) {
        self.submit_job(job);
    }

    pub fn submit_job(&self, job: Arc<dyn Job>) {
        let task = job.task();
        let mut queues = self.shared.queues.lock();
        if queues.shutdown {
            drop(queues);
            debug!(task = %task.id(), "submitted after shutdown, canceling");
            task.cancel();
            return;
        }

        task.attach(&self.shared);
        self.shared.metrics.record_submitted();
        match task.placement(self.shared.clock.now()) {
            Placement::Finished => {
                debug!(task = %task.id(), state = ?task.state(), "submitted finished task, ignoring");
            }
            Placement::Ready => {
                debug!(task = %task.id(), "submitted as ready");
                queues.ready.push_back(job);
                self.shared.work_available.notify_one();
            }
            Placement::Timer(at) => {
                debug!(task = %task.id(), "submitted with deadline");
                queues.timers.push(at, job);
                // a sleeping worker may need a shorter timeout
                self.shared.work_available.notify_one();
            }
            Placement::Blocked => {
                debug!(task = %task.id(), "submitted as blocked");
                queues.blocked.push(job);
            }
        }
    }

    /// Stops accepting work and cancels everything still queued.
    ///
    /// Running bodies are not interrupted. Idempotent.
    pub fn start_shutdown(&self) {
        let drained: Vec<Arc<dyn Job>> = {
            let mut queues = self.shared.queues.lock();
            if queues.shutdown {
                return;
            }
            queues.shutdown = true;

            let mut drained: Vec<Arc<dyn Job>> = queues.ready.drain(..).collect();
            drained.extend(queues.timers.drain());
            drained.extend(queues.blocked.drain(..));
            self.shared.work_available.notify_all();
            drained
        };

        info!(queued = drained.len(), "shutdown started");
        for job in drained {
            job.task().cancel();
        }
    }

    /// Blocks until every worker has left its loop. Only returns after
    /// [`start_shutdown`](Self::start_shutdown) was called.
    pub fn wait_shutdown(&self) {
        let mut queues = self.shared.queues.lock();
        while queues.exited < self.shared.num_threads {
            self.shared.workers_exited.wait(&mut queues);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.queues.lock().shutdown
    }

    pub fn num_threads(&self) -> usize {
        self.shared.num_threads
    }

    pub fn queue_counts(&self) -> QueueCounts {
        let queues = self.shared.queues.lock();
        QueueCounts {
            ready: queues.ready.len(),
            blocked: queues.blocked.len(),
            timed: queues.timers.len(),
        }
    }

    /// Tasks queued but not yet picked up by a worker.
    pub fn pending_tasks(&self) -> usize {
        self.queue_counts().total()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Bodies executed by each worker, indexed by worker id.
    pub fn worker_task_counts(&self) -> Vec<u64> {
        self.workers
            .iter()
            .map(|w| w.state.tasks_executed.load(Ordering::Relaxed))
            .collect()
    }

    /// Total time workers spent parked waiting for work.
    pub fn idle_time(&self) -> Duration {
        let nanos = self
            .workers
            .iter()
            .map(|w| w.state.idle_time_ns.load(Ordering::Relaxed))
            .fold(0u64, u64::saturating_add);
        Duration::from_nanos(nanos)
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("num_threads", &self.shared.num_threads)
            .field("queues", &self.queue_counts())
            .finish()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.start_shutdown();

        let current = thread::current().id();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                // dropped from inside one of our own tasks; that worker
                // exits on its own
                if thread.thread().id() == current {
                    continue;
                }
                if thread.join().is_err() {
                    tracing::error!(worker = worker.id, "worker thread panicked");
                }
            }
        }
    }
}
