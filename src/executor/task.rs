//! Task state machine and dependency/trigger adjacency.
//!
//! A task sits in one of five states held in a single atomic word. Blocked
//! vs ready is not a state of its own: it is derived from the adjacency
//! record, since a task can be released by a dependency countdown, a
//! trigger or its deadline, whichever happens first.
//!
//! Edges point from notifier to listener: a task strongly holds the tasks
//! waiting on it until it settles, and never holds the tasks it waits on.

use super::pool::Shared;
use crate::error::TaskError;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cell::Cell;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
}

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    /// Not started; blocked or ready depending on its edges.
    Idle = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Canceled = 4,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Idle,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Failed,
            _ => TaskState::Canceled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }
}

/// Anything the executor can schedule.
///
/// Implementors embed a [`Task`] and expose it through `task()`; `run()` is
/// the body, invoked at most once by a worker thread. Returning `Err` marks
/// the task failed with that cause.
pub trait Job: Send + Sync + 'static {
    fn task(&self) -> &Task;

    fn run(&self) -> Result<(), TaskError>;
}

/// Edge wiring on shared job handles.
///
/// Edges must be added before the listener (`self`) is submitted.
///
/// A notifier holds its listeners strongly until it settles. A listener
/// whose body captures its own notifiers, like a `when_first` aggregate,
/// forms a cycle that is only broken once the listener runs; dropping such
/// a graph without ever submitting it leaks it.
pub trait Edges {
    /// `self` may not run before `other` reaches a terminal state.
    fn add_dependency<O: Job + ?Sized>(&self, other: &Arc<O>);

    /// `self` becomes runnable as soon as `other` (or any other trigger)
    /// reaches a terminal state.
    fn add_trigger<O: Job + ?Sized>(&self, other: &Arc<O>);
}

impl<J: Job> Edges for Arc<J> {
    fn add_dependency<O: Job + ?Sized>(&self, other: &Arc<O>) {
        let listener: Arc<dyn Job> = self.clone();
        link_dependency(listener, other.task());
    }

    fn add_trigger<O: Job + ?Sized>(&self, other: &Arc<O>) {
        let listener: Arc<dyn Job> = self.clone();
        link_trigger(listener, other.task());
    }
}

/// Where `submit` should put a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Ready,
    Timer(Instant),
    Blocked,
    Finished,
}

#[derive(Default)]
struct Links {
    /// Dependencies that have not settled yet.
    pending: usize,
    /// Had a live dependency, a live trigger or a deadline at some point.
    gated: bool,
    /// Set once by a dependency countdown reaching zero, a trigger or the
    /// deadline elapsing.
    released: bool,
    triggered_by: Option<TaskId>,
    upstream_canceled: bool,
    deadline: Option<Instant>,
    dependents: Vec<Arc<dyn Job>>,
    listeners: Vec<Arc<dyn Job>>,
    scheduler: Option<Weak<Shared>>,
    submitted: bool,
    error: Option<TaskError>,
    finished_at: Option<Instant>,
}

impl Links {
    fn runnable(&self) -> bool {
        self.released || !self.gated
    }

    fn scheduler(&self) -> Option<Arc<Shared>> {
        self.scheduler.as_ref().and_then(Weak::upgrade)
    }
}

/// The schedulable core shared by every [`Job`].
pub struct Task {
    id: TaskId,
    state: AtomicU8,
    links: Mutex<Links>,
    done: Condvar,
}

impl Task {
    pub fn new() -> Self {
        Self {
            id: TaskId::next(),
            state: AtomicU8::new(TaskState::Idle as u8),
            links: Mutex::new(Links::default()),
            done: Condvar::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The body returned without error.
    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// The body returned an error or panicked.
    pub fn is_failed(&self) -> bool {
        self.state() == TaskState::Failed
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == TaskState::Canceled
    }

    /// Completed, failed or canceled.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn error(&self) -> Option<TaskError> {
        self.links.lock().error.clone()
    }

    /// The trigger that released this task first, if any.
    pub fn triggered_by(&self) -> Option<TaskId> {
        self.links.lock().triggered_by
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.links.lock().finished_at
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.links.lock().deadline
    }

    /// Makes the task runnable once `at` has passed, independent of its
    /// dependencies.
    pub fn set_time_trigger(&self, at: Instant) {
        let mut links = self.links.lock();
        links.gated = true;
        links.released = false;
        links.deadline = Some(at);
    }

    /// Blocks the calling thread until the task reaches a terminal state.
    ///
    /// # Panics
    ///
    /// When called from inside this task's own body.
    pub fn wait(&self) {
        self.assert_not_current();
        let mut links = self.links.lock();
        while !self.is_finished() {
            self.done.wait(&mut links);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns
    /// whether the task finished.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.assert_not_current();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut links = self.links.lock();
        while !self.is_finished() {
            if self.done.wait_until(&mut links, deadline).timed_out() {
                return self.is_finished();
            }
        }
        true
    }

    /// Cancels the task unless it already started. Returns `true` if this
    /// call performed the cancellation.
    ///
    /// Dependents see the dependency as satisfied but inherit the
    /// cancellation when dispatched; trigger-listeners are released.
    pub fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(
                TaskState::Idle as u8,
                TaskState::Canceled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            self.settle(TaskState::Canceled, None);
        }
        won
    }

    fn assert_not_current(&self) {
        let current = CURRENT_TASK.with(Cell::get);
        assert!(
            current != Some(self.id),
            "task {} waited on itself from its own body",
            self.id
        );
    }

    /// Claims the task for execution.
    pub(crate) fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                TaskState::Idle as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish(&self, outcome: Result<(), TaskError>) {
        debug_assert_eq!(self.state(), TaskState::Running);
        match outcome {
            Ok(()) => self.settle(TaskState::Completed, None),
            Err(err) => self.settle(TaskState::Failed, Some(err)),
        }
    }

    pub(crate) fn upstream_canceled(&self) -> bool {
        self.links.lock().upstream_canceled
    }

    /// Ready to be picked up, or finished and only waiting to be dropped
    /// from a queue.
    pub(crate) fn is_runnable(&self) -> bool {
        self.is_finished() || self.links.lock().runnable()
    }

    pub(crate) fn attach(&self, shared: &Arc<Shared>) {
        let mut links = self.links.lock();
        assert!(!links.submitted, "task {} submitted twice", self.id);
        links.submitted = true;
        links.scheduler = Some(Arc::downgrade(shared));
    }

    pub(crate) fn placement(&self, now: Instant) -> Placement {
        let mut links = self.links.lock();
        if self.is_finished() {
            return Placement::Finished;
        }
        if links.runnable() {
            return Placement::Ready;
        }
        match links.deadline {
            Some(at) if at <= now => {
                links.released = true;
                Placement::Ready
            }
            Some(at) => Placement::Timer(at),
            None => Placement::Blocked,
        }
    }

    pub(crate) fn fire_timer(&self) {
        self.links.lock().released = true;
    }

    /// Records the terminal state and propagates it to every listener.
    fn settle(&self, terminal: TaskState, error: Option<TaskError>) {
        let (dependents, listeners, own) = {
            let mut links = self.links.lock();
            let own = links.scheduler();
            links.finished_at = Some(own.as_ref().map_or_else(Instant::now, |s| s.clock.now()));
            links.error = error;
            if terminal != TaskState::Canceled {
                self.state.store(terminal as u8, Ordering::Release);
            }
            let dependents = mem::take(&mut links.dependents);
            let listeners = mem::take(&mut links.listeners);
            self.done.notify_all();
            (dependents, listeners, own)
        };

        let mut wake: Vec<Arc<Shared>> = Vec::new();
        let mut note = |shared: Option<Arc<Shared>>| {
            if let Some(shared) = shared {
                if !wake.iter().any(|known| Arc::ptr_eq(known, &shared)) {
                    wake.push(shared);
                }
            }
        };

        if terminal == TaskState::Canceled {
            if let Some(own) = &own {
                own.metrics.record_canceled();
            }
            // it may still sit in a queue; let a worker drop it
            note(own);
        }
        for listener in &listeners {
            note(listener.task().fire_trigger(self.id));
        }
        let canceled = terminal == TaskState::Canceled;
        for dependent in &dependents {
            note(dependent.task().release_dependency(canceled));
        }

        for shared in wake {
            shared.wake();
        }
    }

    fn fire_trigger(&self, by: TaskId) -> Option<Arc<Shared>> {
        let mut links = self.links.lock();
        links.released = true;
        links.triggered_by.get_or_insert(by);
        links.scheduler()
    }

    fn release_dependency(&self, canceled: bool) -> Option<Arc<Shared>> {
        let mut links = self.links.lock();
        let Some(pending) = links.pending.checked_sub(1) else {
            panic!("dependency count underflow on task {}", self.id);
        };
        links.pending = pending;
        if canceled {
            links.upstream_canceled = true;
        }
        if pending == 0 {
            links.released = true;
        }
        links.scheduler()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // unlink unshared listeners one by one so long chains do not
        // drop recursively
        let links = self.links.get_mut();
        let mut orphans = mem::take(&mut links.dependents);
        orphans.append(&mut links.listeners);
        while let Some(mut job) = orphans.pop() {
            if Arc::get_mut(&mut job).is_some() {
                let mut links = job.task().links.lock();
                orphans.append(&mut links.dependents);
                orphans.append(&mut links.listeners);
            }
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Runs `f` with `id` recorded as the task executing on this thread.
pub(crate) fn enter<R>(id: TaskId, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<TaskId>);

    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_TASK.with(|current| current.set(self.0));
        }
    }

    let _restore = Restore(CURRENT_TASK.with(|current| current.replace(Some(id))));
    f()
}

/// Locks two tasks' links in id order. Returns `(listener, notifier)`.
fn lock_pair<'a>(
    listener: &'a Task,
    notifier: &'a Task,
) -> (MutexGuard<'a, Links>, MutexGuard<'a, Links>) {
    if listener.id < notifier.id {
        let mine = listener.links.lock();
        let theirs = notifier.links.lock();
        (mine, theirs)
    } else {
        let theirs = notifier.links.lock();
        let mine = listener.links.lock();
        (mine, theirs)
    }
}

fn link_dependency(listener: Arc<dyn Job>, notifier: &Task) {
    let task = listener.task();
    assert_ne!(task.id, notifier.id, "task {} cannot depend on itself", task.id);

    let (mut mine, mut theirs) = lock_pair(task, notifier);
    if notifier.is_finished() {
        // already satisfied
        if notifier.is_canceled() {
            mine.upstream_canceled = true;
        }
        return;
    }
    mine.gated = true;
    mine.released = false;
    mine.pending += 1;
    theirs.dependents.push(Arc::clone(&listener));
}

fn link_trigger(listener: Arc<dyn Job>, notifier: &Task) {
    let task = listener.task();
    assert_ne!(task.id, notifier.id, "task {} cannot trigger itself", task.id);

    let (mut mine, mut theirs) = lock_pair(task, notifier);
    if notifier.is_finished() {
        mine.released = true;
        mine.triggered_by.get_or_insert(notifier.id);
        return;
    }
    mine.gated = true;
    // a trigger that already fired decided the race
    if mine.triggered_by.is_none() {
        mine.released = false;
    }
    theirs.listeners.push(Arc::clone(&listener));
}
