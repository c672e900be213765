//! Typed results on top of [`Task`].

use super::task::{Job, Task, TaskId, TaskState};
use crate::error::TaskError;
use parking_lot::Mutex;
use std::fmt;

type Body<T> = Box<dyn FnOnce(&Task) -> Result<T, TaskError> + Send>;

/// A task wrapping a zero-argument computation whose value can be
/// retrieved once it ran.
///
/// ```no_run
/// use std::sync::Arc;
/// use veda_dag::prelude::*;
///
/// let executor = Executor::with_threads(2).unwrap();
/// let answer = Arc::new(Future::new(|| Ok(6 * 7)));
/// executor.submit(answer.clone());
/// assert_eq!(answer.get().unwrap(), 42);
/// ```
pub struct Future<T> {
    task: Task,
    body: Mutex<Option<Body<T>>>,
    value: Mutex<Option<T>>,
}

impl<T: Send + 'static> Future<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        Self::from_body(move |_| f().map_err(TaskError::from))
    }

    /// Body that can inspect its own task, e.g. to learn which trigger
    /// released it.
    pub(crate) fn from_body<F>(f: F) -> Self
    where
        F: FnOnce(&Task) -> Result<T, TaskError> + Send + 'static,
    {
        Self {
            task: Task::new(),
            body: Mutex::new(Some(Box::new(f))),
            value: Mutex::new(None),
        }
    }
}

impl<T> Future<T> {
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    pub fn wait(&self) {
        self.task.wait();
    }

    pub fn cancel(&self) -> bool {
        self.task.cancel()
    }

    pub fn is_completed(&self) -> bool {
        self.task.is_completed()
    }

    pub fn is_failed(&self) -> bool {
        self.task.is_failed()
    }

    pub fn is_canceled(&self) -> bool {
        self.task.is_canceled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn error(&self) -> Option<TaskError> {
        self.task.error()
    }
}

impl<T: Clone> Future<T> {
    /// Blocks until the future is finished, then returns its value or the
    /// reason it has none.
    pub fn get(&self) -> Result<T, TaskError> {
        self.task.wait();
        self.outcome()
    }

    /// Non-blocking [`get`](Self::get): `None` while still pending.
    pub fn try_get(&self) -> Option<Result<T, TaskError>> {
        self.task.is_finished().then(|| self.outcome())
    }

    fn outcome(&self) -> Result<T, TaskError> {
        match self.task.state() {
            TaskState::Completed => self
                .value
                .lock()
                .clone()
                .ok_or(TaskError::Invariant("completed future has no value")),
            TaskState::Failed => Err(self
                .task
                .error()
                .unwrap_or(TaskError::Invariant("failed future has no error"))),
            TaskState::Canceled => Err(TaskError::Canceled),
            TaskState::Idle | TaskState::Running => {
                Err(TaskError::Invariant("future read before it finished"))
            }
        }
    }
}

impl<T: Send + 'static> Job for Future<T> {
    fn task(&self) -> &Task {
        &self.task
    }

    fn run(&self) -> Result<(), TaskError> {
        let body = self
            .body
            .lock()
            .take()
            .ok_or(TaskError::Invariant("future body ran twice"))?;
        let value = body(&self.task)?;
        *self.value.lock() = Some(value);
        Ok(())
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.task.id())
            .field("state", &self.task.state())
            .finish()
    }
}
