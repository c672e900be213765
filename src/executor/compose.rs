//! Builders that wire new futures into the graph and submit them.

use super::future::Future;
use super::pool::Executor;
use super::task::{Edges, Job};
use crate::error::TaskError;
use std::sync::Arc;
use std::time::Instant;

impl Executor {
    /// Runs `f` as soon as a worker is free.
    pub fn invoke<T, F>(&self, f: F) -> Arc<Future<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let future = Arc::new(Future::new(f));
        self.submit(future.clone());
        future
    }

    /// Runs `f` once `input` finished, whatever its outcome. `f` reads the
    /// predecessor itself through `input.get()` when it needs the value.
    pub fn then<T, Y, F>(&self, input: &Arc<Future<T>>, f: F) -> Arc<Future<Y>>
    where
        T: Send + 'static,
        Y: Send + 'static,
        F: FnOnce() -> anyhow::Result<Y> + Send + 'static,
    {
        let future = Arc::new(Future::new(f));
        future.add_dependency(input);
        self.submit(future.clone());
        future
    }

    /// Collects every input's value in input order once all of them
    /// finished. The first failed input, in input order, fails the
    /// aggregate with the same error.
    pub fn when_all<T>(&self, inputs: Vec<Arc<Future<T>>>) -> Arc<Future<Vec<T>>>
    where
        T: Clone + Send + 'static,
    {
        let future = Arc::new(Future::from_body({
            let inputs = inputs.clone();
            move |_| inputs.iter().map(|input| input.get()).collect()
        }));
        for input in &inputs {
            future.add_dependency(input);
        }
        self.submit(future.clone());
        future
    }

    /// Resolves to the outcome of whichever input finished first, counting
    /// failure and cancellation as finishing.
    pub fn when_first<T>(&self, inputs: Vec<Arc<Future<T>>>) -> Arc<Future<T>>
    where
        T: Clone + Send + 'static,
    {
        let future = Arc::new(Future::from_body({
            let inputs = inputs.clone();
            move |task| {
                if inputs.is_empty() {
                    return Err(TaskError::EmptyRace);
                }
                let winner = task
                    .triggered_by()
                    .ok_or(TaskError::Invariant("race released without a winner"))?;
                inputs
                    .iter()
                    .find(|input| input.id() == winner)
                    .ok_or(TaskError::Invariant("race winner is not an input"))?
                    .get()
            }
        }));
        for input in &inputs {
            future.add_trigger(input);
        }
        self.submit(future.clone());
        future
    }

    /// Runs at `deadline` and collects, in input order, the values of the
    /// inputs that finished before it. Later inputs are left out; the
    /// inputs themselves are not canceled.
    pub fn when_all_before_deadline<T>(
        &self,
        inputs: Vec<Arc<Future<T>>>,
        deadline: Instant,
    ) -> Arc<Future<Vec<T>>>
    where
        T: Clone + Send + 'static,
    {
        let future = Arc::new(Future::from_body(move |_| {
            inputs
                .iter()
                .filter(|input| {
                    input
                        .task()
                        .finished_at()
                        .is_some_and(|finished| finished < deadline)
                })
                .map(|input| input.get())
                .collect()
        }));
        future.task().set_time_trigger(deadline);
        self.submit(future.clone());
        future
    }
}
