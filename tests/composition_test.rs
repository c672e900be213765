use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use veda_dag::prelude::*;

fn executor(threads: usize) -> Executor {
    Executor::with_threads(threads).unwrap()
}

fn delayed<T: Send + 'static>(executor: &Executor, ms: u64, value: T) -> Arc<Future<T>> {
    executor.invoke(move || {
        thread::sleep(Duration::from_millis(ms));
        Ok(value)
    })
}

#[test]
fn test_when_all_keeps_input_order() {
    let executor = executor(4);
    let a = delayed(&executor, 40, "a");
    let b = delayed(&executor, 0, "b");
    let c = delayed(&executor, 20, "c");

    let all = executor.when_all(vec![a.clone(), b.clone(), c.clone()]);

    let expected = vec![a.get().unwrap(), b.get().unwrap(), c.get().unwrap()];
    assert_eq!(all.get().unwrap(), expected);
}

#[test]
fn test_when_all_propagates_failure() {
    let executor = executor(2);
    let good = delayed(&executor, 10, 1);
    let bad: Arc<Future<i32>> = executor.invoke(|| anyhow::bail!("input b broke"));

    let all = executor.when_all(vec![good, bad.clone()]);

    let err = all.get().unwrap_err();
    assert!(all.is_failed());
    let own = bad.error().unwrap();
    match (&err, &own) {
        (TaskError::Failed(a), TaskError::Failed(b)) => assert!(Arc::ptr_eq(a, b)),
        other => panic!("unexpected errors: {:?}", other),
    }
}

#[test]
fn test_when_all_reports_first_failure_in_input_order() {
    let executor = executor(4);
    let late: Arc<Future<i32>> = executor.invoke(|| {
        thread::sleep(Duration::from_millis(40));
        anyhow::bail!("first in order")
    });
    let early: Arc<Future<i32>> = executor.invoke(|| anyhow::bail!("first in time"));

    let all = executor.when_all(vec![late, early]);

    let err = all.get().unwrap_err();
    assert_eq!(err.source_error().unwrap().to_string(), "first in order");
}

#[test]
fn test_when_all_of_nothing_is_empty() {
    let executor = executor(1);
    let all = executor.when_all(Vec::<Arc<Future<u8>>>::new());
    assert!(all.get().unwrap().is_empty());
}

#[test]
fn test_when_all_with_canceled_input_is_canceled() {
    let executor = executor(2);
    let canceled = Arc::new(Future::new(|| Ok(1)));
    let fine = executor.invoke(|| Ok(2));

    let all = executor.when_all(vec![canceled.clone(), fine]);
    canceled.cancel();

    assert!(all.get().unwrap_err().is_canceled());
    assert!(all.is_canceled());
}

#[test]
fn test_when_first_takes_earliest() {
    let executor = executor(4);
    let fast = delayed(&executor, 10, "fast");
    let slow = delayed(&executor, 300, "slow");

    let first = executor.when_first(vec![slow.clone(), fast.clone()]);

    assert_eq!(first.get().unwrap(), "fast");
    assert_eq!(first.task().triggered_by(), Some(fast.id()));
    assert!(!slow.is_finished());
}

#[test]
fn test_when_first_ignores_later_failure() {
    let executor = executor(4);
    let fast = delayed(&executor, 0, 7);
    let slow: Arc<Future<i32>> = executor.invoke(|| {
        thread::sleep(Duration::from_millis(100));
        anyhow::bail!("too late to matter")
    });

    let first = executor.when_first(vec![fast, slow.clone()]);

    assert_eq!(first.get().unwrap(), 7);
    slow.wait();
    assert_eq!(first.get().unwrap(), 7);
}

#[test]
fn test_when_first_counts_cancellation_as_finishing() {
    let executor = executor(2);
    let canceled = Arc::new(Future::new(|| Ok(1)));
    let slow = delayed(&executor, 200, 2);

    let first = executor.when_first(vec![slow, canceled.clone()]);
    canceled.cancel();

    assert!(first.get().unwrap_err().is_canceled());
    assert!(first.is_failed());
    assert_eq!(first.task().triggered_by(), Some(canceled.id()));
}

#[test]
fn test_when_first_with_finished_input() {
    let executor = executor(2);
    let done = executor.invoke(|| Ok("done"));
    done.wait();
    let pending = Arc::new(Future::new(|| Ok("never submitted")));

    let first = executor.when_first(vec![pending, done]);

    assert_eq!(first.get().unwrap(), "done");
}

#[test]
fn test_when_first_of_nothing_fails() {
    let executor = executor(1);
    let first = executor.when_first(Vec::<Arc<Future<u8>>>::new());
    assert!(matches!(first.get(), Err(TaskError::EmptyRace)));
}

#[test]
fn test_when_all_before_deadline_drops_late_inputs() {
    let executor = executor(4);
    let start = Instant::now();
    let quick = delayed(&executor, 0, "quick");
    let late = delayed(&executor, 400, "late");

    let deadline = start + Duration::from_millis(100);
    let partial = executor.when_all_before_deadline(vec![quick, late.clone()], deadline);

    assert_eq!(partial.get().unwrap(), vec!["quick"]);
    assert!(Instant::now() >= deadline);

    // the late input keeps running and is not canceled
    assert_eq!(late.get().unwrap(), "late");
}

#[test]
fn test_when_all_before_elapsed_deadline() {
    let executor = executor(2);
    let a = executor.invoke(|| Ok(1));
    let b = executor.invoke(|| Ok(2));
    a.wait();
    b.wait();
    thread::sleep(Duration::from_millis(5));

    let partial = executor.when_all_before_deadline(vec![a, b], Instant::now());

    assert_eq!(partial.get().unwrap(), vec![1, 2]);
}

#[test]
fn test_then_chain() {
    let executor = executor(2);
    let base = executor.invoke(|| Ok(2));

    let input = base.clone();
    let doubled = executor.then(&base, move || Ok(input.get()? * 2));
    let input = doubled.clone();
    let text = executor.then(&doubled, move || Ok(format!("{}", input.get()?)));

    assert_eq!(text.get().unwrap(), "4");
}

#[test]
fn test_then_runs_after_failed_input() {
    let executor = executor(2);
    let broken: Arc<Future<i32>> = executor.invoke(|| anyhow::bail!("upstream"));

    let input = broken.clone();
    let recovered = executor.then(&broken, move || Ok(input.get().unwrap_or(-1)));

    assert_eq!(recovered.get().unwrap(), -1);
}
