//! VEDA DAG - dependency-graph task scheduling on a fixed thread pool
//!
//! Submit units of work wired together by dependencies, race-style triggers
//! and absolute deadlines; a fixed pool of workers runs each of them exactly
//! once and propagates completion, failure and cancellation through the
//! graph.
//!
//! # Quick Start
//!
//! ```no_run
//! use veda_dag::prelude::*;
//!
//! let executor = Executor::with_threads(4).unwrap();
//!
//! let a = executor.invoke(|| Ok(2));
//! let b = executor.invoke(|| Ok(3));
//! let sum = executor.then(&executor.when_all(vec![a, b]), || Ok(()));
//! sum.wait();
//!
//! executor.start_shutdown();
//! executor.wait_shutdown();
//! ```
//!
//! # Concepts
//!
//! - **Dependency**: a task does not run before all its dependencies
//!   settled. A canceled dependency cancels the dependent.
//! - **Trigger**: a task becomes runnable as soon as any one of its
//!   triggers settled; the first one is recorded as `triggered_by`.
//! - **Deadline**: a task becomes runnable once its time trigger elapsed.

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result, TaskError};
pub use executor::{Edges, Executor, Future, Job, PanicStrategy, Task, TaskId, TaskState};
