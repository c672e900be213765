//! Task execution infrastructure.
//!
//! Tasks and their dependency/trigger edges, the fixed-size pool that runs
//! them, typed futures and the builders that compose futures.

mod compose;
pub mod future;
pub mod panic_handler;
pub mod pool;
pub mod task;
mod timer;
mod worker;

pub use future::Future;
pub use panic_handler::{PanicHandler, PanicStrategy};
pub use pool::{Executor, QueueCounts};
pub use task::{Edges, Job, Task, TaskId, TaskState};
