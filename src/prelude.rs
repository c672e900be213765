pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result, TaskError};
pub use crate::executor::{Edges, Executor, Future, Job, PanicStrategy, Task, TaskId, TaskState};
pub use crate::telemetry::MetricsSnapshot;
