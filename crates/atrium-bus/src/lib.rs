//! The Agent Bus: bounded per-agent FIFO queues drained by a
//! worker pool sized to each agent's concurrency limit, with retry/backoff
//! for transient failures and cooperative task cancellation.
//!
//! - [`executor::TaskExecutor`]: the contract `atrium-workspace` implements
//!   to actually run a task; the bus only schedules, retries, and cancels.
//! - [`bus::AgentBus`]: register/deregister an agent's queue, submit a task,
//!   read queue/in-flight metrics, cancel one in-flight task.
//! - [`retry::RetryPolicy`]: the capped exponential backoff used between
//!   retry attempts.

mod bus;
mod executor;
mod retry;

pub use bus::{AgentBus, BusMetrics};
pub use executor::{SubmittedTask, TaskExecutor};
pub use retry::RetryPolicy;
