//! Independently timed refresh loops with last-known-good publishing.

/// Type-erased task registry.
pub mod scheduler;
/// The periodic task itself.
pub mod task;

pub use scheduler::{RefreshScheduler, ScheduledTask};
pub use task::{Refresh, RefreshTask, TaskState, TickResult};
