use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use super::task::{RefreshTask, TickResult};

/// Type-erased view of a [`RefreshTask`] so tasks publishing different
/// state types can be driven together.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Task name used in logs.
    fn name(&self) -> &str;

    /// Period between ticks.
    fn interval(&self) -> Duration;

    /// Run the initial tick.
    async fn first_refresh(&self) -> TickResult;

    /// Spawn the periodic ticker.
    fn start(&self);

    /// Stop the ticker and wait for it to exit.
    async fn shutdown(&self);

    /// Whether the most recent tick succeeded.
    fn last_update_success(&self) -> bool;
}

#[async_trait]
impl<T: Send + Sync + 'static> ScheduledTask for RefreshTask<T> {
    fn name(&self) -> &str {
        RefreshTask::name(self)
    }

    fn interval(&self) -> Duration {
        RefreshTask::interval(self)
    }

    async fn first_refresh(&self) -> TickResult {
        RefreshTask::first_refresh(self).await
    }

    fn start(&self) {
        RefreshTask::start(self)
    }

    async fn shutdown(&self) {
        RefreshTask::shutdown(self).await
    }

    fn last_update_success(&self) -> bool {
        self.snapshot().last_update_success
    }
}

/// Owns the set of independently timed tasks.
#[derive(Default)]
pub struct RefreshScheduler {
    tasks: Vec<Arc<dyn ScheduledTask>>,
}

impl fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field(
                "tasks",
                &self.tasks.iter().map(|task| task.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RefreshScheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task; it is driven by every later `*_all` call.
    pub fn register(&mut self, task: Arc<dyn ScheduledTask>) {
        self.tasks.push(task);
    }

    /// Registered tasks in registration order.
    pub fn tasks(&self) -> &[Arc<dyn ScheduledTask>] {
        &self.tasks
    }

    /// Run every task's first refresh concurrently. Results come back in
    /// registration order.
    pub async fn first_refresh_all(&self) -> Vec<(String, TickResult)> {
        join_all(self.tasks.iter().map(|task| async move {
            (task.name().to_string(), task.first_refresh().await)
        }))
        .await
    }

    /// Spawn every ticker.
    pub fn start_all(&self) {
        for task in &self.tasks {
            debug!(task = task.name(), interval = ?task.interval(), "starting task");
            task.start();
        }
        info!(tasks = self.tasks.len(), "scheduler started");
    }

    /// Stop every ticker concurrently.
    pub async fn shutdown_all(&self) {
        join_all(self.tasks.iter().map(|task| task.shutdown())).await;
        info!(tasks = self.tasks.len(), "scheduler stopped");
    }
}
