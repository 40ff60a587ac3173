use std::{fmt, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FeedError, Result};

/// Tokio intervals reject a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh<T> {
    /// Publish a new value.
    Updated(T),
    /// Keep publishing the previous value as is.
    Unchanged,
}

/// Result of a single tick as seen by the caller that drove it.
pub type TickResult = std::result::Result<(), Arc<FeedError>>;

type RefreshFn<T> =
    Arc<dyn Fn(Option<Arc<T>>) -> BoxFuture<'static, Result<Refresh<T>>> + Send + Sync>;

/// Published state of a task plus its health flags.
#[derive(Debug)]
pub struct TaskState<T> {
    /// Last successfully produced value, kept across failed ticks.
    pub value: Option<Arc<T>>,
    /// Whether the most recent tick succeeded.
    pub last_update_success: bool,
    /// Error of the most recent tick, cleared on success.
    pub last_error: Option<Arc<FeedError>>,
    /// Wall-clock time of the last successful tick.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Completed ticks, successful or not.
    pub ticks: u64,
}

impl<T> Clone for TaskState<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            last_update_success: self.last_update_success,
            last_error: self.last_error.clone(),
            last_success_at: self.last_success_at,
            ticks: self.ticks,
        }
    }
}

impl<T> Default for TaskState<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_update_success: false,
            last_error: None,
            last_success_at: None,
            ticks: 0,
        }
    }
}

struct TaskInner<T> {
    name: String,
    interval: Duration,
    refresh: RefreshFn<T>,
    state: watch::Sender<TaskState<T>>,
    tick_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> TaskInner<T> {
    async fn tick(&self) -> TickResult {
        let _serialised = self.tick_lock.lock().await;
        let previous = self.state.borrow().value.clone();

        match (self.refresh)(previous).await {
            Ok(outcome) => {
                let recovered = self.state.borrow().last_error.is_some();
                let updated = matches!(outcome, Refresh::Updated(_));
                self.state.send_modify(|state| {
                    if let Refresh::Updated(value) = outcome {
                        state.value = Some(Arc::new(value));
                    }
                    state.last_update_success = true;
                    state.last_error = None;
                    state.last_success_at = Some(Utc::now());
                    state.ticks += 1;
                });
                if recovered {
                    info!(task = %self.name, "task recovered");
                }
                debug!(task = %self.name, updated, "refresh succeeded");
                Ok(())
            }
            Err(err) => {
                warn!(task = %self.name, error = %err, "refresh failed");
                let err = Arc::new(err);
                self.state.send_modify(|state| {
                    state.last_update_success = false;
                    state.last_error = Some(Arc::clone(&err));
                    state.ticks += 1;
                });
                Err(err)
            }
        }
    }
}

/// One periodically refreshed feed.
///
/// Cloning yields another handle to the same task.
pub struct RefreshTask<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> Clone for RefreshTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for RefreshTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("RefreshTask")
            .field("name", &self.inner.name)
            .field("interval", &self.inner.interval)
            .field("has_value", &state.value.is_some())
            .field("last_update_success", &state.last_update_success)
            .field("ticks", &state.ticks)
            .finish()
    }
}

impl<T: Send + Sync + 'static> RefreshTask<T> {
    /// `refresh` receives the currently published value and produces the
    /// next one.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        interval: Duration,
        refresh: F,
    ) -> Self
    where
        F: Fn(Option<Arc<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Refresh<T>>> + Send + 'static,
    {
        let refresh: RefreshFn<T> =
            Arc::new(move |previous| refresh(previous).boxed());
        let (state, _) = watch::channel(TaskState::default());

        Self {
            inner: Arc::new(TaskInner {
                name: name.into(),
                interval: interval.max(MIN_INTERVAL),
                refresh,
                state,
                tick_lock: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                runner: Mutex::new(None),
            }),
        }
    }

    /// Task name used in logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Period between ticks.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Initial refresh. Completes with success or the reported failure.
    pub async fn first_refresh(&self) -> TickResult {
        self.refresh_now().await
    }

    /// Run one tick immediately, outside the periodic schedule.
    pub async fn refresh_now(&self) -> TickResult {
        self.inner.tick().await
    }

    /// Spawn the ticker. The first periodic tick fires one interval from
    /// now. Calling this twice, or after shutdown, does nothing.
    pub fn start(&self) {
        let mut runner = self.inner.runner.lock();
        if runner.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *runner = Some(tokio::spawn(async move {
            info!(
                task = %inner.name,
                interval = ?inner.interval,
                "refresh task started"
            );
            let mut ticker =
                time::interval_at(Instant::now() + inner.interval, inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = inner.cancel.cancelled() => break,
                    _ = inner.tick() => {}
                }
            }
            info!(task = %inner.name, "refresh task stopped");
        }));
    }

    /// Stop the ticker. An in-flight tick is abandoned.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.runner.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(task = %self.inner.name, error = %err, "refresh task ended abnormally");
        }
    }

    /// Whether the ticker is spawned and not shut down.
    pub fn is_running(&self) -> bool {
        self.inner.runner.lock().is_some() && !self.inner.cancel.is_cancelled()
    }

    /// Currently published value.
    pub fn current(&self) -> Option<Arc<T>> {
        self.inner.state.borrow().value.clone()
    }

    /// Copy of the published state.
    pub fn snapshot(&self) -> TaskState<T> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified after every tick.
    pub fn subscribe(&self) -> watch::Receiver<TaskState<T>> {
        self.inner.state.subscribe()
    }
}
