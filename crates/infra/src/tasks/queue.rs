//! In-process task queue on the tokio runtime.
//!
//! Tasks are registered by name; `enqueue` spawns the handler immediately
//! and `wait` joins it. A task that finishes before anyone waits removes
//! itself from the running set and parks its outcome in a bounded cache,
//! so callers that never wait do not pin memory. Nothing survives a restart.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use stockade_core::{TaskHandle, TaskOutcome, TaskQueue};
use stockade_domain::{Result, StockadeError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::errors::map_join_error;

type TaskFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type TaskHandler = Arc<dyn Fn(Value) -> TaskFuture + Send + Sync>;
// `None` marks a task spawned before its join handle was stored.
type RunningTasks = Arc<Mutex<HashMap<Uuid, Option<JoinHandle<TaskOutcome>>>>>;

const FINISHED_CAPACITY: u64 = 10_000;
const FINISHED_TTL: Duration = Duration::from_secs(60 * 60);

pub struct InProcessTaskQueue {
    handlers: RwLock<HashMap<String, TaskHandler>>,
    running: RunningTasks,
    finished: Cache<Uuid, TaskOutcome>,
}

impl Default for InProcessTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessTaskQueue {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
            finished: Cache::builder()
                .max_capacity(FINISHED_CAPACITY)
                .time_to_live(FINISHED_TTL)
                .build(),
        }
    }

    /// Register (or replace) the handler for `name`.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let handler: TaskHandler = Arc::new(move |args| -> TaskFuture { Box::pin(handler(args)) });
        if self.handlers.write().insert(name.clone(), handler).is_some() {
            warn!(task = %name, "task handler replaced");
        } else {
            debug!(task = %name, "task handler registered");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Tasks still running.
    pub fn pending(&self) -> usize {
        self.running.lock().len()
    }
}

/// Lives inside a spawned task; on exit it records the outcome for a later
/// `wait` and drops the task from the running set. A task that panics or is
/// cancelled is recorded as failed.
struct Reaper {
    id: Uuid,
    running: RunningTasks,
    finished: Cache<Uuid, TaskOutcome>,
    recorded: bool,
}

impl Reaper {
    fn record(&mut self, outcome: &TaskOutcome) {
        self.finished.insert(self.id, outcome.clone());
        self.recorded = true;
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if !self.recorded {
            self.finished.insert(self.id, TaskOutcome::Failed("task aborted before finishing".into()));
        }
        self.running.lock().remove(&self.id);
    }
}

#[async_trait]
impl TaskQueue for InProcessTaskQueue {
    fn enqueue(&self, task_name: &str, args: Value) -> Result<TaskHandle> {
        let handler = self
            .handlers
            .read()
            .get(task_name)
            .cloned()
            .ok_or_else(|| StockadeError::InvalidInput(format!("unknown task '{task_name}'")))?;
        let runtime = Handle::try_current()
            .map_err(|err| StockadeError::Internal(format!("no async runtime: {err}")))?;

        let handle = TaskHandle::new(task_name);
        let span = tracing::info_span!("task", name = %task_name, id = %handle.id);
        let mut reaper = Reaper {
            id: handle.id,
            running: Arc::clone(&self.running),
            finished: self.finished.clone(),
            recorded: false,
        };

        self.running.lock().insert(handle.id, None);
        let join = runtime.spawn(
            async move {
                let outcome = match handler(args).await {
                    Ok(value) => {
                        debug!("task completed");
                        TaskOutcome::Completed(value)
                    }
                    Err(err) => {
                        warn!(error = %err, "task failed");
                        TaskOutcome::Failed(err.to_string())
                    }
                };
                reaper.record(&outcome);
                outcome
            }
            .instrument(span),
        );
        // An entry already reaped means the task finished; its outcome is cached.
        if let Some(slot) = self.running.lock().get_mut(&handle.id) {
            *slot = Some(join);
        }
        info!(task = %task_name, id = %handle.id, "task enqueued");
        Ok(handle)
    }

    async fn wait(&self, handle: &TaskHandle) -> Result<TaskOutcome> {
        let join = self.running.lock().remove(&handle.id).flatten();
        if let Some(join) = join {
            let outcome = join.await.map_err(map_join_error);
            self.finished.invalidate(&handle.id);
            return outcome;
        }
        self.finished
            .remove(&handle.id)
            .ok_or_else(|| StockadeError::NotFound(format!("task {}", handle.id)))
    }
}
