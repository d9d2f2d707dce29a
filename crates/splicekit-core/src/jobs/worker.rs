//! Worker Module
//!
//! A worker is one OS thread with its own handler registry. All workers of a
//! queue share one task list guarded by a single mutex; claiming a task
//! (`Pending -> Running`) happens under that lock, so no two workers can run
//! the same task. Handlers run with the lock released.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    jobs::{Task, TaskChange, TaskEvent, TaskStatus, TaskType},
    CoreResult, TaskId,
};

// =============================================================================
// Handlers
// =============================================================================

/// What a handler returns: a JSON result or any error
pub type HandlerResult = Result<Value, Box<dyn std::error::Error + Send + Sync>>;

/// Task handler, invoked on a worker thread
pub type TaskHandler = Arc<dyn Fn(&TaskContext) -> HandlerResult + Send + Sync>;

/// Per-worker map from task type to handler
pub type HandlerRegistry = Arc<RwLock<HashMap<TaskType, TaskHandler>>>;

/// Returned by [`TaskContext::checkpoint`] once the task was interrupted
#[derive(Debug, thiserror::Error)]
#[error("task {0} was cancelled")]
pub struct TaskCancelled(pub TaskId);

/// Cooperative cancellation flag shared between the queue and a running task
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Shared Queue State
// =============================================================================

pub(crate) struct QueueState {
    pub(crate) tasks: Vec<Task>,
    pub(crate) paused: bool,
    pub(crate) running: bool,
    /// Tokens of claimed tasks, removed when the task finishes
    pub(crate) tokens: HashMap<TaskId, CancellationToken>,
}

impl QueueState {
    pub(crate) fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }
}

/// State shared by the queue manager and its workers
pub(crate) struct QueueShared {
    pub(crate) state: Mutex<QueueState>,
    /// Signaled on anything that may make a task claimable or stop workers
    pub(crate) wakeup: Condvar,
    /// Signaled whenever a task reaches a terminal status
    pub(crate) finished: Condvar,
    events: mpsc::UnboundedSender<TaskEvent>,
    /// Upper bound on an idle worker's sleep between scans
    idle_wait: Duration,
}

impl QueueShared {
    pub(crate) fn new(events: mpsc::UnboundedSender<TaskEvent>, idle_wait: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                paused: false,
                running: true,
                tokens: HashMap::new(),
            }),
            wakeup: Condvar::new(),
            finished: Condvar::new(),
            events,
            idle_wait,
        }
    }

    /// Sends an event. A dropped receiver is not an error.
    pub(crate) fn emit(&self, event: TaskEvent) {
        let _ = self.events.send(event);
    }
}

// =============================================================================
// Task Context
// =============================================================================

/// What a handler sees of its task
pub struct TaskContext {
    task_id: TaskId,
    task_type: TaskType,
    data: Value,
    cancel: CancellationToken,
    shared: Arc<QueueShared>,
}

impl TaskContext {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// The task's input payload
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Stores `progress` on the task and emits a progress event.
    ///
    /// Any integer is accepted.
    pub fn report_progress(&self, progress: i32) {
        let mut state = self.shared.state.lock();
        if let Some(task) = state.task_mut(&self.task_id) {
            if task.is_running() {
                task.progress = progress;
                self.shared.emit(TaskEvent::Updated {
                    task: task.clone(),
                    change: TaskChange::Progress,
                });
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with [`TaskCancelled`] if the task was interrupted; use with `?`
    /// between units of work.
    pub fn checkpoint(&self) -> Result<(), TaskCancelled> {
        if self.is_cancelled() {
            Err(TaskCancelled(self.task_id.clone()))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

/// One dispatch thread and its handler registry
pub struct Worker {
    id: usize,
    handlers: HandlerRegistry,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(id: usize, shared: Arc<QueueShared>) -> CoreResult<Self> {
        let handlers: HandlerRegistry = Arc::new(RwLock::new(HashMap::new()));
        let thread_handlers = Arc::clone(&handlers);

        let thread = thread::Builder::new()
            .name(format!("splicekit-worker-{id}"))
            .spawn(move || run_worker(id, &shared, &thread_handlers))?;

        Ok(Self {
            id,
            handlers,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn register_handler(&self, task_type: TaskType, handler: TaskHandler) {
        self.handlers.write().insert(task_type, handler);
    }

    pub fn unregister_handler(&self, task_type: TaskType) -> bool {
        self.handlers.write().remove(&task_type).is_some()
    }

    pub fn has_handler(&self, task_type: TaskType) -> bool {
        self.handlers.read().contains_key(&task_type)
    }

    /// Waits for the thread to exit. The queue must be stopped first.
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(worker_id = self.id, "Worker thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("handlers", &self.handlers.read().keys().collect::<Vec<_>>())
            .field("joined", &self.thread.is_none())
            .finish()
    }
}

struct Claim {
    task_id: TaskId,
    task_type: TaskType,
    data: Value,
    cancel: CancellationToken,
}

/// Outcome of one handler run
enum Finish {
    Completed(Value),
    Failed(String),
    Cancelled(String),
}

fn run_worker(worker_id: usize, shared: &Arc<QueueShared>, handlers: &HandlerRegistry) {
    info!(worker_id, "Worker started");

    while let Some(claim) = next_claim(worker_id, shared, handlers) {
        let finish = run_handler(shared, handlers, &claim);
        finish_task(worker_id, shared, &claim.task_id, finish);
    }

    info!(worker_id, "Worker stopped");
}

/// Blocks until a task is claimed or the queue stops.
fn next_claim(
    worker_id: usize,
    shared: &Arc<QueueShared>,
    handlers: &HandlerRegistry,
) -> Option<Claim> {
    let mut state = shared.state.lock();
    loop {
        if !state.running {
            return None;
        }
        if state.paused {
            shared.wakeup.wait(&mut state);
            continue;
        }

        // Tasks whose type has no handler here stay pending.
        let claimable = {
            let handlers = handlers.read();
            state
                .tasks
                .iter()
                .position(|t| t.is_pending() && handlers.contains_key(&t.task_type))
        };

        if let Some(index) = claimable {
            let task = &mut state.tasks[index];
            task.transition(TaskStatus::Running);
            task.worker_id = Some(worker_id);
            let claim = Claim {
                task_id: task.id.clone(),
                task_type: task.task_type,
                data: task.data.clone(),
                cancel: CancellationToken::new(),
            };
            info!(worker_id, task_id = %claim.task_id, task_type = %claim.task_type, "Task started");
            shared.emit(TaskEvent::Updated {
                task: task.clone(),
                change: TaskChange::Started,
            });
            state
                .tokens
                .insert(claim.task_id.clone(), claim.cancel.clone());
            return Some(claim);
        }

        shared.wakeup.wait_for(&mut state, shared.idle_wait);
    }
}

fn run_handler(shared: &Arc<QueueShared>, handlers: &HandlerRegistry, claim: &Claim) -> Finish {
    let handler = handlers.read().get(&claim.task_type).cloned();
    let Some(handler) = handler else {
        return Finish::Failed(format!(
            "no handler registered for task type '{}'",
            claim.task_type
        ));
    };

    let ctx = TaskContext {
        task_id: claim.task_id.clone(),
        task_type: claim.task_type,
        data: claim.data.clone(),
        cancel: claim.cancel.clone(),
        shared: Arc::clone(shared),
    };

    match panic::catch_unwind(AssertUnwindSafe(|| handler(&ctx))) {
        Ok(Ok(value)) => Finish::Completed(value),
        Ok(Err(e)) if claim.cancel.is_cancelled() => Finish::Cancelled(e.to_string()),
        Ok(Err(e)) => Finish::Failed(e.to_string()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(task_id = %claim.task_id, %message, "Task handler panicked");
            Finish::Failed(format!("handler panicked: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn finish_task(worker_id: usize, shared: &Arc<QueueShared>, task_id: &str, finish: Finish) {
    let mut state = shared.state.lock();
    state.tokens.remove(task_id);

    // The task may have been removed while it ran.
    let Some(task) = state.task_mut(task_id) else {
        info!(worker_id, task_id, "Finished task no longer in queue");
        shared.finished.notify_all();
        return;
    };

    let change = match finish {
        Finish::Completed(value) => {
            task.transition(TaskStatus::Completed);
            task.progress = 100;
            task.result = Some(value);
            info!(worker_id, task_id, "Task completed");
            TaskChange::Completed
        }
        Finish::Failed(message) => {
            task.transition(TaskStatus::Failed);
            error!(worker_id, task_id, error = %message, "Task failed");
            task.error = Some(message);
            TaskChange::Failed
        }
        Finish::Cancelled(message) => {
            task.transition(TaskStatus::Cancelled);
            info!(worker_id, task_id, "Task cancelled while running");
            task.error = Some(message);
            TaskChange::Cancelled
        }
    };

    shared.emit(TaskEvent::Updated {
        task: task.clone(),
        change,
    });
    shared.finished.notify_all();
}
