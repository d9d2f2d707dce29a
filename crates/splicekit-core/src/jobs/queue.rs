//! Task Queue Module
//!
//! [`QueueManager`] owns the shared task list and a fixed pool of
//! [`Worker`]s. Every state change is reported as a [`TaskEvent`] on an
//! unbounded channel; the editing thread drains it to react to results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::worker::QueueShared;
use crate::{
    jobs::{
        new_task_id, HandlerResult, QueueStats, Task, TaskContext, TaskHandler, TaskStatus,
        TaskType, Worker,
    },
    settings::QueueSettings,
    CoreError, CoreResult, TaskId,
};

// =============================================================================
// Events
// =============================================================================

/// What changed in an `Updated` event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskChange {
    Started,
    Progress,
    Completed,
    Failed,
    Cancelled,
}

/// Task queue event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskEvent {
    /// Task appended to the queue
    Added { task: Task },
    /// Status or progress changed; carries the task after the change
    Updated { task: Task, change: TaskChange },
    /// Task removed by `remove_task`
    Removed { task_id: TaskId },
    /// `clear_completed` dropped `removed` finished tasks
    Cleared { removed: usize },
}

impl TaskEvent {
    /// ID of the task the event is about, if it concerns one task
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Added { task } | Self::Updated { task, .. } => Some(&task.id),
            Self::Removed { task_id } => Some(task_id),
            Self::Cleared { .. } => None,
        }
    }
}

// =============================================================================
// Queue Manager
// =============================================================================

/// Task scheduler: shared task list plus worker threads
///
/// Workers are started by [`QueueManager::new`] and joined by
/// [`QueueManager::shutdown`] (also run on drop). Handlers registered with
/// [`QueueManager::register_handler`] are installed on every worker.
pub struct QueueManager {
    shared: Arc<QueueShared>,
    workers: Vec<Worker>,
    event_rx: Option<mpsc::UnboundedReceiver<TaskEvent>>,
    max_queue_size: usize,
}

impl QueueManager {
    /// Creates the queue and starts `num_workers` worker threads
    pub fn new(settings: QueueSettings) -> CoreResult<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let num_workers = settings.num_workers.max(1);

        let mut manager = Self {
            shared: Arc::new(QueueShared::new(event_tx, settings.idle_wait())),
            workers: Vec::with_capacity(num_workers),
            event_rx: Some(event_rx),
            max_queue_size: settings.max_queue_size.max(1),
        };

        // On failure, drop joins the workers spawned so far.
        for worker_id in 0..num_workers {
            let worker = Worker::spawn(worker_id, Arc::clone(&manager.shared))?;
            manager.workers.push(worker);
        }

        info!(num_workers, "Task queue started");
        Ok(manager)
    }

    /// Creates a queue with default settings (one worker)
    pub fn with_defaults() -> CoreResult<Self> {
        Self::new(QueueSettings::default())
    }

    /// Appends a pending task.
    ///
    /// Fails with `ResourceExhausted` when `max_queue_size` tasks are already
    /// pending, and with `Internal` once the queue has been stopped.
    pub fn add_task(&self, task_type: TaskType, title: &str, data: Value) -> CoreResult<Task> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(CoreError::Internal("task queue is stopped".to_string()));
        }

        let pending = state.tasks.iter().filter(|t| t.is_pending()).count();
        if pending >= self.max_queue_size {
            return Err(CoreError::ResourceExhausted(format!(
                "task queue is full ({pending} pending)"
            )));
        }

        let mut task = Task::new(task_type, title, data);
        while state.tasks.iter().any(|t| t.id == task.id) {
            task.id = new_task_id();
        }

        info!(task_id = %task.id, %task_type, title, "Task added");
        state.tasks.push(task.clone());
        self.shared.emit(TaskEvent::Added { task: task.clone() });
        self.shared.wakeup.notify_all();
        Ok(task)
    }

    /// Installs `handler` for `task_type` on every worker.
    ///
    /// Pending tasks of that type become claimable immediately.
    pub fn register_handler<F>(&self, task_type: TaskType, handler: F)
    where
        F: Fn(&TaskContext) -> HandlerResult + Send + Sync + 'static,
    {
        let handler: TaskHandler = Arc::new(handler);
        for worker in &self.workers {
            worker.register_handler(task_type, Arc::clone(&handler));
        }
        debug!(%task_type, "Handler registered");

        // Wake under the lock so a worker between scan and wait cannot miss it.
        let _state = self.shared.state.lock();
        self.shared.wakeup.notify_all();
    }

    /// Removes the handler for `task_type` from every worker.
    ///
    /// A task of that type claimed before this call fails with a "no handler"
    /// error; later ones stay pending.
    pub fn unregister_handler(&self, task_type: TaskType) -> bool {
        let mut removed = false;
        for worker in &self.workers {
            removed |= worker.unregister_handler(task_type);
        }
        removed
    }

    /// Stops workers from starting new tasks. Running tasks continue.
    pub fn pause_queue(&self) {
        self.shared.state.lock().paused = true;
        info!("Task queue paused");
    }

    pub fn resume_queue(&self) {
        let mut state = self.shared.state.lock();
        state.paused = false;
        self.shared.wakeup.notify_all();
        info!("Task queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Cancels a pending task. Returns `false` for any other status,
    /// including running (see [`QueueManager::interrupt_task`]).
    pub fn cancel_task(&self, task_id: &str) -> bool {
        let mut state = self.shared.state.lock();
        let Some(task) = state.task_mut(task_id) else {
            return false;
        };
        if !task.is_pending() || !task.transition(TaskStatus::Cancelled) {
            return false;
        }

        info!(task_id, "Task cancelled");
        self.shared.emit(TaskEvent::Updated {
            task: task.clone(),
            change: TaskChange::Cancelled,
        });
        self.shared.finished.notify_all();
        true
    }

    /// Asks a running task to stop by tripping its cancellation token.
    ///
    /// The handler must check [`TaskContext::is_cancelled`] or call
    /// [`TaskContext::checkpoint`]; if it then returns an error the task ends
    /// `Cancelled`. Returns `false` if the task is not running.
    pub fn interrupt_task(&self, task_id: &str) -> bool {
        let state = self.shared.state.lock();
        match state.tokens.get(task_id) {
            Some(token) => {
                token.cancel();
                info!(task_id, "Task interrupt requested");
                true
            }
            None => false,
        }
    }

    /// Removes a task in any status. A running task is also interrupted and
    /// its outcome discarded.
    pub fn remove_task(&self, task_id: &str) -> bool {
        let mut state = self.shared.state.lock();
        let Some(index) = state.tasks.iter().position(|t| t.id == task_id) else {
            return false;
        };

        state.tasks.remove(index);
        if let Some(token) = state.tokens.get(task_id) {
            token.cancel();
        }

        info!(task_id, "Task removed");
        self.shared.emit(TaskEvent::Removed {
            task_id: task_id.to_string(),
        });
        self.shared.finished.notify_all();
        true
    }

    /// Drops every completed, failed or cancelled task; returns how many
    pub fn clear_completed(&self) -> usize {
        let mut state = self.shared.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| !t.is_done());
        let removed = before - state.tasks.len();

        debug!(removed, "Cleared finished tasks");
        self.shared.emit(TaskEvent::Cleared { removed });
        removed
    }

    pub fn get_stats(&self) -> QueueStats {
        QueueStats::from_tasks(self.shared.state.lock().tasks.iter())
    }

    /// Snapshot of all tasks in queue order
    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.shared.state.lock().tasks.clone()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.shared
            .state
            .lock()
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
    }

    /// Blocks until the task reaches a terminal status or `timeout` passes.
    ///
    /// Returns the task as last seen, or `None` if it is not (or no longer)
    /// in the queue.
    pub fn wait_for_task(&self, task_id: &str, timeout: Duration) -> Option<Task> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            let task = state.tasks.iter().find(|t| t.id == task_id)?;
            if task.is_done() {
                return Some(task.clone());
            }
            if self
                .shared
                .finished
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.tasks.iter().find(|t| t.id == task_id).cloned();
            }
        }
    }

    /// Blocks until no task is pending or running, or `timeout` passes.
    /// Returns `true` if the queue drained.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if state.tasks.iter().all(|t| t.is_done()) {
                return true;
            }
            if self
                .shared
                .finished
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.tasks.iter().all(|t| t.is_done());
            }
        }
    }

    /// Takes the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TaskEvent>> {
        self.event_rx.take()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Tells workers to exit after their current task. Does not wait.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.running {
            state.running = false;
            info!("Task queue stopping");
        }
        self.shared.wakeup.notify_all();
    }

    /// Stops the queue and joins every worker thread.
    ///
    /// Waits for running handlers to return. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.stop();
        for worker in &mut self.workers {
            worker.join();
        }
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("workers", &self.workers)
            .field("max_queue_size", &self.max_queue_size)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
