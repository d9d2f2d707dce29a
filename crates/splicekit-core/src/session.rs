//! Editing Session
//!
//! Owns one timeline, its edit history and a task queue. The session lives on
//! the interactive thread; workers never touch the timeline. Their results
//! reach it through [`EditSession::pump_task_events`], which turns completed
//! media-replacement results into ordinary undoable commands.

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::{
    commands::{Command, CommandResult, History, ReplaceClipAssetCommand},
    jobs::{HandlerResult, QueueManager, Task, TaskChange, TaskContext, TaskEvent, TaskType},
    settings::SessionSettings,
    timeline::Timeline,
    CoreResult,
};

/// Timeline + history + task queue for one open document
pub struct EditSession {
    timeline: Timeline,
    history: History,
    queue: QueueManager,
    events: Option<mpsc::UnboundedReceiver<TaskEvent>>,
}

impl EditSession {
    /// Creates an empty timeline and starts the task workers
    pub fn new(name: &str, settings: &SessionSettings) -> CoreResult<Self> {
        Self::with_timeline(Timeline::new(name), settings)
    }

    /// Opens a session over an existing timeline
    pub fn with_timeline(timeline: Timeline, settings: &SessionSettings) -> CoreResult<Self> {
        let settings = settings.clone().normalized();
        let mut queue = QueueManager::new(settings.queue.clone())?;
        let events = queue.take_event_receiver();

        info!(timeline = %timeline.name, "Edit session opened");
        Ok(Self {
            timeline,
            history: History::with_capacity(settings.history.max_entries),
            queue,
            events,
        })
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Direct timeline access for setup work that should not be undoable
    /// (adding tracks, loading a document).
    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    /// Executes a command through the history
    pub fn execute(&mut self, command: Box<dyn Command>) -> CoreResult<CommandResult> {
        self.history.execute(command, &mut self.timeline)
    }

    pub fn undo(&mut self) -> CoreResult<bool> {
        self.history.undo(&mut self.timeline)
    }

    pub fn redo(&mut self) -> CoreResult<bool> {
        self.history.redo(&mut self.timeline)
    }

    pub fn register_handler<F>(&self, task_type: TaskType, handler: F)
    where
        F: Fn(&TaskContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.queue.register_handler(task_type, handler);
    }

    pub fn submit_task(&self, task_type: TaskType, title: &str, data: Value) -> CoreResult<Task> {
        self.queue.add_task(task_type, title, data)
    }

    /// Drains pending task events without blocking.
    ///
    /// A completed task whose result names a clip and a new asset
    /// (`trackId`, `clipId`, `assetId`, optional `proxyAssetId`) is applied as
    /// a [`ReplaceClipAssetCommand`]. A result that no longer fits the
    /// timeline (clip deleted, track locked) is logged and skipped.
    pub fn pump_task_events(&mut self) -> Vec<TaskEvent> {
        let mut drained = Vec::new();
        let Some(events) = self.events.as_mut() else {
            return drained;
        };

        let disconnected = loop {
            match events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => break true,
            }
        };
        if disconnected {
            self.events = None;
        }

        for event in &drained {
            if let TaskEvent::Updated {
                task,
                change: TaskChange::Completed,
            } = event
            {
                self.apply_task_result(task);
            }
        }
        drained
    }

    fn apply_task_result(&mut self, task: &Task) {
        let Some(command) = task
            .result
            .as_ref()
            .and_then(ReplaceClipAssetCommand::from_task_result)
        else {
            return;
        };

        let clip_id = command.clip_id.clone();
        match self.history.execute(Box::new(command), &mut self.timeline) {
            Ok(_) => info!(task_id = %task.id, %clip_id, "Applied task result to clip"),
            Err(e) => warn!(
                task_id = %task.id,
                %clip_id,
                "Could not apply task result: {}",
                e
            ),
        }
    }

    /// Stops and joins the task workers. The timeline stays usable.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        info!(timeline = %self.timeline.name, "Edit session closed");
    }
}
