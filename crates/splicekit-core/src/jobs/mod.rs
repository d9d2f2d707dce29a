//! Background Task Module
//!
//! Long-running work (subtitle removal, transcription, translation, export,
//! transcode, download) runs as tasks on a small pool of worker threads.
//! The [`QueueManager`] owns the task list and the workers; handlers for each
//! [`TaskType`] are supplied by the embedding application.

mod queue;
mod worker;

pub use queue::*;
pub use worker::*;

use serde::{Deserialize, Serialize};

use crate::{CoreError, TaskId};

// =============================================================================
// Task Types
// =============================================================================

/// Task type enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Fetch remote media
    Download,
    /// Translate subtitles
    Translate,
    /// Remove burned-in subtitles from video
    RemoveSub,
    /// Transcribe audio to text
    Transcribe,
    /// Final export render
    Export,
    /// Convert media to another format
    Transcode,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        Self::Download,
        Self::Translate,
        Self::RemoveSub,
        Self::Transcribe,
        Self::Export,
        Self::Transcode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Translate => "translate",
            Self::RemoveSub => "remove_sub",
            Self::Transcribe => "transcribe",
            Self::Export => "export",
            Self::Transcode => "transcode",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTaskType(s.to_string()))
    }
}

/// Task status
///
/// Forward-only: `Pending -> Running -> {Completed | Failed | Cancelled}` or
/// `Pending -> Cancelled`. Nothing returns to `Pending`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Completed, failed or cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (*self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

// =============================================================================
// Task
// =============================================================================

/// Task definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Short hex token
    pub id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Caller-defined progress, conventionally 0-100; not validated
    pub progress: i32,
    pub title: String,
    /// Opaque handler input
    pub data: serde_json::Value,
    pub error: Option<String>,
    /// Handler output, set on completion
    pub result: Option<serde_json::Value>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    /// Worker that claimed the task
    pub worker_id: Option<usize>,
}

impl Task {
    /// Creates a pending task
    pub fn new(task_type: TaskType, title: &str, data: serde_json::Value) -> Self {
        Self {
            id: new_task_id(),
            task_type,
            status: TaskStatus::Pending,
            progress: 0,
            title: title.to_string(),
            data,
            error: None,
            result: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            finished_at: None,
            worker_id: None,
        }
    }

    /// Moves to `next` if the state machine allows it, stamping start/finish
    /// times. Returns `false` (and changes nothing) otherwise.
    pub fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = chrono::Utc::now().to_rfc3339();
        if next == TaskStatus::Running {
            self.started_at = Some(now);
        } else if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = next;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 8 hex characters from a random UUID
pub(crate) fn new_task_id() -> TaskId {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

// =============================================================================
// Queue Stats
// =============================================================================

/// Task counts by status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new(
            TaskType::RemoveSub,
            "Clean intro",
            serde_json::json!({"clipId": "clip_001"}),
        );

        assert_eq!(task.id.len(), 8);
        assert!(task.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_status_is_forward_only() {
        let mut task = Task::new(TaskType::Export, "Export", serde_json::json!({}));

        assert!(!task.transition(TaskStatus::Completed));
        assert!(task.transition(TaskStatus::Running));
        assert!(task.started_at.is_some());
        assert!(!task.transition(TaskStatus::Pending));
        assert!(task.transition(TaskStatus::Failed));
        assert!(task.finished_at.is_some());
        assert!(!task.transition(TaskStatus::Running));
        assert!(!task.transition(TaskStatus::Cancelled));
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_pending_can_be_cancelled() {
        let mut task = Task::new(TaskType::Download, "Fetch", serde_json::json!({}));
        assert!(task.transition(TaskStatus::Cancelled));
        assert!(task.is_done());
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_task_type_names() {
        for task_type in TaskType::ALL {
            assert_eq!(task_type.as_str().parse::<TaskType>().unwrap(), task_type);
        }
        assert_eq!(
            serde_json::to_string(&TaskType::RemoveSub).unwrap(),
            "\"remove_sub\""
        );
        assert!(matches!(
            "upscale".parse::<TaskType>(),
            Err(CoreError::UnknownTaskType(_))
        ));
    }

    #[test]
    fn test_stats_from_tasks() {
        let mut running = Task::new(TaskType::Translate, "t", serde_json::json!({}));
        running.transition(TaskStatus::Running);
        let pending = Task::new(TaskType::Translate, "p", serde_json::json!({}));

        let stats = QueueStats::from_tasks([&running, &pending]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 0);
    }
}
