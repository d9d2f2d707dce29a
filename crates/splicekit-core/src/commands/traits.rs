//! Command Trait Definition
//!
//! Defines the trait that all edit commands must implement, and the result
//! record they hand back to [`super::History`].

use serde::{Deserialize, Serialize};

use crate::{
    timeline::{Clip, Timeline},
    ClipId, CoreResult, OpId, TimeSec, TrackId,
};

/// Pre-mutation copy of a clip, captured by a command at execute time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipSnapshot {
    /// Track the clip lived on
    pub track_id: TrackId,
    pub clip: Clip,
    /// `start_time` of the clip just before the mutation
    pub captured_position: TimeSec,
}

/// Command execution result
///
/// Immutable once returned. Undo reads everything it needs from here, so a
/// command value can be executed, undone and redone any number of times.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Generated Operation ID
    pub op_id: OpId,

    /// List of state changes
    pub changes: Vec<StateChange>,

    /// Newly created IDs
    pub created_ids: Vec<String>,

    /// Deleted IDs
    pub deleted_ids: Vec<String>,

    /// Clips as they were before the command ran
    pub snapshots: Vec<ClipSnapshot>,
}

impl CommandResult {
    /// Creates an empty result with a fresh operation ID
    pub fn new() -> Self {
        Self::with_op_id(&ulid::Ulid::new().to_string())
    }

    pub fn with_op_id(op_id: &str) -> Self {
        Self {
            op_id: op_id.to_string(),
            changes: vec![],
            created_ids: vec![],
            deleted_ids: vec![],
            snapshots: vec![],
        }
    }

    /// Adds a state change
    pub fn with_change(mut self, change: StateChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Adds a created ID
    pub fn with_created_id(mut self, id: &str) -> Self {
        self.created_ids.push(id.to_string());
        self
    }

    /// Adds a deleted ID
    pub fn with_deleted_id(mut self, id: &str) -> Self {
        self.deleted_ids.push(id.to_string());
        self
    }

    /// Adds a clip snapshot
    pub fn with_snapshot(mut self, snapshot: ClipSnapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    /// Snapshot of a specific clip, if one was captured
    pub fn snapshot_of(&self, clip_id: &str) -> Option<&ClipSnapshot> {
        self.snapshots.iter().find(|s| s.clip.id == clip_id)
    }
}

impl Default for CommandResult {
    fn default() -> Self {
        Self::new()
    }
}

/// State change types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StateChange {
    ClipCreated { clip_id: ClipId },
    ClipModified { clip_id: ClipId },
    ClipDeleted { clip_id: ClipId },
}

/// Trait that all edit commands must implement
///
/// # Core Principles
/// - On failure, `execute` leaves the timeline unchanged.
/// - `undo` receives the result its own `execute` produced and restores the
///   state that result describes.
/// - Commands keep no mutable state of their own.
///
/// Undo is exact only when commands are undone in LIFO order and nothing else
/// has touched the same track in between.
pub trait Command: Send {
    /// Execute the command
    fn execute(&self, timeline: &mut Timeline) -> CoreResult<CommandResult>;

    /// Undo the command
    ///
    /// Only called with the result of a successful `execute`/`redo`.
    fn undo(&self, timeline: &mut Timeline, result: &CommandResult) -> CoreResult<()>;

    /// Redo the command
    ///
    /// Default implementation is identical to execute.
    fn redo(&self, timeline: &mut Timeline, _previous: &CommandResult) -> CoreResult<CommandResult> {
        self.execute(timeline)
    }

    /// Command type name
    ///
    /// Used for logging and debugging.
    fn type_name(&self) -> &'static str;

    /// JSON form of the command's parameters
    fn to_json(&self) -> serde_json::Value;
}
