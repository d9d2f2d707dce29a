//! Edit History Module
//!
//! Runs commands against a timeline and keeps bounded undo/redo stacks.

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    commands::{Command, CommandResult},
    timeline::Timeline,
    CoreResult, OpId,
};

/// Default number of undoable entries
pub const DEFAULT_MAX_HISTORY: usize = 50;

// =============================================================================
// History Entry
// =============================================================================

/// Entry in the undo/redo history
pub struct HistoryEntry {
    /// Command that was executed
    pub command: Box<dyn Command>,
    /// Result of the most recent execute/redo
    pub result: CommandResult,
    /// Timestamp when the command last ran
    pub timestamp: String,
}

impl std::fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("command", &self.command.type_name())
            .field("result", &self.result)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl HistoryEntry {
    fn new(command: Box<dyn Command>, result: CommandResult) -> Self {
        Self {
            command,
            result,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn op_id(&self) -> &OpId {
        &self.result.op_id
    }
}

// =============================================================================
// History
// =============================================================================

/// Executes commands and manages undo/redo history
///
/// Executing a new command clears the redo stack. When the undo stack grows
/// past `max_entries` the oldest entry is dropped and can no longer be undone.
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    /// Creates a history keeping at most `max_entries` undoable commands
    /// (at least one)
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Executes a command and records it.
    ///
    /// A command that fails is not recorded and the redo stack is left alone.
    pub fn execute(
        &mut self,
        command: Box<dyn Command>,
        timeline: &mut Timeline,
    ) -> CoreResult<CommandResult> {
        let result = command.execute(timeline)?;
        debug!(
            command = command.type_name(),
            op_id = %result.op_id,
            "Executed command"
        );

        self.redo_stack.clear();
        self.undo_stack
            .push_back(HistoryEntry::new(command, result.clone()));

        while self.undo_stack.len() > self.max_entries {
            if let Some(dropped) = self.undo_stack.pop_front() {
                debug!(
                    command = dropped.command.type_name(),
                    op_id = %dropped.op_id(),
                    "History full, dropping oldest entry"
                );
            }
        }

        Ok(result)
    }

    /// Undoes the last command.
    ///
    /// Returns `Ok(false)` when there is nothing to undo. If the command's
    /// undo fails, the entry stays on the undo stack.
    pub fn undo(&mut self, timeline: &mut Timeline) -> CoreResult<bool> {
        let Some(entry) = self.undo_stack.pop_back() else {
            return Ok(false);
        };

        if let Err(e) = entry.command.undo(timeline, &entry.result) {
            self.undo_stack.push_back(entry);
            return Err(e);
        }

        debug!(command = entry.command.type_name(), op_id = %entry.op_id(), "Undid command");
        self.redo_stack.push_back(entry);
        Ok(true)
    }

    /// Redoes the last undone command.
    ///
    /// Returns `Ok(false)` when there is nothing to redo. If the command's
    /// redo fails, the entry stays on the redo stack.
    pub fn redo(&mut self, timeline: &mut Timeline) -> CoreResult<bool> {
        let Some(entry) = self.redo_stack.pop_back() else {
            return Ok(false);
        };

        let result = match entry.command.redo(timeline, &entry.result) {
            Ok(result) => result,
            Err(e) => {
                self.redo_stack.push_back(entry);
                return Err(e);
            }
        };

        debug!(command = entry.command.type_name(), op_id = %result.op_id, "Redid command");
        self.undo_stack
            .push_back(HistoryEntry::new(entry.command, result));
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum number of undoable entries
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Clears all history (undo and redo)
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Type name of the command `undo` would revert
    pub fn last_command_type(&self) -> Option<&'static str> {
        self.undo_stack.back().map(|e| e.command.type_name())
    }

    /// Type name of the command `redo` would re-apply
    pub fn last_undone_command_type(&self) -> Option<&'static str> {
        self.redo_stack.back().map(|e| e.command.type_name())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AddClipCommand, RemoveClipCommand};
    use crate::timeline::{Clip, ClipTrack};
    use crate::{ClipId, CoreError, TrackId};

    fn setup() -> (Timeline, TrackId) {
        let mut timeline = Timeline::new("Test");
        let track_id = timeline.add_track(ClipTrack::new_magnetic("V1"));
        (timeline, track_id)
    }

    fn add_command(track_id: &str, name: &str, duration: f64) -> (Box<dyn Command>, ClipId) {
        let clip = Clip::new(&format!("asset_{name}"), name, duration);
        let id = clip.id.clone();
        (Box::new(AddClipCommand::new(track_id, clip)), id)
    }

    fn ids(timeline: &Timeline, track_id: &str) -> Vec<ClipId> {
        timeline
            .track(track_id)
            .unwrap()
            .clips()
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    #[test]
    fn test_undo_removes_only_last_and_redo_restores() {
        let mut history = History::new();
        let (mut timeline, track_id) = setup();

        let (add_a, a) = add_command(&track_id, "A", 5.0);
        let (add_b, b) = add_command(&track_id, "B", 3.0);
        history.execute(add_a, &mut timeline).unwrap();
        history.execute(add_b, &mut timeline).unwrap();
        let before_undo = timeline.clone();

        assert!(history.undo(&mut timeline).unwrap());
        assert_eq!(ids(&timeline, &track_id), vec![a.clone()]);

        assert!(history.redo(&mut timeline).unwrap());
        assert_eq!(ids(&timeline, &track_id), vec![a, b]);
        assert_eq!(timeline, before_undo);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::with_capacity(3);
        let (mut timeline, track_id) = setup();

        for i in 0..4 {
            let (cmd, _) = add_command(&track_id, &format!("C{i}"), 1.0);
            history.execute(cmd, &mut timeline).unwrap();
        }
        assert_eq!(history.undo_count(), 3);

        for _ in 0..3 {
            assert!(history.undo(&mut timeline).unwrap());
        }
        assert!(!history.undo(&mut timeline).unwrap());
        // The oldest add can no longer be undone.
        assert_eq!(timeline.track(&track_id).unwrap().len(), 1);
    }

    #[test]
    fn test_execute_clears_redo() {
        let mut history = History::new();
        let (mut timeline, track_id) = setup();

        let (add_a, _) = add_command(&track_id, "A", 1.0);
        history.execute(add_a, &mut timeline).unwrap();
        history.undo(&mut timeline).unwrap();
        assert!(history.can_redo());

        let (add_b, _) = add_command(&track_id, "B", 1.0);
        history.execute(add_b, &mut timeline).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.last_command_type(), Some("AddClip"));
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut history = History::new();
        let (mut timeline, _) = setup();
        let before = timeline.clone();

        assert!(!history.undo(&mut timeline).unwrap());
        assert!(!history.redo(&mut timeline).unwrap());
        assert_eq!(timeline, before);
    }

    #[test]
    fn test_failed_execute_is_not_recorded() {
        let mut history = History::new();
        let (mut timeline, track_id) = setup();

        let (add_a, _) = add_command(&track_id, "A", 1.0);
        history.execute(add_a, &mut timeline).unwrap();
        history.undo(&mut timeline).unwrap();

        let result = history.execute(
            Box::new(RemoveClipCommand::new(&track_id, "ghost")),
            &mut timeline,
        );
        assert!(matches!(result, Err(CoreError::ClipNotFound(_))));
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 1);
    }

    #[test]
    fn test_failed_undo_keeps_entry() {
        let mut history = History::new();
        let (mut timeline, track_id) = setup();

        let (add_a, _) = add_command(&track_id, "A", 1.0);
        history.execute(add_a, &mut timeline).unwrap();
        timeline.track_mut(&track_id).unwrap().set_locked(true);

        assert!(matches!(
            history.undo(&mut timeline),
            Err(CoreError::TrackLocked(_))
        ));
        assert_eq!(history.undo_count(), 1);

        timeline.track_mut(&track_id).unwrap().set_locked(false);
        assert!(history.undo(&mut timeline).unwrap());
        assert!(timeline.track(&track_id).unwrap().is_empty());
    }

    #[test]
    fn test_remove_then_undo_through_history() {
        let mut history = History::new();
        let (mut timeline, track_id) = setup();

        let mut clip_ids = Vec::new();
        for (name, d) in [("A", 2.0), ("B", 4.0), ("C", 1.0)] {
            let (cmd, id) = add_command(&track_id, name, d);
            history.execute(cmd, &mut timeline).unwrap();
            clip_ids.push(id);
        }
        let before = timeline.clone();

        history
            .execute(
                Box::new(RemoveClipCommand::new(&track_id, &clip_ids[1])),
                &mut timeline,
            )
            .unwrap();
        assert_eq!(history.last_command_type(), Some("RemoveClip"));

        history.undo(&mut timeline).unwrap();
        assert_eq!(timeline, before);
        assert_eq!(history.last_undone_command_type(), Some("RemoveClip"));

        history.redo(&mut timeline).unwrap();
        assert_eq!(
            ids(&timeline, &track_id),
            vec![clip_ids[0].clone(), clip_ids[2].clone()]
        );
    }

    #[test]
    fn test_clear_and_minimum_capacity() {
        let mut history = History::with_capacity(0);
        assert_eq!(history.capacity(), 1);

        let (mut timeline, track_id) = setup();
        let (cmd, _) = add_command(&track_id, "A", 1.0);
        history.execute(cmd, &mut timeline).unwrap();
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
