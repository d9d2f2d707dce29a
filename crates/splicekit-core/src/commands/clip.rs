//! Clip Commands Module
//!
//! Implements the clip editing commands: add, remove and media replacement.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    commands::{ClipSnapshot, Command, CommandResult, StateChange},
    timeline::{Clip, ClipTrack, Timeline},
    AssetId, ClipId, CoreError, CoreResult, TimeSec, TrackId,
};

/// Resolves a track for mutation, refusing locked tracks
fn unlocked_track<'a>(timeline: &'a mut Timeline, track_id: &str) -> CoreResult<&'a mut ClipTrack> {
    let track = timeline.require_track_mut(track_id)?;
    if track.is_locked {
        return Err(CoreError::TrackLocked(track_id.to_string()));
    }
    Ok(track)
}

fn missing_snapshot(type_name: &str, clip_id: &str) -> CoreError {
    CoreError::InvalidCommand(format!(
        "{type_name} result has no snapshot for clip {clip_id}"
    ))
}

// =============================================================================
// AddClipCommand
// =============================================================================

/// Command to add a clip to a track
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddClipCommand {
    /// Target track ID
    pub track_id: TrackId,
    /// Clip to add (its `start_time` is assigned by the track)
    pub clip: Clip,
    /// Requested position; an ordering hint on magnetic tracks
    pub position: Option<TimeSec>,
}

impl AddClipCommand {
    pub fn new(track_id: &str, clip: Clip) -> Self {
        Self {
            track_id: track_id.to_string(),
            clip,
            position: None,
        }
    }

    /// Sets the requested position
    pub fn at(mut self, position: TimeSec) -> Self {
        self.position = Some(position);
        self
    }
}

impl Command for AddClipCommand {
    fn execute(&self, timeline: &mut Timeline) -> CoreResult<CommandResult> {
        let track_index = timeline
            .track_index(&self.track_id)
            .ok_or_else(|| CoreError::TrackNotFound(self.track_id.clone()))?;
        let track = unlocked_track(timeline, &self.track_id)?;

        let mut clip = self.clip.clone();
        clip.track_index = track_index;
        if !track.add_clip(clip, self.position) {
            return Err(CoreError::TrackLocked(self.track_id.clone()));
        }

        Ok(CommandResult::new()
            .with_change(StateChange::ClipCreated {
                clip_id: self.clip.id.clone(),
            })
            .with_created_id(&self.clip.id))
    }

    fn undo(&self, timeline: &mut Timeline, _result: &CommandResult) -> CoreResult<()> {
        let track = unlocked_track(timeline, &self.track_id)?;
        if track.remove_clip(&self.clip.id).is_none() {
            warn!(
                track_id = %self.track_id,
                clip_id = %self.clip.id,
                "Undo AddClip: clip already gone"
            );
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "AddClip"
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "trackId": self.track_id,
            "clipId": self.clip.id,
            "assetId": self.clip.asset_id,
            "position": self.position,
        })
    }
}

// =============================================================================
// RemoveClipCommand
// =============================================================================

/// Command to remove a clip from a track
///
/// Undo re-inserts the removed clip at the position it had when removed. On a
/// magnetic track that position only selects the slot, so the clip lands
/// back where it was only if nothing else changed the track meanwhile.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveClipCommand {
    pub track_id: TrackId,
    pub clip_id: ClipId,
}

impl RemoveClipCommand {
    pub fn new(track_id: &str, clip_id: &str) -> Self {
        Self {
            track_id: track_id.to_string(),
            clip_id: clip_id.to_string(),
        }
    }
}

impl Command for RemoveClipCommand {
    fn execute(&self, timeline: &mut Timeline) -> CoreResult<CommandResult> {
        let track = unlocked_track(timeline, &self.track_id)?;

        // Capture the position before removal; ripple rewrites neighbors.
        let captured_position = track
            .get_clip(&self.clip_id)
            .map(|clip| clip.start_time)
            .ok_or_else(|| CoreError::ClipNotFound(self.clip_id.clone()))?;
        let clip = track
            .remove_clip(&self.clip_id)
            .ok_or_else(|| CoreError::ClipNotFound(self.clip_id.clone()))?;

        Ok(CommandResult::new()
            .with_change(StateChange::ClipDeleted {
                clip_id: self.clip_id.clone(),
            })
            .with_deleted_id(&self.clip_id)
            .with_snapshot(ClipSnapshot {
                track_id: self.track_id.clone(),
                clip,
                captured_position,
            }))
    }

    fn undo(&self, timeline: &mut Timeline, result: &CommandResult) -> CoreResult<()> {
        let snapshot = result
            .snapshot_of(&self.clip_id)
            .ok_or_else(|| missing_snapshot(self.type_name(), &self.clip_id))?;
        let track = unlocked_track(timeline, &snapshot.track_id)?;

        if !track.add_clip(snapshot.clip.clone(), Some(snapshot.captured_position)) {
            return Err(CoreError::TrackLocked(snapshot.track_id.clone()));
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "RemoveClip"
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "trackId": self.track_id,
            "clipId": self.clip_id,
        })
    }
}

// =============================================================================
// ReplaceClipAssetCommand
// =============================================================================

/// Command to point a clip at different media
///
/// Used to apply background task output (e.g. a subtitle-free render) to the
/// timeline. The clip keeps its place, trim and attributes; only `asset_id`
/// and `proxy_asset_id` change. A `None` proxy clears the old one, since it
/// was derived from the old media.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceClipAssetCommand {
    pub track_id: TrackId,
    pub clip_id: ClipId,
    pub asset_id: AssetId,
    pub proxy_asset_id: Option<AssetId>,
}

impl ReplaceClipAssetCommand {
    pub fn new(track_id: &str, clip_id: &str, asset_id: &str) -> Self {
        Self {
            track_id: track_id.to_string(),
            clip_id: clip_id.to_string(),
            asset_id: asset_id.to_string(),
            proxy_asset_id: None,
        }
    }

    pub fn with_proxy(mut self, proxy_asset_id: &str) -> Self {
        self.proxy_asset_id = Some(proxy_asset_id.to_string());
        self
    }

    /// Builds the command from a task result of the form
    /// `{"trackId", "clipId", "assetId", "proxyAssetId"?}`.
    ///
    /// Returns `None` if any required key is missing or not a string.
    pub fn from_task_result(value: &Value) -> Option<Self> {
        let field = |key: &str| value.get(key).and_then(Value::as_str);

        let command = Self::new(field("trackId")?, field("clipId")?, field("assetId")?);
        Some(match field("proxyAssetId") {
            Some(proxy) => command.with_proxy(proxy),
            None => command,
        })
    }
}

impl Command for ReplaceClipAssetCommand {
    fn execute(&self, timeline: &mut Timeline) -> CoreResult<CommandResult> {
        let track = unlocked_track(timeline, &self.track_id)?;
        let clip = track
            .get_clip_mut(&self.clip_id)
            .ok_or_else(|| CoreError::ClipNotFound(self.clip_id.clone()))?;

        let snapshot = ClipSnapshot {
            track_id: self.track_id.clone(),
            captured_position: clip.start_time,
            clip: clip.clone(),
        };
        clip.asset_id = self.asset_id.clone();
        clip.proxy_asset_id = self.proxy_asset_id.clone();

        Ok(CommandResult::new()
            .with_change(StateChange::ClipModified {
                clip_id: self.clip_id.clone(),
            })
            .with_snapshot(snapshot))
    }

    fn undo(&self, timeline: &mut Timeline, result: &CommandResult) -> CoreResult<()> {
        let snapshot = result
            .snapshot_of(&self.clip_id)
            .ok_or_else(|| missing_snapshot(self.type_name(), &self.clip_id))?;
        let track = unlocked_track(timeline, &snapshot.track_id)?;
        let clip = track
            .get_clip_mut(&self.clip_id)
            .ok_or_else(|| CoreError::ClipNotFound(self.clip_id.clone()))?;

        clip.asset_id = snapshot.clip.asset_id.clone();
        clip.proxy_asset_id = snapshot.clip.proxy_asset_id.clone();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "ReplaceClipAsset"
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "trackId": self.track_id,
            "clipId": self.clip_id,
            "assetId": self.asset_id,
            "proxyAssetId": self.proxy_asset_id,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn magnetic_timeline() -> (Timeline, TrackId) {
        let mut timeline = Timeline::new("Test");
        let track_id = timeline.add_track(ClipTrack::new_magnetic("V1"));
        (timeline, track_id)
    }

    fn clip_ids(timeline: &Timeline, track_id: &str) -> Vec<ClipId> {
        timeline
            .track(track_id)
            .unwrap()
            .clips()
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }

    fn add(timeline: &mut Timeline, track_id: &str, name: &str, duration: TimeSec) -> ClipId {
        let clip = Clip::new(&format!("asset_{name}"), name, duration);
        let id = clip.id.clone();
        AddClipCommand::new(track_id, clip).execute(timeline).unwrap();
        id
    }

    #[test]
    fn test_add_clip_sets_track_index_and_reports_creation() {
        let mut timeline = Timeline::new("Test");
        timeline.add_track(ClipTrack::new_free("V1"));
        let v2 = timeline.add_track(ClipTrack::new_magnetic("V2"));

        let clip = Clip::new("asset", "A", 3.0);
        let clip_id = clip.id.clone();
        let result = AddClipCommand::new(&v2, clip).execute(&mut timeline).unwrap();

        assert_eq!(result.created_ids, vec![clip_id.clone()]);
        assert_eq!(
            result.changes,
            vec![StateChange::ClipCreated {
                clip_id: clip_id.clone()
            }]
        );
        let (_, stored) = timeline.find_clip(&clip_id).unwrap();
        assert_eq!(stored.track_index, 1);
    }

    #[test]
    fn test_add_clip_undo_removes_only_that_clip() {
        let (mut timeline, track_id) = magnetic_timeline();
        let a = add(&mut timeline, &track_id, "A", 5.0);

        let b = Clip::new("asset_b", "B", 3.0);
        let command = AddClipCommand::new(&track_id, b);
        let result = command.execute(&mut timeline).unwrap();
        command.undo(&mut timeline, &result).unwrap();

        assert_eq!(clip_ids(&timeline, &track_id), vec![a]);
    }

    #[test]
    fn test_add_clip_on_locked_track_fails() {
        let (mut timeline, track_id) = magnetic_timeline();
        timeline.track_mut(&track_id).unwrap().set_locked(true);

        let result = AddClipCommand::new(&track_id, Clip::new("a", "A", 1.0)).execute(&mut timeline);
        assert!(matches!(result, Err(CoreError::TrackLocked(_))));
        assert!(timeline.track(&track_id).unwrap().is_empty());
    }

    #[test]
    fn test_add_clip_to_missing_track_fails() {
        let mut timeline = Timeline::new("Test");
        let result = AddClipCommand::new("nope", Clip::new("a", "A", 1.0)).execute(&mut timeline);
        assert!(matches!(result, Err(CoreError::TrackNotFound(_))));
    }

    #[test]
    fn test_remove_clip_undo_restores_order_and_positions() {
        let (mut timeline, track_id) = magnetic_timeline();
        let a = add(&mut timeline, &track_id, "A", 5.0);
        let b = add(&mut timeline, &track_id, "B", 3.0);
        let c = add(&mut timeline, &track_id, "C", 2.0);
        let before = timeline.track(&track_id).unwrap().clone();

        let command = RemoveClipCommand::new(&track_id, &b);
        let result = command.execute(&mut timeline).unwrap();

        let track = timeline.track(&track_id).unwrap();
        assert_eq!(clip_ids(&timeline, &track_id), vec![a.clone(), c.clone()]);
        assert_eq!(track.get_clip(&c).unwrap().start_time, 5.0);
        assert_eq!(result.snapshot_of(&b).unwrap().captured_position, 5.0);

        command.undo(&mut timeline, &result).unwrap();
        assert_eq!(timeline.track(&track_id).unwrap(), &before);
    }

    #[test]
    fn test_remove_first_clip_undo_restores_order() {
        let (mut timeline, track_id) = magnetic_timeline();
        let a = add(&mut timeline, &track_id, "A", 4.0);
        let b = add(&mut timeline, &track_id, "B", 4.0);

        let command = RemoveClipCommand::new(&track_id, &a);
        let result = command.execute(&mut timeline).unwrap();
        command.undo(&mut timeline, &result).unwrap();

        assert_eq!(clip_ids(&timeline, &track_id), vec![a, b]);
        assert!(timeline.track(&track_id).unwrap().is_contiguous());
    }

    #[test]
    fn test_remove_missing_clip_fails() {
        let (mut timeline, track_id) = magnetic_timeline();
        let result = RemoveClipCommand::new(&track_id, "ghost").execute(&mut timeline);
        assert!(matches!(result, Err(CoreError::ClipNotFound(_))));
    }

    #[test]
    fn test_remove_clip_on_locked_track_fails() {
        let (mut timeline, track_id) = magnetic_timeline();
        let a = add(&mut timeline, &track_id, "A", 4.0);
        timeline.track_mut(&track_id).unwrap().set_locked(true);

        let result = RemoveClipCommand::new(&track_id, &a).execute(&mut timeline);
        assert!(matches!(result, Err(CoreError::TrackLocked(_))));
        assert_eq!(timeline.track(&track_id).unwrap().len(), 1);
    }

    #[test]
    fn test_free_track_remove_undo_restores_literal_position() {
        let mut timeline = Timeline::new("Test");
        let track_id = timeline.add_track(ClipTrack::new_free("V1"));
        let clip = Clip::new("asset", "A", 2.0);
        let clip_id = clip.id.clone();
        AddClipCommand::new(&track_id, clip)
            .at(7.5)
            .execute(&mut timeline)
            .unwrap();

        let command = RemoveClipCommand::new(&track_id, &clip_id);
        let result = command.execute(&mut timeline).unwrap();
        command.undo(&mut timeline, &result).unwrap();

        let track = timeline.track(&track_id).unwrap();
        assert_eq!(track.get_clip(&clip_id).unwrap().start_time, 7.5);
    }

    #[test]
    fn test_commands_are_reusable_across_cycles() {
        let (mut timeline, track_id) = magnetic_timeline();
        add(&mut timeline, &track_id, "A", 1.0);
        let b = add(&mut timeline, &track_id, "B", 2.0);
        let command = RemoveClipCommand::new(&track_id, &b);

        for _ in 0..3 {
            let result = command.execute(&mut timeline).unwrap();
            assert_eq!(timeline.track(&track_id).unwrap().len(), 1);
            command.undo(&mut timeline, &result).unwrap();
            assert_eq!(timeline.track(&track_id).unwrap().len(), 2);
        }
    }

    #[test]
    fn test_replace_asset_and_undo() {
        let (mut timeline, track_id) = magnetic_timeline();
        let a = add(&mut timeline, &track_id, "A", 4.0);
        timeline
            .track_mut(&track_id)
            .unwrap()
            .get_clip_mut(&a)
            .unwrap()
            .proxy_asset_id = Some("old_proxy".to_string());

        let command = ReplaceClipAssetCommand::new(&track_id, &a, "clean_asset");
        let result = command.execute(&mut timeline).unwrap();

        let clip = timeline.track(&track_id).unwrap().get_clip(&a).unwrap();
        assert_eq!(clip.asset_id, "clean_asset");
        assert!(clip.proxy_asset_id.is_none());
        assert_eq!(clip.start_time, 0.0);

        command.undo(&mut timeline, &result).unwrap();
        let clip = timeline.track(&track_id).unwrap().get_clip(&a).unwrap();
        assert_eq!(clip.asset_id, "asset_A");
        assert_eq!(clip.proxy_asset_id.as_deref(), Some("old_proxy"));
    }

    #[test]
    fn test_replace_asset_from_task_result() {
        let value = serde_json::json!({
            "trackId": "t1",
            "clipId": "c1",
            "assetId": "clean",
            "proxyAssetId": "clean_proxy",
        });
        let command = ReplaceClipAssetCommand::from_task_result(&value).unwrap();
        assert_eq!(command.track_id, "t1");
        assert_eq!(command.proxy_asset_id.as_deref(), Some("clean_proxy"));

        let partial = serde_json::json!({ "trackId": "t1", "clipId": "c1" });
        assert!(ReplaceClipAssetCommand::from_task_result(&partial).is_none());
        assert!(ReplaceClipAssetCommand::from_task_result(&Value::Null).is_none());
    }

    #[test]
    fn test_undo_without_snapshot_is_rejected() {
        let (mut timeline, track_id) = magnetic_timeline();
        let command = RemoveClipCommand::new(&track_id, "whatever");
        let result = command.undo(&mut timeline, &CommandResult::new());
        assert!(matches!(result, Err(CoreError::InvalidCommand(_))));
    }

    #[test]
    fn test_command_json() {
        let command = RemoveClipCommand::new("t1", "c1");
        assert_eq!(command.type_name(), "RemoveClip");
        assert_eq!(command.to_json()["clipId"], "c1");
    }
}
