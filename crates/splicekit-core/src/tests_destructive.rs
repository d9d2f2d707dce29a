//! Destructive and Edge Case Tests for Core Models
//!
//! Degenerate clips, locked tracks, malformed sticker maps, misbehaving
//! handlers and lopsided undo sequences.

use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::commands::{AddClipCommand, History, RemoveClipCommand};
use crate::jobs::{QueueManager, TaskStatus, TaskType};
use crate::settings::QueueSettings;
use crate::timeline::{Clip, ClipTrack, Sticker, StickerTrack, Timeline};

#[test]
fn test_destructive_negative_length_clip_on_magnetic_track() {
    // out_point before in_point is accepted; the footprint is negative
    let inverted = Clip::with_trim("a", "inverted", 10.0, 6.0, 2.0);
    assert_eq!(inverted.length(), -4.0);

    let mut track = ClipTrack::new_magnetic("V1");
    track.add_clip(Clip::new("a", "A", 5.0), None);
    track.add_clip(inverted, None);
    track.add_clip(Clip::new("c", "C", 2.0), None);

    // Packing still follows start + length, even backwards
    let starts: Vec<f64> = track.clips().iter().map(|c| c.start_time).collect();
    assert_eq!(starts, vec![0.0, 5.0, 1.0]);
    assert!(track.is_contiguous());
}

#[test]
fn test_destructive_zero_length_clips() {
    let mut track = ClipTrack::new_magnetic("V1");
    for i in 0..3 {
        track.add_clip(Clip::with_trim("a", &format!("z{i}"), 4.0, 2.0, 2.0), None);
    }
    assert!(track.clips().iter().all(|c| c.start_time == 0.0));
    assert_eq!(track.end_time(), 0.0);
    assert!(track.items_at_time(0.0).is_empty());
}

#[test]
fn test_destructive_zero_length_remove_undo_swaps_ties() {
    let mut timeline = Timeline::new("Ties");
    let track_id = timeline.add_track(ClipTrack::new_magnetic("V1"));
    let mut history = History::new();

    let mut ids = Vec::new();
    for clip in [
        Clip::new("a", "A", 5.0),
        Clip::with_trim("z", "Z1", 4.0, 2.0, 2.0),
        Clip::with_trim("z", "Z2", 4.0, 2.0, 2.0),
        Clip::new("b", "B", 3.0),
    ] {
        ids.push(clip.id.clone());
        history
            .execute(Box::new(AddClipCommand::new(&track_id, clip)), &mut timeline)
            .unwrap();
    }

    history
        .execute(
            Box::new(RemoveClipCommand::new(&track_id, &ids[2])),
            &mut timeline,
        )
        .unwrap();
    assert!(history.undo(&mut timeline).unwrap());

    // Z1 and Z2 both start at 5.0, so the restored Z2 lands before Z1.
    let track = timeline.track(&track_id).unwrap();
    let names: Vec<&str> = track.clips().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["A", "Z2", "Z1", "B"]);
    assert!(track.is_contiguous());
    assert_eq!(track.end_time(), 8.0);
}

#[test]
fn test_destructive_locked_track_rejects_everything() {
    let mut track = ClipTrack::new_magnetic("V1");
    let clip = Clip::new("a", "A", 3.0);
    let clip_id = clip.id.clone();
    track.add_clip(clip, None);
    track.set_locked(true);

    assert!(!track.add_clip(Clip::new("b", "B", 1.0), Some(0.0)));
    assert!(track.remove_clip(&clip_id).is_none());
    assert_eq!(track.len(), 1);

    let mut stickers = StickerTrack::new_sticker("FX");
    stickers.set_locked(true);
    assert!(!stickers.add_sticker(Sticker::emoji("x", 1.0), None));
    assert!(stickers.is_empty());
}

#[test]
fn test_destructive_magnetic_position_far_outside_track() {
    let mut track = ClipTrack::new_magnetic("V1");
    track.add_clip(Clip::new("a", "A", 2.0), None);

    track.add_clip(Clip::new("b", "B", 1.0), Some(-100.0));
    track.add_clip(Clip::new("c", "C", 1.0), Some(1e9));
    track.add_clip(Clip::new("d", "D", 1.0), Some(f64::NAN));

    let names: Vec<&str> = track.clips().iter().map(|c| c.name.as_str()).collect();
    // NaN compares false with everything, so it appends
    assert_eq!(names, vec!["B", "A", "C", "D"]);
    assert!(track.is_contiguous());
}

#[test]
fn test_destructive_sticker_dict_garbage() {
    let mut map = Map::new();
    map.insert("x".into(), json!([1, 2]));
    assert!(Sticker::from_dict(&map).is_err());

    let mut map = Map::new();
    map.insert("id".into(), json!(42));
    assert!(Sticker::from_dict(&map).is_err());

    // Explicit nulls are treated as absent
    let mut map = Map::new();
    map.insert("asset_id".into(), Value::Null);
    map.insert("scale".into(), Value::Null);
    let sticker = Sticker::from_dict(&map).unwrap();
    assert!(sticker.asset_id.is_none());
    assert_eq!(sticker.scale, 1.0);

    // Empty map yields a usable default sticker
    assert!(Sticker::from_dict(&Map::new()).is_ok());
}

#[test]
fn test_destructive_undo_redo_storm() {
    let mut timeline = Timeline::new("Storm");
    let track_id = timeline.add_track(ClipTrack::new_magnetic("V1"));
    let mut history = History::with_capacity(10);

    let mut ids = Vec::new();
    for i in 0..15 {
        let clip = Clip::new("a", &format!("c{i}"), 1.0 + i as f64);
        ids.push(clip.id.clone());
        history
            .execute(Box::new(AddClipCommand::new(&track_id, clip)), &mut timeline)
            .unwrap();
    }
    history
        .execute(
            Box::new(RemoveClipCommand::new(&track_id, &ids[7])),
            &mut timeline,
        )
        .unwrap();

    // More undos than entries: extra calls are no-ops
    let mut undone = 0;
    while history.undo(&mut timeline).unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 10);
    assert!(!history.undo(&mut timeline).unwrap());
    assert_eq!(timeline.track(&track_id).unwrap().len(), 6);
    assert!(timeline.track(&track_id).unwrap().is_contiguous());

    while history.redo(&mut timeline).unwrap() {}
    let track = timeline.track(&track_id).unwrap();
    assert_eq!(track.len(), 14);
    assert!(track.get_clip(&ids[7]).is_none());
    assert!(track.is_contiguous());
}

#[test]
fn test_destructive_handler_errors_and_panics_are_contained() {
    let queue = QueueManager::new(QueueSettings {
        num_workers: 1,
        max_queue_size: 100,
        idle_wait_ms: 10,
    })
    .unwrap();

    queue.register_handler(TaskType::Export, |ctx| {
        match ctx.data()["mode"].as_str() {
            Some("panic") => panic!("encoder exploded"),
            Some("string_panic") => std::panic::panic_any(String::from("owned payload")),
            Some("err") => Err("disk full".into()),
            _ => Ok(json!({"ok": true})),
        }
    });
    // Absurd progress values are stored as-is
    queue.register_handler(TaskType::Translate, |ctx| {
        ctx.report_progress(-5);
        ctx.report_progress(1_000);
        Ok(Value::Null)
    });

    let modes = ["panic", "string_panic", "err", "fine"];
    let tasks: Vec<_> = modes
        .iter()
        .map(|m| {
            queue
                .add_task(TaskType::Export, m, json!({ "mode": m }))
                .unwrap()
        })
        .collect();
    let translate = queue.add_task(TaskType::Translate, "t", json!({})).unwrap();

    let wait = Duration::from_secs(5);
    let statuses: Vec<TaskStatus> = tasks
        .iter()
        .map(|t| queue.wait_for_task(&t.id, wait).unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Failed,
            TaskStatus::Failed,
            TaskStatus::Failed,
            TaskStatus::Completed
        ]
    );
    let owned = queue.get_task(&tasks[1].id).unwrap();
    assert!(owned.error.unwrap().contains("owned payload"));

    let translated = queue.wait_for_task(&translate.id, wait).unwrap();
    assert_eq!(translated.status, TaskStatus::Completed);
    assert_eq!(translated.progress, 100);
}
