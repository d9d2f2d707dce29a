//! Track Module
//!
//! A single track type parameterized by its item type and a placement policy.
//! `ClipTrack` (free or magnetic) holds clips, `StickerTrack` (overlay) holds
//! stickers.
//!
//! Mutations are checked, not thrown: a locked track answers `false`/`None`.
//! The item list is kept sorted by start time through `add`/`remove` only;
//! editing `start_time` through `get_mut` is the caller's responsibility.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::timeline::{is_contiguous, Clip, PlacementPolicy, Sticker, TimelineItem};
use crate::{TimeSec, TrackId};

/// Track of timed items
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track<T> {
    pub id: TrackId,
    pub name: String,
    pub policy: PlacementPolicy,
    pub is_audio: bool,
    pub is_muted: bool,
    pub is_locked: bool,
    pub is_hidden: bool,
    items: Vec<T>,
}

/// Track of clips
pub type ClipTrack = Track<Clip>;

/// Overlay track of stickers
pub type StickerTrack = Track<Sticker>;

impl<T: TimelineItem> Track<T> {
    /// Creates an empty, unlocked track
    pub fn new(name: &str, policy: PlacementPolicy) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            policy,
            is_audio: false,
            is_muted: false,
            is_locked: false,
            is_hidden: false,
            items: Vec::new(),
        }
    }

    /// Marks the track as an audio track
    pub fn audio(mut self) -> Self {
        self.is_audio = true;
        self
    }

    /// Adds an item. Returns `false` (and changes nothing) if the track is locked.
    pub fn add(&mut self, item: T, position: Option<TimeSec>) -> bool {
        if self.is_locked {
            warn!(track = %self.name, item = item.id(), "Add rejected: track is locked");
            return false;
        }
        debug!(
            track = %self.name,
            item = item.id(),
            ?position,
            policy = ?self.policy,
            "Adding item"
        );
        self.policy.insert(&mut self.items, item, position);
        true
    }

    /// Removes an item by ID.
    ///
    /// Returns `None` if the track is locked or the item is not on it.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        if self.is_locked {
            warn!(track = %self.name, item = id, "Remove rejected: track is locked");
            return None;
        }
        let index = self.position_of(id)?;
        debug!(track = %self.name, item = id, index, "Removing item");
        Some(self.policy.remove(&mut self.items, index))
    }

    /// Index of an item in start-time order
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Items ordered by start time
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Latest end time of any item (0.0 when empty)
    pub fn end_time(&self) -> TimeSec {
        self.items
            .iter()
            .map(|item| item.end_time())
            .fold(0.0, f64::max)
    }

    /// Items whose `[start, end)` window contains `time_sec`
    pub fn items_at_time(&self, time_sec: TimeSec) -> Vec<&T> {
        self.items
            .iter()
            .filter(|item| time_sec >= item.start_time() && time_sec < item.end_time())
            .collect()
    }

    /// True if items are packed end to end starting at 0
    pub fn is_contiguous(&self) -> bool {
        is_contiguous(&self.items)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.is_locked = locked;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.is_muted = muted;
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.is_hidden = hidden;
    }
}

// =============================================================================
// Clip tracks
// =============================================================================

impl Track<Clip> {
    /// Creates a free-placement clip track
    pub fn new_free(name: &str) -> Self {
        Self::new(name, PlacementPolicy::Free)
    }

    /// Creates a gap-free, rippling clip track
    pub fn new_magnetic(name: &str) -> Self {
        Self::new(name, PlacementPolicy::Magnetic)
    }

    pub fn add_clip(&mut self, clip: Clip, position: Option<TimeSec>) -> bool {
        self.add(clip, position)
    }

    pub fn remove_clip(&mut self, clip_id: &str) -> Option<Clip> {
        self.remove(clip_id)
    }

    pub fn get_clip(&self, clip_id: &str) -> Option<&Clip> {
        self.get(clip_id)
    }

    pub fn get_clip_mut(&mut self, clip_id: &str) -> Option<&mut Clip> {
        self.get_mut(clip_id)
    }

    pub fn clips(&self) -> &[Clip] {
        self.items()
    }

    pub(crate) fn set_track_index(&mut self, index: usize) {
        for clip in &mut self.items {
            clip.track_index = index;
        }
    }
}

// =============================================================================
// Sticker tracks
// =============================================================================

impl Track<Sticker> {
    /// Creates an overlay track for stickers
    pub fn new_sticker(name: &str) -> Self {
        Self::new(name, PlacementPolicy::Overlay)
    }

    pub fn add_sticker(&mut self, sticker: Sticker, position: Option<TimeSec>) -> bool {
        self.add(sticker, position)
    }

    pub fn remove_sticker(&mut self, sticker_id: &str) -> Option<Sticker> {
        self.remove(sticker_id)
    }

    /// All stickers visible at `time_sec`
    pub fn get_stickers_at_time(&self, time_sec: TimeSec) -> Vec<&Sticker> {
        self.items_at_time(time_sec)
    }

    pub fn stickers(&self) -> &[Sticker] {
        self.items()
    }
}

// =============================================================================
// Tests
// =============================================================================
