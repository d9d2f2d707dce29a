//! Timeline Module
//!
//! Defines the timed sequence document: clip tracks, sticker tracks and the
//! [`Timeline`] that owns them.

mod models;
mod placement;
mod sticker;
mod track;

pub use models::*;
pub use placement::*;
pub use sticker::*;
pub use track::*;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, TimeSec, TrackId};

/// Timeline (track container)
///
/// Clip tracks are ordered bottom to top; a clip's `track_index` refers to
/// this order. Sticker tracks always composite above clip tracks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub name: String,
    tracks: Vec<ClipTrack>,
    sticker_tracks: Vec<StickerTrack>,
}

impl Timeline {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tracks: Vec::new(),
            sticker_tracks: Vec::new(),
        }
    }

    /// Appends a clip track and returns its ID
    pub fn add_track(&mut self, track: ClipTrack) -> TrackId {
        let id = track.id.clone();
        self.tracks.push(track);
        self.reindex_clips();
        id
    }

    /// Removes a clip track by ID
    pub fn remove_track(&mut self, track_id: &str) -> Option<ClipTrack> {
        let pos = self.track_index(track_id)?;
        let track = self.tracks.remove(pos);
        self.reindex_clips();
        Some(track)
    }

    pub fn track(&self, track_id: &str) -> Option<&ClipTrack> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn track_mut(&mut self, track_id: &str) -> Option<&mut ClipTrack> {
        self.tracks.iter_mut().find(|t| t.id == track_id)
    }

    /// Like [`Timeline::track_mut`] but missing tracks are an error
    pub fn require_track_mut(&mut self, track_id: &str) -> CoreResult<&mut ClipTrack> {
        self.track_mut(track_id)
            .ok_or_else(|| CoreError::TrackNotFound(track_id.to_string()))
    }

    pub fn track_index(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }

    pub fn tracks(&self) -> &[ClipTrack] {
        &self.tracks
    }

    /// Appends a sticker track and returns its ID
    pub fn add_sticker_track(&mut self, track: StickerTrack) -> TrackId {
        let id = track.id.clone();
        self.sticker_tracks.push(track);
        id
    }

    pub fn remove_sticker_track(&mut self, track_id: &str) -> Option<StickerTrack> {
        let pos = self.sticker_tracks.iter().position(|t| t.id == track_id)?;
        Some(self.sticker_tracks.remove(pos))
    }

    pub fn sticker_track(&self, track_id: &str) -> Option<&StickerTrack> {
        self.sticker_tracks.iter().find(|t| t.id == track_id)
    }

    pub fn sticker_track_mut(&mut self, track_id: &str) -> Option<&mut StickerTrack> {
        self.sticker_tracks.iter_mut().find(|t| t.id == track_id)
    }

    pub fn sticker_tracks(&self) -> &[StickerTrack] {
        &self.sticker_tracks
    }

    /// Finds a clip on any track, returning the owning track ID with it
    pub fn find_clip(&self, clip_id: &str) -> Option<(&TrackId, &Clip)> {
        self.tracks
            .iter()
            .find_map(|t| t.get_clip(clip_id).map(|c| (&t.id, c)))
    }

    /// End of the last item on any track
    pub fn duration(&self) -> TimeSec {
        let clips = self.tracks.iter().map(|t| t.end_time());
        let stickers = self.sticker_tracks.iter().map(|t| t.end_time());
        clips.chain(stickers).fold(0.0, f64::max)
    }

    fn reindex_clips(&mut self) {
        for (index, track) in self.tracks.iter_mut().enumerate() {
            track.set_track_index(index);
        }
    }
}
