//! Clip Model Definitions
//!
//! Defines Clip and the attribute groups it carries (transform, audio,
//! color correction). A clip is a timed reference to media or text; the
//! media itself is resolved by external collaborators through `asset_id`.

use serde::{Deserialize, Serialize};

use crate::{AssetId, ClipId, Point2D, TimeSec};

// =============================================================================
// Clip Type
// =============================================================================

/// What a clip renders
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClipType {
    #[default]
    Video,
    Audio,
    /// Title/caption clip; the text is the clip's content
    Text { content: String },
}

// =============================================================================
// Transform
// =============================================================================

/// Blend mode used when compositing a clip over lower tracks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Add,
}

/// 2D Transform for clips
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    /// Position (normalized 0.0-1.0, center = 0.5, 0.5)
    pub position: Point2D,
    /// Scale (1.0 = 100%)
    pub scale: Point2D,
    /// Rotation in degrees
    pub rotation_deg: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Point2D::center(),
            scale: Point2D::new(1.0, 1.0),
            rotation_deg: 0.0,
        }
    }
}

// =============================================================================
// Audio Settings
// =============================================================================

/// Audio settings for clips
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    /// Linear gain (1.0 = unity)
    pub volume: f32,
    pub muted: bool,
    /// Fade-in length in seconds
    pub fade_in_sec: TimeSec,
    /// Fade-out length in seconds
    pub fade_out_sec: TimeSec,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            fade_in_sec: 0.0,
            fade_out_sec: 0.0,
        }
    }
}

// =============================================================================
// Color Correction
// =============================================================================

/// Primary color correction. All values are offsets; 0.0 is neutral.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorCorrection {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub temperature: f32,
    pub tint: f32,
}

// =============================================================================
// Clip
// =============================================================================

/// Clip (timed reference to media or text on a track)
///
/// `in_point`/`out_point` trim the source; [`Clip::length`] is the clip's
/// footprint on the timeline. Nothing forces `out_point >= in_point`, so the
/// length can be zero or negative if a caller trims that way.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: ClipId,
    pub asset_id: AssetId,
    pub name: String,
    /// Source media duration (seconds)
    pub duration: TimeSec,
    /// Position on the owning track (seconds)
    pub start_time: TimeSec,
    pub in_point: TimeSec,
    pub out_point: TimeSec,
    /// Index of the owning track within its timeline
    pub track_index: usize,
    pub clip_type: ClipType,
    pub transform: Transform,
    /// Opacity (0.0 - 1.0)
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub audio: AudioSettings,
    pub color: ColorCorrection,
    /// Lower-resolution stand-in used for preview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_asset_id: Option<AssetId>,
}

impl Clip {
    /// Creates a video clip spanning the whole source
    pub fn new(asset_id: &str, name: &str, duration: TimeSec) -> Self {
        Self::with_trim(asset_id, name, duration, 0.0, 0.0)
    }

    /// Creates a clip with an explicit trim.
    ///
    /// An `out_point` of exactly `0.0` means "untrimmed" and is replaced by `duration`.
    pub fn with_trim(
        asset_id: &str,
        name: &str,
        duration: TimeSec,
        in_point: TimeSec,
        out_point: TimeSec,
    ) -> Self {
        let out_point = if out_point == 0.0 { duration } else { out_point };
        Self {
            id: ulid::Ulid::new().to_string(),
            asset_id: asset_id.to_string(),
            name: name.to_string(),
            duration,
            start_time: 0.0,
            in_point,
            out_point,
            track_index: 0,
            clip_type: ClipType::Video,
            transform: Transform::default(),
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            audio: AudioSettings::default(),
            color: ColorCorrection::default(),
            proxy_asset_id: None,
        }
    }

    /// Creates a text clip. Text has no backing asset.
    pub fn new_text(content: &str, duration: TimeSec) -> Self {
        let mut clip = Self::new("", content, duration);
        clip.clip_type = ClipType::Text {
            content: content.to_string(),
        };
        clip
    }

    /// Marks the clip as audio-only
    pub fn as_audio(mut self) -> Self {
        self.clip_type = ClipType::Audio;
        self
    }

    /// Places the clip at a specific timeline position
    pub fn place_at(mut self, start_time: TimeSec) -> Self {
        self.start_time = start_time;
        self
    }

    /// On-timeline footprint: `out_point - in_point`
    pub fn length(&self) -> TimeSec {
        self.out_point - self.in_point
    }

    /// Timeline position where the clip ends
    pub fn end_time(&self) -> TimeSec {
        self.start_time + self.length()
    }

    /// Checks if the clip covers the timeline position (`[start, end)`)
    pub fn contains_time(&self, time_sec: TimeSec) -> bool {
        time_sec >= self.start_time && time_sec < self.end_time()
    }

    /// Converts a timeline time to source time
    pub fn timeline_to_source(&self, timeline_sec: TimeSec) -> TimeSec {
        self.in_point + (timeline_sec - self.start_time)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.clip_type, ClipType::Text { .. })
    }

    /// Text content of a text clip
    pub fn text(&self) -> Option<&str> {
        match &self.clip_type {
            ClipType::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Asset that should be used for preview: the proxy when present
    pub fn preview_asset_id(&self) -> &str {
        self.proxy_asset_id.as_deref().unwrap_or(&self.asset_id)
    }
}

// =============================================================================
// Tests
// =============================================================================
