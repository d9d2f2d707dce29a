//! Sticker Model
//!
//! Stickers are timed overlays (emoji, shapes, images, text badges) that live
//! on overlay tracks. They may overlap each other freely and never ripple.
//!
//! The flat key/value form produced by [`Sticker::to_dict`] is the persisted
//! representation; keys are snake_case and stable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AssetId, CoreError, CoreResult, StickerId, TimeSec};

/// Sticker kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerType {
    #[default]
    Emoji,
    Shape,
    Image,
    Text,
}

impl StickerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emoji => "emoji",
            Self::Shape => "shape",
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

impl std::str::FromStr for StickerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emoji" => Ok(Self::Emoji),
            "shape" => Ok(Self::Shape),
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            other => Err(CoreError::ValidationError(format!(
                "unknown sticker_type: {other}"
            ))),
        }
    }
}

/// Timed overlay record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: StickerId,
    pub name: String,
    pub sticker_type: StickerType,
    /// Symbol (emoji, shape name, text) or a path/URI for image stickers
    pub content: String,
    pub duration: TimeSec,
    pub start_time: TimeSec,
    /// Normalized position (0.0-1.0)
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    /// Rotation in degrees
    pub rotation: f64,
    pub opacity: f64,
    pub asset_id: Option<AssetId>,
}

impl Sticker {
    pub fn new(name: &str, sticker_type: StickerType, content: &str, duration: TimeSec) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            sticker_type,
            content: content.to_string(),
            duration,
            start_time: 0.0,
            x: 0.5,
            y: 0.5,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            asset_id: None,
        }
    }

    pub fn emoji(symbol: &str, duration: TimeSec) -> Self {
        Self::new(symbol, StickerType::Emoji, symbol, duration)
    }

    pub fn place_at(mut self, start_time: TimeSec) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn end_time(&self) -> TimeSec {
        self.start_time + self.duration
    }

    /// True if `time_sec` falls in `[start_time, start_time + duration)`
    pub fn is_active_at(&self, time_sec: TimeSec) -> bool {
        time_sec >= self.start_time && time_sec < self.end_time()
    }

    /// Converts to a flat string-keyed map
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), Value::from(self.id.clone()));
        map.insert("name".into(), Value::from(self.name.clone()));
        map.insert("sticker_type".into(), Value::from(self.sticker_type.as_str()));
        map.insert("content".into(), Value::from(self.content.clone()));
        map.insert("duration".into(), Value::from(self.duration));
        map.insert("start_time".into(), Value::from(self.start_time));
        map.insert("x".into(), Value::from(self.x));
        map.insert("y".into(), Value::from(self.y));
        map.insert("scale".into(), Value::from(self.scale));
        map.insert("rotation".into(), Value::from(self.rotation));
        map.insert("opacity".into(), Value::from(self.opacity));
        map.insert(
            "asset_id".into(),
            self.asset_id.clone().map(Value::from).unwrap_or(Value::Null),
        );
        map
    }

    /// Rebuilds a sticker from [`Sticker::to_dict`] output.
    ///
    /// Absent or null keys fall back to defaults (a missing `id` gets a fresh
    /// one). A key that is present with the wrong JSON type is rejected.
    pub fn from_dict(map: &Map<String, Value>) -> CoreResult<Self> {
        let sticker_type = match opt_str(map, "sticker_type")? {
            Some(s) => s.parse()?,
            None => StickerType::default(),
        };
        let content = opt_str(map, "content")?.unwrap_or_default();
        let name = opt_str(map, "name")?.unwrap_or_else(|| content.clone());

        Ok(Self {
            id: opt_str(map, "id")?.unwrap_or_else(|| ulid::Ulid::new().to_string()),
            name,
            sticker_type,
            content,
            duration: f64_or(map, "duration", 0.0)?,
            start_time: f64_or(map, "start_time", 0.0)?,
            x: f64_or(map, "x", 0.5)?,
            y: f64_or(map, "y", 0.5)?,
            scale: f64_or(map, "scale", 1.0)?,
            rotation: f64_or(map, "rotation", 0.0)?,
            opacity: f64_or(map, "opacity", 1.0)?,
            asset_id: opt_str(map, "asset_id")?,
        })
    }
}

fn opt_str(map: &Map<String, Value>, key: &str) -> CoreResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CoreError::ValidationError(format!(
            "sticker field '{key}' must be a string, got {other}"
        ))),
    }
}

fn f64_or(map: &Map<String, Value>, key: &str, default: f64) -> CoreResult<f64> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v.as_f64().ok_or_else(|| {
            CoreError::ValidationError(format!("sticker field '{key}' must be a number, got {v}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticker_dict_round_trip() {
        let mut sticker = Sticker::new("Star", StickerType::Shape, "star", 2.5).place_at(4.0);
        sticker.asset_id = Some("asset_9".to_string());
        sticker.rotation = 15.0;

        let dict = sticker.to_dict();
        assert_eq!(dict["sticker_type"], "shape");
        assert_eq!(dict["start_time"], 4.0);

        let restored = Sticker::from_dict(&dict).unwrap();
        assert_eq!(restored, sticker);
    }

    #[test]
    fn test_from_dict_applies_defaults() {
        let mut map = Map::new();
        map.insert("content".into(), Value::from("🔥"));
        map.insert("duration".into(), Value::from(3));

        let sticker = Sticker::from_dict(&map).unwrap();
        assert!(!sticker.id.is_empty());
        assert_eq!(sticker.name, "🔥");
        assert_eq!(sticker.sticker_type, StickerType::Emoji);
        assert_eq!(sticker.duration, 3.0);
        assert_eq!(sticker.scale, 1.0);
        assert_eq!(sticker.opacity, 1.0);
        assert!(sticker.asset_id.is_none());
    }

    #[test]
    fn test_from_dict_rejects_wrong_types() {
        let mut map = Map::new();
        map.insert("duration".into(), Value::from("long"));
        assert!(matches!(
            Sticker::from_dict(&map),
            Err(CoreError::ValidationError(_))
        ));

        let mut map = Map::new();
        map.insert("sticker_type".into(), Value::from("hologram"));
        assert!(Sticker::from_dict(&map).is_err());
    }

    #[test]
    fn test_active_window_is_half_open() {
        let sticker = Sticker::emoji("👍", 2.0).place_at(1.0);

        assert!(!sticker.is_active_at(0.99));
        assert!(sticker.is_active_at(1.0));
        assert!(sticker.is_active_at(2.5));
        assert!(!sticker.is_active_at(3.0));
    }
}
