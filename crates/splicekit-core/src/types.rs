//! SpliceKit Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Asset identifier (opaque reference resolved by media collaborators)
pub type AssetId = String;

/// Clip unique identifier (ULID)
pub type ClipId = String;

/// Sticker unique identifier (ULID)
pub type StickerId = String;

/// Track unique identifier (ULID)
pub type TrackId = String;

/// Operation unique identifier (ULID)
pub type OpId = String;

/// Task identifier (short hex token)
pub type TaskId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Tolerance used when comparing timeline positions.
pub const TIME_EPSILON: TimeSec = 1e-9;

/// Returns true if two timeline positions are equal within [`TIME_EPSILON`].
pub fn time_eq(a: TimeSec, b: TimeSec) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

// =============================================================================
// Spatial Types
// =============================================================================

/// 2D coordinates (normalized or pixel)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns center coordinates
    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self::center()
    }
}
