//! Placement Policies
//!
//! A track delegates insertion and removal to a placement strategy:
//!
//! - [`FreePlacement`]: items sit where they are put; nothing moves on remove.
//! - [`MagneticPlacement`]: items are packed end to end with no gaps; inserts
//!   and removals ripple every later item.
//!
//! `Overlay` tracks (stickers) use free placement. Overlap is allowed on
//! free and overlay tracks.

use serde::{Deserialize, Serialize};

use crate::{time_eq, TimeSec};

/// Anything that can sit on a track
pub trait TimelineItem {
    fn id(&self) -> &str;

    fn start_time(&self) -> TimeSec;

    fn set_start_time(&mut self, start_time: TimeSec);

    /// Footprint on the timeline
    fn length(&self) -> TimeSec;

    fn end_time(&self) -> TimeSec {
        self.start_time() + self.length()
    }
}

impl TimelineItem for super::Clip {
    fn id(&self) -> &str {
        &self.id
    }

    fn start_time(&self) -> TimeSec {
        self.start_time
    }

    fn set_start_time(&mut self, start_time: TimeSec) {
        self.start_time = start_time;
    }

    fn length(&self) -> TimeSec {
        super::Clip::length(self)
    }
}

impl TimelineItem for super::Sticker {
    fn id(&self) -> &str {
        &self.id
    }

    fn start_time(&self) -> TimeSec {
        self.start_time
    }

    fn set_start_time(&mut self, start_time: TimeSec) {
        self.start_time = start_time;
    }

    fn length(&self) -> TimeSec {
        self.duration
    }
}

/// Insert/remove strategy over an ordered item list
pub trait Placement<T: TimelineItem> {
    /// Inserts `item`, assigning its `start_time`.
    fn insert(&self, items: &mut Vec<T>, item: T, position: Option<TimeSec>);

    /// Removes the item at `index` (must be in bounds).
    fn remove(&self, items: &mut Vec<T>, index: usize) -> T;
}

/// Which strategy a track uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementPolicy {
    #[default]
    Free,
    Magnetic,
    Overlay,
}

impl PlacementPolicy {
    pub fn insert<T: TimelineItem>(&self, items: &mut Vec<T>, item: T, position: Option<TimeSec>) {
        match self {
            Self::Free | Self::Overlay => FreePlacement.insert(items, item, position),
            Self::Magnetic => MagneticPlacement.insert(items, item, position),
        }
    }

    pub fn remove<T: TimelineItem>(&self, items: &mut Vec<T>, index: usize) -> T {
        match self {
            Self::Free | Self::Overlay => FreePlacement.remove(items, index),
            Self::Magnetic => MagneticPlacement.remove(items, index),
        }
    }

    pub fn ripples(&self) -> bool {
        matches!(self, Self::Magnetic)
    }
}

// =============================================================================
// Free placement
// =============================================================================

/// Literal placement: explicit positions are honored, the default is the end
/// of the last item. The list is re-sorted by start time (stable).
#[derive(Clone, Copy, Debug, Default)]
pub struct FreePlacement;

impl<T: TimelineItem> Placement<T> for FreePlacement {
    fn insert(&self, items: &mut Vec<T>, mut item: T, position: Option<TimeSec>) {
        let start = position.unwrap_or_else(|| items.last().map_or(0.0, |last| last.end_time()));
        item.set_start_time(start);
        items.push(item);
        items.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
    }

    fn remove(&self, items: &mut Vec<T>, index: usize) -> T {
        items.remove(index)
    }
}

// =============================================================================
// Magnetic placement
// =============================================================================

/// Gap-free packing with ripple.
///
/// `position` only picks the slot: the item goes before the first item that
/// starts at or after `position` (or at the end), then snaps to the end of
/// its predecessor (0.0 when first). Everything after it moves right by the
/// item's length. The requested position itself is never used as a start time.
#[derive(Clone, Copy, Debug, Default)]
pub struct MagneticPlacement;

impl<T: TimelineItem> Placement<T> for MagneticPlacement {
    fn insert(&self, items: &mut Vec<T>, mut item: T, position: Option<TimeSec>) {
        let index = match position {
            // A tie goes before the existing item, so re-inserting a removed
            // item at its old start restores its slot. Items sharing one start
            // (zero length) are indistinguishable here and can swap.
            Some(position) => items
                .iter()
                .position(|existing| existing.start_time() >= position)
                .unwrap_or(items.len()),
            None => items.len(),
        };

        let start = if index == 0 {
            0.0
        } else {
            items[index - 1].end_time()
        };
        item.set_start_time(start);

        let shift = item.length();
        for later in &mut items[index..] {
            later.set_start_time(later.start_time() + shift);
        }
        items.insert(index, item);
    }

    fn remove(&self, items: &mut Vec<T>, index: usize) -> T {
        let removed = items.remove(index);
        let shift = removed.length();
        for later in &mut items[index..] {
            later.set_start_time(later.start_time() - shift);
        }
        removed
    }
}

/// Checks the magnetic invariant: first item at 0, each item starts where the
/// previous one ends.
pub fn is_contiguous<T: TimelineItem>(items: &[T]) -> bool {
    if let Some(first) = items.first() {
        if !time_eq(first.start_time(), 0.0) {
            return false;
        }
    }
    items
        .windows(2)
        .all(|pair| time_eq(pair[0].end_time(), pair[1].start_time()))
}
