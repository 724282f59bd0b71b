//! Axis-aligned collision detection
//!
//! Every car is a fixed-size rectangle in track space: `x` runs along the
//! track (direction of travel), `y` across it. Rectangles that merely touch
//! do not collide.

use glam::Vec2;
use serde::Serialize;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self {
            min: origin,
            max: origin + size,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Overlap on both axes
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Swap the axes (track space to a vertical screen layout)
    pub fn transposed(&self) -> Rect {
        Rect {
            min: Vec2::new(self.min.y, self.min.x),
            max: Vec2::new(self.max.y, self.max.x),
        }
    }
}

/// Index of the first rectangle overlapping `player`
pub fn first_overlap<'a, I>(player: &Rect, others: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a Rect>,
{
    others.into_iter().position(|other| player.overlaps(other))
}
