//! Two-dimensional positions shared by buffers, panels and selections.
//!
//! A point with a negative coordinate is "unset". Panels rely on this to
//! represent a missing anchor or selection without wrapping every field in
//! an `Option`, and on the fact that actions may push a point out of bounds
//! temporarily (the render pass clamps it back).

use std::cmp::Ordering;

/// A (column, row) coordinate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// The unset point
    pub const UNSET: Point = Point { x: -1, y: -1 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Either coordinate is negative
    pub fn is_invalid(&self) -> bool {
        self.x < 0 || self.y < 0
    }

    pub fn is_valid(&self) -> bool {
        !self.is_invalid()
    }

    pub fn unset(&mut self) {
        *self = Self::UNSET;
    }

    /// Shift by a delta
    pub fn shift(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }

    /// Row as an index (negative rows map to 0)
    pub fn row(&self) -> usize {
        self.y.max(0) as usize
    }

    /// Column as an index (negative columns map to 0)
    pub fn col(&self) -> usize {
        self.x.max(0) as usize
    }
}

/// Document order: row-major, then column.
impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Correction that brings `n` into `[minimum, maximum]`.
///
/// The lower bound wins when the range is empty.
pub fn adjust(maximum: i32, minimum: i32, n: i32) -> i32 {
    if n < minimum {
        minimum - n
    } else if n > maximum.max(minimum) {
        maximum.max(minimum) - n
    } else {
        0
    }
}

/// `n` clamped into `[minimum, maximum]`
pub fn clip(maximum: i32, minimum: i32, n: i32) -> i32 {
    n + adjust(maximum, minimum, n)
}

/// Saturating `usize` to `i32` conversion for buffer lengths
pub fn to_coord(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
