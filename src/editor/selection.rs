//! Mouse-driven selection.
//!
//! A selection is tracked as an anchor (where the button went down) plus a
//! normalized `[start, end)` range in buffer coordinates. Points given to
//! the model are expected to be clamped by the caller already; a column one
//! past the end of a line selects that line's newline.

use super::point::Point;

/// Outcome of a button release
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    /// Released where it was pressed: move the cursor there
    Click,
    /// Released elsewhere: a range is now selected
    Selected,
    /// Release without a matching press
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    anchor: Point,
    start: Point,
    end: Point,
    /// Screen cell of the press, used to tell clicks from drags
    press: Point,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            anchor: Point::UNSET,
            start: Point::UNSET,
            end: Point::UNSET,
            press: Point::UNSET,
        }
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Button down at buffer point `at`, screen cell `cell`
    pub fn press(&mut self, at: Point, cell: Point) {
        self.anchor = at;
        self.press = cell;
        self.start.unset();
        self.end.unset();
    }

    /// Pointer moved to `at` with the button held
    pub fn drag(&mut self, at: Point) {
        if self.anchor.is_invalid() {
            return;
        }

        if at < self.anchor {
            self.start = at;
            self.end = self.anchor;
        } else {
            self.start = self.anchor;
            self.end = at;
        }
    }

    /// Button up at buffer point `at`, screen cell `cell`
    pub fn release(&mut self, at: Point, cell: Point) -> Release {
        if self.anchor.is_invalid() {
            return Release::Ignored;
        }

        let outcome = if self.press == cell {
            self.start.unset();
            self.end.unset();
            Release::Click
        } else {
            self.drag(at);
            Release::Selected
        };

        self.anchor.unset();
        self.press.unset();
        outcome
    }

    /// The selected `[start, end)` range, if there is a non-empty one
    pub fn range(&self) -> Option<(Point, Point)> {
        if self.start.is_invalid() || self.end.is_invalid() || self.start == self.end {
            return None;
        }
        Some((self.start, self.end))
    }

    /// Range endpoints for rendering, unset when nothing is selected
    pub fn bounds(&self) -> (Point, Point) {
        self.range().unwrap_or((Point::UNSET, Point::UNSET))
    }

    pub fn is_active(&self) -> bool {
        self.range().is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
